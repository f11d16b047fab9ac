//! Token usage printout.

use crate::api::tracing::UsageTracker;
use std::fmt;

/// Displays the final token counts of a run:
///
/// ```text
/// --------------------------------------------------
/// Input_tokens: 5120
/// Output_tokens: 340
/// Total_tokens: 5460
/// ```
pub struct UsageReport<'a>(pub &'a UsageTracker);

impl fmt::Display for UsageReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "-".repeat(50))?;
        writeln!(f, "Input_tokens: {}", self.0.request_tokens)?;
        writeln!(f, "Output_tokens: {}", self.0.response_tokens)?;
        write!(f, "Total_tokens: {}", self.0.total_tokens)
    }
}
