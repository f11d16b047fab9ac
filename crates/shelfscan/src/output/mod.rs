//! Sinks for an accepted extraction: the CSV file and the usage printout.

pub mod csv;
pub mod report;

pub use csv::{CSV_HEADER, output_file_name, render_csv, write_csv};
pub use report::UsageReport;

use crate::agent::{Extraction, ExtractionError};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Hand a finished run to the CSV sink and return the written path.
///
/// Only an accepted extraction is written. A failed write is logged and
/// does not undo the acceptance.
pub async fn persist(
    outcome: &Result<Extraction, ExtractionError>,
    dir: &Path,
    at: DateTime<Local>,
) -> Option<PathBuf> {
    match outcome {
        Ok(extraction) => match write_csv(&extraction.results, dir, at).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(
                    "[{}] Failed to write CSV into {}: {e}",
                    extraction.trace_id,
                    dir.display()
                );
                None
            }
        },
        Err(_) => {
            info!("No data extracted; nothing written");
            None
        }
    }
}
