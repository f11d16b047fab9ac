//! Correlation IDs and token accounting for extraction runs.
//!
//! Each run gets a `trace_id`; each backend request within it gets a
//! `span_id`. [`UsageTracker`] accumulates the token counts reported by the
//! backend across every attempt of a run.

use crate::UsageInfo;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Generate a unique trace ID for an extraction run.
pub fn generate_trace_id() -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    // Counter disambiguates calls within the same nanosecond.
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("tr-{ts:x}-{count:04x}")
}

/// Generate a span ID for one backend request within a run.
pub fn generate_span_id(trace_id: &str, attempt: u32, round: u32) -> String {
    format!("{trace_id}:a{attempt}r{round}")
}

/// Cumulative token counters for a run. Counters only ever grow.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UsageTracker {
    /// Tokens sent to the backend (prompt side).
    pub request_tokens: u64,
    /// Tokens produced by the backend (completion side).
    pub response_tokens: u64,
    /// Total as reported by the backend, or the sum when it isn't reported.
    pub total_tokens: u64,
    /// Number of backend responses that carried usage.
    pub requests: u32,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the usage block of one backend response.
    pub fn record(&mut self, usage: &UsageInfo) {
        let prompt = u64::from(usage.prompt_tokens.unwrap_or(0));
        let completion = u64::from(usage.completion_tokens.unwrap_or(0));
        let total = usage
            .total_tokens
            .map(u64::from)
            .unwrap_or(prompt + completion);
        self.request_tokens += prompt;
        self.response_tokens += completion;
        self.total_tokens += total;
        self.requests += 1;
    }

    /// Format as a short summary string.
    pub fn summary(&self) -> String {
        format!(
            "tokens: {} request + {} response = {} total over {} call(s)",
            self.request_tokens, self.response_tokens, self.total_tokens, self.requests,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_id_unique() {
        let id1 = generate_trace_id();
        let id2 = generate_trace_id();
        assert_ne!(id1, id2);
        assert!(id1.starts_with("tr-"));
    }

    #[test]
    fn span_id_includes_attempt_and_round() {
        let span = generate_span_id("tr-abc123-0000", 2, 3);
        assert!(span.starts_with("tr-abc123-0000"));
        assert!(span.ends_with("a2r3"));
    }

    #[test]
    fn tracker_accumulates() {
        let mut tracker = UsageTracker::new();
        tracker.record(&UsageInfo {
            prompt_tokens: Some(1000),
            completion_tokens: Some(500),
            total_tokens: Some(1500),
        });
        tracker.record(&UsageInfo {
            prompt_tokens: Some(2000),
            completion_tokens: Some(100),
            total_tokens: None,
        });
        assert_eq!(tracker.request_tokens, 3000);
        assert_eq!(tracker.response_tokens, 600);
        assert_eq!(tracker.total_tokens, 3600);
        assert_eq!(tracker.requests, 2);
        assert!(tracker.summary().contains("3600 total"));
    }
}
