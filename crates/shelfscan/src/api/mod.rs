//! Backend interaction support: retry and token accounting.
//!
//! - [`retry`] — transient error detection (429, 5xx, network timeouts) with
//!   configurable exponential backoff and jitter. Never retries 4xx auth or
//!   request errors.
//! - [`tracing`] — correlation IDs (`trace_id` / `span_id`) and the
//!   cumulative [`UsageTracker`].

pub mod retry;
pub mod tracing;

pub use retry::{RetryConfig, is_permanent_error, is_transient_error, retry_api_call};
pub use tracing::{UsageTracker, generate_span_id, generate_trace_id};
