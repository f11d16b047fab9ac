//! Convenience re-exports for common `shelfscan` types.
//!
//! ```ignore
//! use shelfscan::prelude::*;
//! ```
//!
//! Pulls in the client, the agent and its config, the tool set and fetch
//! tool, validators, event handlers and the output helpers. Retry and
//! tracing internals stay in [`crate::api`].

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{
    BackendConfig, ChatBackend, ChatClient, ChatCompletion, ChatRequest, Message, Product,
    Results, ToolDef, UsageInfo, json_schema_for,
};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    AgentConfig, AgentEvent, EventHandler, Extraction, ExtractionAgent, ExtractionError,
    FnEventHandler, FnValidator, LoggingHandler, NonEmptyValidator, NoopHandler,
    ResultValidator, TypeCheckValidator, ValidationOutcome,
};
pub use crate::api::{RetryConfig, UsageTracker};

// ── Fetching & tools ────────────────────────────────────────────────
pub use crate::fetch::{ContentFetcher, FetchConfig, FetchError, HttpFetcher};
pub use crate::tools::spec::ToolSpec;
pub use crate::tools::{FetchHtmlText, Tool, ToolFuture, ToolOutcome, ToolSet, parse_tool_args};

// ── Output ──────────────────────────────────────────────────────────
pub use crate::output::{UsageReport, persist, write_csv};
