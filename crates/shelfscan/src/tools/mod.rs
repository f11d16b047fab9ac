//! Tool abstractions for the extraction agent.
//!
//! Every capability the model can invoke is a [`Tool`] implementor collected
//! into a [`ToolSet`], which handles dispatch, argument validation, retry
//! budgets, timeouts and truncation.
//!
//! # Submodules
//!
//! - [`core`] — [`Tool`] trait, [`ToolSet`], [`ToolInvocation`], [`ToolOutcome`].
//! - [`spec`] — [`ToolSpec`](spec::ToolSpec) builder for structured tool
//!   descriptions with `when_to_use` / `when_not_to_use` guidance.
//! - [`fetch`] — the `fetch_html_text` tool over a
//!   [`ContentFetcher`](crate::fetch::ContentFetcher).

pub mod core;
pub mod fetch;
pub mod spec;

pub use core::{
    DEFAULT_MAX_RESULT_BYTES, DEFAULT_TOOL_RETRIES, Tool, ToolFuture, ToolInvocation, ToolOutcome,
    ToolSet, parse_tool_args, truncate_result, validate_tool_arguments,
};
pub use fetch::{FETCH_TOOL_NAME, FetchArgs, FetchHtmlText};
