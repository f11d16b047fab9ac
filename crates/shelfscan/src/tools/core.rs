//! Tool abstraction for LLM function-calling agents.
//!
//! The [`Tool`] trait defines the interface that every tool must implement:
//! a static API definition (name, description, JSON schema) and an async
//! `execute` method. Tools are collected into a [`ToolSet`] which handles
//! dispatch, argument validation, per-tool retry budgets, timeouts and
//! result truncation.
//!
//! A tool reports two kinds of failure. A *soft* failure is ordinary text
//! (`Ok("Error: ...")`) that goes back to the model like any other result.
//! A *hard* failure (`Err`) is re-dispatched with the same arguments until
//! the tool's retry budget is spent, then surfaces as
//! [`ToolOutcome::HardFail`].

use crate::ToolDef;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Maximum size (in bytes) for tool output before truncation.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 60_000;

/// Retries granted to a tool call after its first hard failure.
pub const DEFAULT_TOOL_RETRIES: u32 = 1;

/// Boxed future returned by [`Tool::execute`].
///
/// `Ok` is the text handed to the model (soft failures included); `Err` is
/// a hard failure that counts against the call's retry budget.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;

// ── Tool trait ─────────────────────────────────────────────────────

/// A tool that an LLM agent can invoke via function-calling.
///
/// # Example
///
/// ```ignore
/// struct Clock;
///
/// impl Tool for Clock {
///     fn definition(&self) -> ToolDef { /* ... */ }
///
///     fn execute(&self, _arguments: &str) -> ToolFuture<'_> {
///         Box::pin(async move { Ok(chrono::Local::now().to_rfc3339()) })
///     }
/// }
/// ```
pub trait Tool: Send + Sync {
    /// The tool definition sent to the LLM API.
    fn definition(&self) -> ToolDef;

    /// Execute the tool with the given raw JSON arguments string.
    ///
    /// Return `Ok("Error: ...")` for problems the model can fix by changing
    /// its arguments, and `Err(reason)` for failures worth retrying as-is
    /// (network errors, timeouts).
    fn execute(&self, arguments: &str) -> ToolFuture<'_>;

    /// The tool's name, taken from the definition.
    fn name(&self) -> String {
        self.definition().function.name
    }
}

// ── Invocation state ───────────────────────────────────────────────

/// One model-requested tool call and its own failure counter.
///
/// The counter is scoped to this call only; it is independent of the
/// agent's attempt counter and of every other call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
    /// Hard failures seen so far for this call.
    pub failures: u32,
    /// Times the tool was actually dispatched for this call.
    pub dispatches: u32,
}

impl ToolInvocation {
    pub fn new(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            arguments: arguments.into(),
            failures: 0,
            dispatches: 0,
        }
    }
}

impl From<&crate::ToolCall> for ToolInvocation {
    fn from(call: &crate::ToolCall) -> Self {
        Self::new(&call.id, &call.function.name, &call.function.arguments)
    }
}

/// Result of invoking a tool through a [`ToolSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Text for the model. May describe a soft failure.
    Ok(String),
    /// The call kept failing hard until its retry budget ran out.
    HardFail { reason: String, attempts: u32 },
}

impl ToolOutcome {
    pub fn is_hard_fail(&self) -> bool {
        matches!(self, ToolOutcome::HardFail { .. })
    }

    /// Text to send back to the model as this call's tool result.
    pub fn to_message_text(&self, name: &str) -> String {
        match self {
            ToolOutcome::Ok(text) => text.clone(),
            ToolOutcome::HardFail { reason, attempts } => format!(
                "Error: tool '{name}' failed after {attempts} attempt(s): {reason}"
            ),
        }
    }
}

// ── ToolSet ────────────────────────────────────────────────────────

/// A collection of tools that can be dispatched by name.
///
/// # Example
///
/// ```ignore
/// let tools = ToolSet::new()
///     .with_max_result_bytes(30_000)
///     .with_arg_validation(true)
///     .with_default_retries(1)
///     .with_default_timeout(Some(Duration::from_secs(30)))
///     .with(FetchHtmlText::new(fetcher));
///
/// let defs = tools.definitions();
/// ```
pub struct ToolSet {
    tools: HashMap<String, Box<dyn Tool>>,
    max_result_bytes: usize,
    /// Whether to validate tool arguments against JSON Schema before execution.
    validate_args: bool,
    /// Per-dispatch timeout. `None` disables timeouts.
    default_timeout: Option<Duration>,
    /// Retry budget for tools without an override.
    default_retries: u32,
    /// Per-tool retry budget overrides.
    retries: HashMap<String, u32>,
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("max_result_bytes", &self.max_result_bytes)
            .field("default_retries", &self.default_retries)
            .finish()
    }
}

impl ToolSet {
    /// Create an empty tool set.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            validate_args: false,
            default_timeout: None,
            default_retries: DEFAULT_TOOL_RETRIES,
            retries: HashMap::new(),
        }
    }

    /// Set the maximum result size in bytes before truncation.
    pub fn with_max_result_bytes(mut self, max: usize) -> Self {
        self.max_result_bytes = max;
        self
    }

    /// Enable JSON Schema argument validation before tool execution.
    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    /// Set a timeout for each dispatch. A timeout is a hard failure.
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the retry budget for tools without a per-tool override.
    pub fn with_default_retries(mut self, retries: u32) -> Self {
        self.default_retries = retries;
        self
    }

    /// Override the retry budget for one tool.
    pub fn with_retries_for(mut self, name: impl Into<String>, retries: u32) -> Self {
        self.retries.insert(name.into(), retries);
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name(), Box::new(tool));
    }

    /// Register a tool (builder pattern).
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// Return all tool definitions for the LLM API, sorted by name so the
    /// request body is stable between rounds.
    pub fn definitions(&self) -> Vec<ToolDef> {
        let mut defs: Vec<ToolDef> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        defs
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Retry budget for a tool.
    pub fn retry_budget(&self, name: &str) -> u32 {
        self.retries
            .get(name)
            .copied()
            .unwrap_or(self.default_retries)
    }

    /// Invoke a tool call, re-dispatching hard failures until the tool's
    /// budget is spent. At most `retry_budget + 1` dispatches happen.
    ///
    /// Unknown tools and invalid arguments are soft failures: they come back
    /// as `Ok` text without dispatching, so the model can correct itself.
    pub async fn invoke(&self, call: &mut ToolInvocation) -> ToolOutcome {
        let tool = match self.tools.get(&call.name) {
            Some(t) => t,
            None => return ToolOutcome::Ok(format!("Error: unknown tool '{}'", call.name)),
        };

        if self.validate_args
            && let Some(error) = validate_tool_arguments(tool.as_ref(), &call.arguments)
        {
            return ToolOutcome::Ok(error);
        }

        let budget = self.retry_budget(&call.name);
        loop {
            call.dispatches += 1;
            match self.dispatch_once(tool.as_ref(), &call.name, &call.arguments).await {
                Ok(text) => return ToolOutcome::Ok(truncate_result(text, self.max_result_bytes)),
                Err(reason) => {
                    call.failures += 1;
                    if call.failures > budget {
                        warn!(
                            "Tool {} failed {} time(s), budget exhausted: {reason}",
                            call.name, call.failures
                        );
                        return ToolOutcome::HardFail {
                            reason,
                            attempts: call.dispatches,
                        };
                    }
                    warn!(
                        "Tool {} failed (retry {}/{budget}): {reason}",
                        call.name, call.failures
                    );
                }
            }
        }
    }

    /// Convenience wrapper around [`invoke`](Self::invoke) for one-off calls.
    pub async fn execute(&self, name: &str, arguments: &str) -> ToolOutcome {
        let mut call = ToolInvocation::new("direct", name, arguments);
        self.invoke(&mut call).await
    }

    /// A single dispatch with timing and optional timeout.
    async fn dispatch_once(
        &self,
        tool: &dyn Tool,
        name: &str,
        arguments: &str,
    ) -> Result<String, String> {
        log_tool_call(name, arguments);
        let start = Instant::now();

        let result = match self.default_timeout {
            Some(limit) => match tokio::time::timeout(limit, tool.execute(arguments)).await {
                Ok(r) => r,
                Err(_) => {
                    info!(
                        "Tool {name} timed out after {:.1}s (limit: {:.1}s)",
                        start.elapsed().as_secs_f64(),
                        limit.as_secs_f64(),
                    );
                    Err(format!(
                        "tool '{name}' timed out after {:.1} seconds",
                        limit.as_secs_f64()
                    ))
                }
            },
            None => tool.execute(arguments).await,
        };

        match &result {
            Ok(text) => {
                debug!(
                    "Tool {name} completed in {:.0}ms ({} bytes)",
                    start.elapsed().as_secs_f64() * 1000.0,
                    text.len()
                );
                trace!(
                    "Tool {name} result preview: {}",
                    text.chars().take(300).collect::<String>()
                );
            }
            Err(e) => debug!(
                "Tool {name} failed after {:.0}ms: {e}",
                start.elapsed().as_secs_f64() * 1000.0
            ),
        }
        result
    }
}

impl Default for ToolSet {
    fn default() -> Self {
        Self::new()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate tool arguments against the tool's declared JSON Schema.
///
/// Returns `None` if valid, or `Some(error_string)` if validation fails.
/// The error string is formatted for the LLM to understand and self-correct.
pub fn validate_tool_arguments(tool: &dyn Tool, arguments: &str) -> Option<String> {
    let args_value: serde_json::Value = match serde_json::from_str(arguments) {
        Ok(v) => v,
        Err(e) => {
            return Some(format!(
                "Error: invalid JSON arguments for tool '{}': {e}. \
                 Please provide valid JSON matching the tool's parameter schema.",
                tool.name()
            ));
        }
    };

    let schema = tool.definition().function.parameters;
    let validator = match jsonschema::validator_for(&schema) {
        Ok(v) => v,
        Err(_) => return None, // An unusable schema is not the model's fault.
    };

    let errors: Vec<String> = validator
        .iter_errors(&args_value)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "Error: argument validation failed for tool '{}':\n{}\n\
             Please fix the arguments and try again.",
            tool.name(),
            errors.join("\n")
        ))
    }
}

/// Log a tool call at INFO level with a truncated preview of arguments.
pub fn log_tool_call(name: &str, arguments: &str) {
    let args_preview: String = arguments.chars().take(120).collect();
    info!(
        "[tool] {}({args_preview}{})",
        name,
        if arguments.chars().count() > 120 { "..." } else { "" }
    );
    trace!("[tool] {name} arguments: {arguments}");
}

/// Truncate a string to at most `max` bytes (backing off to a char
/// boundary), appending a notice if trimmed.
pub fn truncate_result(s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    let head = s.get(..cut).unwrap_or_default();
    format!("{head}...\n[truncated: {} bytes total]", s.len())
}

/// Parse raw JSON arguments into a typed struct.
///
/// Returns a formatted error string suitable for returning directly from
/// [`Tool::execute`] as a soft failure.
pub fn parse_tool_args<T: serde::de::DeserializeOwned>(arguments: &str) -> Result<T, String> {
    serde_json::from_str(arguments).map_err(|e| {
        format!(
            "Error: invalid tool arguments: {e}. \
             Please provide valid JSON matching the tool's parameter schema."
        )
    })
}

// ── Tests ──────────────────────────────────────────────────────────
