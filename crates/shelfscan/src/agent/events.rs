//! Events and handlers for the [`ExtractionAgent`](super::extraction::ExtractionAgent).
//!
//! The agent reports every step of a run as an [`AgentEvent`]. Callers
//! implement [`EventHandler`] to observe them.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |

use crate::agent::error::FailureKind;
use tracing::{debug, info, warn};

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted by the agent during a run.
#[derive(Debug)]
pub enum AgentEvent<'a> {
    /// A new attempt is starting.
    AttemptStart {
        trace_id: &'a str,
        attempt: u32,
        max_attempts: u32,
    },
    /// The model returned text (possibly alongside tool calls).
    Text(&'a str),
    /// A tool is about to be invoked.
    ToolExecuting { name: &'a str, arguments: &'a str },
    /// A tool call finished with text for the model.
    ToolResult {
        name: &'a str,
        call_id: &'a str,
        result: &'a str,
    },
    /// A tool call spent its retry budget.
    ToolFailed {
        name: &'a str,
        reason: &'a str,
        attempts: u32,
    },
    /// Token usage reported for one backend response.
    TokenUsage {
        prompt_tokens: u32,
        completion_tokens: u32,
    },
    /// An attempt ended without an acceptable result.
    AttemptFailed {
        attempt: u32,
        kind: FailureKind,
        reason: &'a str,
    },
    /// The validator accepted a result.
    Accepted { attempt: u32, products: usize },
    /// Every attempt failed.
    Exhausted { attempts: u32 },
}

/// Handler for agent events.
///
/// ```ignore
/// struct Counter(AtomicU32);
///
/// impl EventHandler for Counter {
///     fn on_event(&self, event: &AgentEvent<'_>) {
///         if let AgentEvent::ToolExecuting { .. } = event {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &AgentEvent<'_>) {
        let _ = event;
    }
}

/// A handler that ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let AgentEvent::Text(text) = event {
///         println!("{text}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&AgentEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &AgentEvent<'_>) {
        (self.0)(event)
    }
}

/// Logs events through `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        match event {
            AgentEvent::AttemptStart {
                trace_id,
                attempt,
                max_attempts,
            } => {
                info!("[{trace_id}] attempt {attempt}/{max_attempts}");
            }
            AgentEvent::Text(text) => {
                let preview: String = text.chars().take(200).collect();
                debug!(
                    "LLM text: {preview}{}",
                    if text.chars().count() > 200 { "..." } else { "" }
                );
            }
            AgentEvent::ToolExecuting { name, .. } => {
                debug!("Executing tool: {name}");
            }
            AgentEvent::ToolResult { name, result, .. } => {
                debug!("Tool {name} result: {} bytes", result.len());
            }
            AgentEvent::ToolFailed {
                name,
                reason,
                attempts,
            } => {
                warn!("Tool {name} failed after {attempts} attempt(s): {reason}");
            }
            AgentEvent::TokenUsage {
                prompt_tokens,
                completion_tokens,
            } => {
                debug!("Tokens: prompt={prompt_tokens}, completion={completion_tokens}");
            }
            AgentEvent::AttemptFailed {
                attempt,
                kind,
                reason,
            } => {
                warn!("Attempt {attempt} failed ({kind}): {reason}");
            }
            AgentEvent::Accepted { attempt, products } => {
                info!("Result accepted on attempt {attempt}: {products} product(s)");
            }
            AgentEvent::Exhausted { attempts } => {
                warn!("No valid result after {attempts} attempt(s)");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn fn_handler_sees_events() {
        let seen = Mutex::new(Vec::new());
        let handler = FnEventHandler::new(|event| {
            if let AgentEvent::Accepted { products, .. } = event {
                seen.lock().unwrap().push(*products);
            }
        });
        handler.on_event(&AgentEvent::Text("hi"));
        handler.on_event(&AgentEvent::Accepted {
            attempt: 1,
            products: 4,
        });
        assert_eq!(*seen.lock().unwrap(), vec![4]);
    }

    #[test]
    fn logging_handler_accepts_every_event() {
        let handler = LoggingHandler;
        handler.on_event(&AgentEvent::AttemptFailed {
            attempt: 1,
            kind: FailureKind::NoAnswer,
            reason: "no final_result call",
        });
        handler.on_event(&AgentEvent::Exhausted { attempts: 3 });
    }
}
