//! The extraction loop: one URL in, one validated [`Results`] out.
//!
//! [`ExtractionAgent::run`] drives the backend through a bounded number of
//! attempts. Each attempt is a sequence of backend rounds. In every round the
//! model may call tools (dispatched one at a time through the [`ToolSet`]),
//! submit its answer through the `final_result` output tool, or reply with
//! text. An answer is coerced into [`Results`] and handed to the
//! [`ResultValidator`]; anything short of acceptance costs one attempt and,
//! when attempts remain, appends feedback to the transcript for the next one.

use super::config::AgentConfig;
use super::error::{AttemptFailure, AttemptRecord, ExtractionError};
use super::events::{AgentEvent, EventHandler, NoopHandler};
use super::prompt::{
    FINAL_RESULT_TOOL, extract_json_candidate, final_result_def, retry_feedback, user_prompt,
};
use super::validator::{ResultValidator, TypeCheckValidator, ValidationOutcome};
use crate::api::retry::{is_permanent_error, retry_api_call};
use crate::api::tracing::{UsageTracker, generate_span_id, generate_trace_id};
use crate::schema::{CoercionError, Results};
use crate::tools::core::{ToolInvocation, ToolOutcome, ToolSet};
use crate::{ChatBackend, ChatRequest, Message, ToolCall, ToolDef};
use serde_json::Value;
use tracing::{debug, info, warn};

/// A successful run.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub results: Results,
    /// Token usage across every attempt of the run.
    pub usage: UsageTracker,
    /// The attempt that produced the accepted result (1-indexed).
    pub attempts: u32,
    pub trace_id: String,
    /// Every dispatched tool call, in order, with its failure counters.
    pub tool_calls: Vec<ToolInvocation>,
}

/// Mutable state of one `run(url)`. Owned by that call alone.
struct AgentRun {
    trace_id: String,
    messages: Vec<Message>,
    usage: UsageTracker,
    tool_calls: Vec<ToolInvocation>,
    history: Vec<AttemptRecord>,
}

impl AgentRun {
    fn new(url: &str, config: &AgentConfig) -> Self {
        Self {
            trace_id: generate_trace_id(),
            messages: vec![
                Message::system(&config.system_prompt),
                Message::user(user_prompt(url)),
            ],
            usage: UsageTracker::new(),
            tool_calls: Vec::new(),
            history: Vec::new(),
        }
    }
}

/// How an attempt ended without an accepted result.
enum AttemptEnd {
    Failed(AttemptFailure),
    /// A permanent backend error; the run stops here.
    Abort(String),
}

impl From<AttemptFailure> for AttemptEnd {
    fn from(failure: AttemptFailure) -> Self {
        AttemptEnd::Failed(failure)
    }
}

/// Drives a [`ChatBackend`] until it produces an accepted [`Results`].
///
/// ```ignore
/// let agent = ExtractionAgent::new(&client, &tools, AgentConfig::default())
///     .with_validator(&NonEmptyValidator)
///     .with_event_handler(&LoggingHandler);
///
/// let extraction = agent.run("https://example.com/products").await?;
/// ```
///
/// The agent borrows the backend, tool set, validator and handler; `run`
/// takes `&self`, so one agent can serve several URLs concurrently.
pub struct ExtractionAgent<'a> {
    backend: &'a dyn ChatBackend,
    tools: &'a ToolSet,
    config: AgentConfig,
    validator: &'a dyn ResultValidator,
    event_handler: &'a dyn EventHandler,
}

impl<'a> ExtractionAgent<'a> {
    pub fn new(backend: &'a dyn ChatBackend, tools: &'a ToolSet, config: AgentConfig) -> Self {
        Self {
            backend,
            tools,
            config,
            validator: &TypeCheckValidator,
            event_handler: &NoopHandler,
        }
    }

    pub fn with_validator(mut self, validator: &'a dyn ResultValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Tools offered to the model: the tool set plus `final_result`.
    fn tool_defs(&self) -> Vec<ToolDef> {
        let mut defs = self.tools.definitions();
        defs.push(final_result_def());
        defs
    }

    /// Extract products from `url`.
    ///
    /// Makes at most `config.retries + 1` attempts. Returns
    /// [`ExtractionError::Exhausted`] when none is accepted and
    /// [`ExtractionError::Backend`] as soon as the backend refuses a request
    /// outright.
    pub async fn run(&self, url: &str) -> Result<Extraction, ExtractionError> {
        let mut run = AgentRun::new(url, &self.config);
        let max_attempts = self.config.max_attempts();
        let defs = self.tool_defs();
        info!("[{}] extracting products from {url}", run.trace_id);

        let mut last_failure = String::new();
        for attempt in 1..=max_attempts {
            self.event_handler.on_event(&AgentEvent::AttemptStart {
                trace_id: &run.trace_id,
                attempt,
                max_attempts,
            });

            let failure = match self.attempt(&mut run, &defs, attempt).await {
                Ok(results) => {
                    self.event_handler.on_event(&AgentEvent::Accepted {
                        attempt,
                        products: results.dataset.len(),
                    });
                    info!("[{}] {}", run.trace_id, run.usage.summary());
                    return Ok(Extraction {
                        results,
                        usage: run.usage,
                        attempts: attempt,
                        trace_id: run.trace_id,
                        tool_calls: run.tool_calls,
                    });
                }
                Err(AttemptEnd::Abort(error)) => {
                    warn!("[{}] backend refused the request: {error}", run.trace_id);
                    return Err(ExtractionError::Backend(error));
                }
                Err(AttemptEnd::Failed(failure)) => failure,
            };

            last_failure = failure.to_string();
            self.event_handler.on_event(&AgentEvent::AttemptFailed {
                attempt,
                kind: failure.kind(),
                reason: &last_failure,
            });
            run.history.push(AttemptRecord {
                attempt,
                kind: failure.kind(),
                message: last_failure.clone(),
            });

            if attempt < max_attempts
                && let Some(feedback) = retry_feedback(&failure, attempt, max_attempts)
            {
                run.messages.push(Message::user(feedback));
            }
        }

        self.event_handler.on_event(&AgentEvent::Exhausted {
            attempts: max_attempts,
        });
        Err(ExtractionError::Exhausted {
            trace_id: run.trace_id,
            attempts: max_attempts,
            last_failure,
            history: run.history,
            usage: run.usage,
        })
    }

    /// One attempt: backend rounds until an answer is judged or the round
    /// limit is hit.
    async fn attempt(
        &self,
        run: &mut AgentRun,
        defs: &[ToolDef],
        attempt: u32,
    ) -> Result<Results, AttemptEnd> {
        for round in 1..=self.config.max_tool_rounds {
            let span_id = generate_span_id(&run.trace_id, attempt, round);
            let body = ChatRequest {
                model: Some(self.config.model.clone()),
                messages: run.messages.clone(),
                max_tokens: self.config.max_tokens,
                temperature: Some(self.config.temperature),
                tools: Some(defs.to_vec()),
                tool_choice: Some("auto".into()),
                ..Default::default()
            };
            debug!("[{span_id}] request with {} message(s)", body.messages.len());

            let completion =
                match retry_api_call(&self.config.api_retry, || self.backend.complete(&body)).await {
                    Ok(c) => c,
                    Err(e) if is_permanent_error(&e) => return Err(AttemptEnd::Abort(e)),
                    Err(e) => return Err(AttemptFailure::Backend(e).into()),
                };

            if let Some(usage) = &completion.usage {
                run.usage.record(usage);
                self.event_handler.on_event(&AgentEvent::TokenUsage {
                    prompt_tokens: usage.prompt_tokens.unwrap_or(0),
                    completion_tokens: usage.completion_tokens.unwrap_or(0),
                });
            }

            let text = completion.content.unwrap_or_default();
            if !text.is_empty() {
                self.event_handler.on_event(&AgentEvent::Text(&text));
            }

            if completion.tool_calls.is_empty() {
                debug!("[{span_id}] text-only reply, looking for a JSON answer");
                if text.trim().is_empty() {
                    return Err(AttemptFailure::NoAnswer("the reply was empty".into()).into());
                }
                run.messages.push(Message::assistant_text(&text));
                return match extract_json_candidate(&text) {
                    Some(candidate) => self.judge(&candidate).map_err(AttemptEnd::from),
                    None => Err(AttemptFailure::NoAnswer(format!(
                        "the reply was plain text without a {FINAL_RESULT_TOOL} call"
                    ))
                    .into()),
                };
            }

            let calls = completion.tool_calls;
            run.messages
                .push(Message::assistant_tool_calls(Some(text), calls.clone()));
            if let Some(verdict) = self.handle_tool_calls(run, &calls).await {
                return verdict.map_err(AttemptEnd::from);
            }
        }

        Err(AttemptFailure::RoundLimit(self.config.max_tool_rounds).into())
    }

    /// Dispatch one round of tool calls in order. Every call gets a tool
    /// result message. Returns a verdict once a call ends the attempt; calls
    /// after that point are answered as skipped.
    async fn handle_tool_calls(
        &self,
        run: &mut AgentRun,
        calls: &[ToolCall],
    ) -> Option<Result<Results, AttemptFailure>> {
        let mut verdict: Option<Result<Results, AttemptFailure>> = None;

        for call in calls {
            if verdict.is_some() {
                run.messages.push(Message::tool_result(
                    &call.id,
                    "Skipped: an earlier call in this turn already ended the attempt.",
                ));
                continue;
            }

            if call.function.name == FINAL_RESULT_TOOL {
                let judged = match serde_json::from_str::<Value>(&call.function.arguments) {
                    Ok(candidate) => self.judge(&candidate),
                    Err(e) => Err(AttemptFailure::Coercion(CoercionError {
                        errors: vec![format!("arguments are not valid JSON: {e}")],
                        submitted: Value::String(call.function.arguments.clone()),
                    })),
                };
                let reply = match &judged {
                    Ok(results) => format!("Accepted {} product(s).", results.dataset.len()),
                    Err(failure) => format!("Error: {failure}"),
                };
                run.messages.push(Message::tool_result(&call.id, reply));
                verdict = Some(judged);
                continue;
            }

            self.event_handler.on_event(&AgentEvent::ToolExecuting {
                name: &call.function.name,
                arguments: &call.function.arguments,
            });
            let mut invocation = ToolInvocation::from(call);
            let outcome = self.tools.invoke(&mut invocation).await;
            let reply = outcome.to_message_text(&invocation.name);

            match &outcome {
                ToolOutcome::HardFail { reason, attempts } => {
                    self.event_handler.on_event(&AgentEvent::ToolFailed {
                        name: &invocation.name,
                        reason,
                        attempts: *attempts,
                    });
                    verdict = Some(Err(AttemptFailure::ToolFailed {
                        tool: invocation.name.clone(),
                        reason: reason.clone(),
                        attempts: *attempts,
                    }));
                }
                ToolOutcome::Ok(_) => {
                    self.event_handler.on_event(&AgentEvent::ToolResult {
                        name: &invocation.name,
                        call_id: &invocation.call_id,
                        result: &reply,
                    });
                }
            }

            run.messages.push(Message::tool_result(&call.id, reply));
            run.tool_calls.push(invocation);
        }

        verdict
    }

    /// Coerce a candidate and pass it through the validator.
    fn judge(&self, candidate: &Value) -> Result<Results, AttemptFailure> {
        let results = Results::coerce(candidate).map_err(AttemptFailure::Coercion)?;
        match self.validator.validate(results) {
            ValidationOutcome::Accepted(results) => Ok(results),
            ValidationOutcome::Rejected(reason) => Err(AttemptFailure::Rejected(reason)),
        }
    }
}
