//! LLM-driven product listing extraction.
//!
//! `shelfscan` turns a single web page into a typed list of [`Product`]
//! records. The page is fetched through a tool the model calls
//! (`fetch_html_text`), the model hands back a schema-shaped answer, the
//! answer is coerced into [`Results`] and passed through a
//! [`ResultValidator`](agent::validator::ResultValidator), and the whole
//! cycle is retried at two levels: each tool call has its own retry budget,
//! and the agent has an attempt budget for bad or missing answers.
//!
//! # Getting started
//!
//! ```ignore
//! use shelfscan::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let client = ChatClient::new(BackendConfig::from_env()?)?;
//!     let fetcher = HttpFetcher::new(FetchConfig::default()).map_err(|e| e.to_string())?;
//!
//!     let tools = ToolSet::new()
//!         .with_arg_validation(true)
//!         .with(FetchHtmlText::new(Arc::new(fetcher)));
//!
//!     let extraction = ExtractionAgent::new(&client, &tools, AgentConfig::default())
//!         .with_event_handler(&LoggingHandler)
//!         .run("https://www.ikea.com/nl/en/cat/best-sellers/")
//!         .await
//!         .map_err(|e| e.to_string())?;
//!
//!     println!("{} products", extraction.results.dataset.len());
//!     println!("{}", UsageReport(&extraction.usage));
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **The extraction loop:** [`ExtractionAgent`](agent::extraction::ExtractionAgent)
//!   and [`AgentConfig`](agent::config::AgentConfig).
//! - **Typed contract:** [`schema`] ([`Product`], [`Results`], coercion).
//! - **Tools:** [`Tool`](tools::core::Tool), [`ToolSet`](tools::core::ToolSet)
//!   with per-tool retry budgets, and [`FetchHtmlText`](tools::fetch::FetchHtmlText).
//! - **Fetching:** [`fetch`] ([`ContentFetcher`](fetch::ContentFetcher),
//!   [`HttpFetcher`](fetch::HttpFetcher)).
//! - **Observability:** [`EventHandler`](agent::events::EventHandler) and
//!   [`LoggingHandler`](agent::events::LoggingHandler).
//! - **Output:** [`output`] (CSV file, usage report).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | Extraction loop, config, events, validators, prompts, errors |
//! | [`tools`] | [`Tool`](tools::core::Tool) trait, [`ToolSet`](tools::core::ToolSet), tool descriptions, the fetch tool |
//! | [`fetch`] | HTTP retrieval and HTML-to-text reduction |
//! | [`schema`] | [`Product`] / [`Results`] and candidate coercion |
//! | [`api`] | Backend retry with backoff, trace IDs, token accounting |
//! | [`output`] | CSV export and usage printout |

pub mod agent;
pub mod api;
pub mod fetch;
pub mod output;
pub mod prelude;
pub mod schema;
pub mod tools;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

pub use schema::{Product, Results};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

/// Groq's OpenAI-compatible chat completions endpoint.
pub const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Default model for extraction runs.
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Environment variable holding the backend API key.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Optional override for the chat completions endpoint.
pub const API_URL_ENV: &str = "SHELFSCAN_API_URL";

/// Optional override for the model name.
pub const MODEL_ENV: &str = "SHELFSCAN_MODEL";

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. Tool parameters and the `final_result` output
/// tool are both described this way.
///
/// Nested types are inlined rather than emitted as `$ref` + `definitions`,
/// and no `$schema` key is written; several OpenAI-compatible providers
/// reject tool parameters that use either.
///
/// # Example
///
/// ```
/// use shelfscan::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct FetchArgs {
///     url: String,
/// }
///
/// let schema = json_schema_for::<FetchArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"url".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::r#gen::SchemaSettings::draft07()
        .with(|s| {
            s.inline_subschemas = true;
            s.meta_schema = None;
        })
        .into_generator()
        .into_root_schema_for::<T>();
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body (OpenAI-compatible). Unset optional fields
/// are omitted from serialization.
#[derive(Serialize, Debug, Default, Clone)]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub messages: Vec<Message>,

    // Generation parameters
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    /// `Some(0.0)` is sent as-is; `None` leaves it to the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    // Tools
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,
    /// `"auto"`, `"none"` or `"required"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// An assistant turn that requested tool calls. Any text the model sent
    /// alongside the calls is kept in `content`.
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.filter(|c| !c.is_empty()),
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition sent to the API (OpenAI function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    /// Create a function-calling tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// The type of a tool call. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum CallType {
    #[serde(rename = "function")]
    Function,
}

/// A tool call returned by the model.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub function: FunctionCallData,
}

impl ToolCall {
    /// Build a function tool call. Mostly useful for scripted backends.
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: CallType::Function,
            function: FunctionCallData {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionCallData {
    pub name: String,
    pub arguments: String,
}

// ── Response types ─────────────────────────────────────────────────

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type from a [`ChatBackend`].
#[derive(Debug, Clone, Default)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Backend boundary ───────────────────────────────────────────────

/// Boxed future returned by [`ChatBackend::complete`].
pub type ChatFuture<'a> = Pin<Box<dyn Future<Output = Result<ChatCompletion, String>> + Send + 'a>>;

/// Inference backend used by the extraction agent.
///
/// Errors are strings with `HTTP {status}` embedded where one exists, so
/// [`api::retry`] can classify them as transient or permanent.
pub trait ChatBackend: Send + Sync {
    fn complete<'a>(&'a self, body: &'a ChatRequest) -> ChatFuture<'a>;
}

/// Endpoint, credentials and model for the production backend.
#[derive(Clone)]
pub struct BackendConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl BackendConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
        }
    }

    /// Load from the environment after reading a `.env` file if one exists.
    ///
    /// Requires `GROQ_API_KEY`. `SHELFSCAN_API_URL` and `SHELFSCAN_MODEL`
    /// override the endpoint and model.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();

        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| format!("{API_KEY_ENV} not set"))?;
        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.api_url = url;
        }
        if let Ok(model) = std::env::var(MODEL_ENV) {
            config.model = model;
        }
        Ok(config)
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for an OpenAI-compatible chat completions API.
pub struct ChatClient {
    client: reqwest::Client,
    config: BackendConfig,
}

impl ChatClient {
    pub fn new(config: BackendConfig) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("shelfscan/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self { client, config })
    }

    /// Model configured for this client.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send a chat completion request. A request without a model uses the
    /// configured one.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, String> {
        let model_label = body.model.as_deref().unwrap_or(&self.config.model);
        let tool_count = body.tools.as_ref().map_or(0, |t| t.len());
        debug!(
            "LLM request: model={}, messages={}, tools={}, max_tokens={}, temp={:?}",
            model_label,
            body.messages.len(),
            tool_count,
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = if body.model.is_some() {
            self.post(body).await?
        } else {
            let with_model = ChatRequest {
                model: Some(self.config.model.clone()),
                ..body.clone()
            };
            self.post(&with_model).await?
        };

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("Chat API HTTP {status}: {text}"));
        }

        parse_chat_response(&text)
    }

    async fn post(&self, body: &ChatRequest) -> Result<reqwest::Response, String> {
        self.client
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))
    }
}

impl ChatBackend for ChatClient {
    fn complete<'a>(&'a self, body: &'a ChatRequest) -> ChatFuture<'a> {
        Box::pin(self.chat(body))
    }
}

/// Parse a successful chat completions body into a [`ChatCompletion`].
fn parse_chat_response(text: &str) -> Result<ChatCompletion, String> {
    let parsed: RawChatResponse =
        serde_json::from_str(text).map_err(|e| format!("failed to parse response: {e}"))?;

    if let Some(err) = parsed.error {
        return Err(format!("Chat API error: {}", err.message));
    }

    if let Some(ref usage) = parsed.usage {
        debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            usage.total_tokens.unwrap_or(0),
        );
    }

    match parsed.choices.and_then(|c| c.into_iter().next()) {
        Some(c) => {
            let tool_calls = c.message.tool_calls.unwrap_or_default();
            debug!(
                "LLM output: {} chars text, {} tool call(s)",
                c.message.content.as_ref().map_or(0, |s| s.len()),
                tool_calls.len()
            );
            Ok(ChatCompletion {
                content: c.message.content,
                tool_calls,
                usage: parsed.usage,
                finish_reason: c.finish_reason,
            })
        }
        None => {
            debug!("LLM output: empty (no choices)");
            Ok(ChatCompletion {
                usage: parsed.usage,
                ..Default::default()
            })
        }
    }
}
