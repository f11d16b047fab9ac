//! Configuration for the [`ExtractionAgent`](super::extraction::ExtractionAgent).
//!
//! ```ignore
//! let config = AgentConfig::new("llama-3.3-70b-versatile")
//!     .with_retries(2)
//!     .with_max_tokens(8000)
//!     .with_temperature(0.1)
//!     .with_api_retry(RetryConfig::with_retries(3));
//! ```
//!
//! Tool-level retry budgets live on the [`ToolSet`](crate::tools::ToolSet),
//! not here; the two counters never share state.

use crate::DEFAULT_MODEL;
use crate::agent::prompt::default_system_prompt;
use crate::api::retry::RetryConfig;

/// Agent-level retries: up to `DEFAULT_RETRIES + 1` attempts per run.
pub const DEFAULT_RETRIES: u32 = 2;

pub const DEFAULT_MAX_TOKENS: u32 = 8000;

pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Backend round trips allowed inside one attempt before it is abandoned.
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 8;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model identifier sent with every request.
    pub model: String,
    /// Task instructions sent as the system message.
    pub system_prompt: String,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Retries after the first attempt. A run makes at most `retries + 1`
    /// attempts.
    pub retries: u32,
    /// Backend round trips per attempt.
    pub max_tool_rounds: u32,
    /// Backoff policy for transient backend errors within one request.
    pub api_retry: RetryConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

impl AgentConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: default_system_prompt(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            retries: DEFAULT_RETRIES,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            api_retry: RetryConfig::default(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Clamped to at least one round.
    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    pub fn with_api_retry(mut self, retry: RetryConfig) -> Self {
        self.api_retry = retry;
        self
    }

    /// Total attempts a run may make.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}
