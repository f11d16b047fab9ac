//! Agent runtime: the [`ExtractionAgent`] loop and its supporting modules.
//!
//! - [`extraction::ExtractionAgent`] — the attempt/round loop. Start here.
//! - [`config::AgentConfig`] — model, token and retry settings.
//! - [`events`] — [`EventHandler`] trait and [`AgentEvent`] enum for
//!   observing a run. Includes [`LoggingHandler`] and [`FnEventHandler`].
//! - [`validator`] — [`ResultValidator`] gates applied after coercion.
//! - [`prompt`] — system prompt, the `final_result` output tool, retry
//!   feedback.
//! - [`error`] — per-attempt failures and the terminal [`ExtractionError`].

pub mod config;
pub mod error;
pub mod events;
pub mod extraction;
pub mod prompt;
pub mod validator;

pub use config::AgentConfig;
pub use error::{AttemptFailure, AttemptRecord, ExtractionError, FailureKind};
pub use events::{AgentEvent, EventHandler, FnEventHandler, LoggingHandler, NoopHandler};
pub use extraction::{Extraction, ExtractionAgent};
pub use prompt::{FINAL_RESULT_TOOL, SystemPromptBuilder};
pub use validator::{
    FnValidator, NonEmptyValidator, ResultValidator, TypeCheckValidator, ValidationOutcome,
};
