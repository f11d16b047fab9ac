//! Attempt failures and the terminal run error.

use crate::api::tracing::UsageTracker;
use crate::schema::CoercionError;
use std::fmt;
use thiserror::Error;

/// Why a single attempt produced no accepted result. Every variant costs
/// one attempt; permanent backend errors are turned into
/// [`ExtractionError::Backend`] instead.
#[derive(Debug, Clone, Error)]
pub enum AttemptFailure {
    #[error("no structured result: {0}")]
    NoAnswer(String),
    #[error("{0}")]
    Coercion(CoercionError),
    #[error("result rejected: {0}")]
    Rejected(String),
    #[error("tool '{tool}' failed after {attempts} attempt(s): {reason}")]
    ToolFailed {
        tool: String,
        reason: String,
        attempts: u32,
    },
    #[error("no result within {0} backend round(s)")]
    RoundLimit(u32),
    #[error("backend error: {0}")]
    Backend(String),
}

impl AttemptFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            AttemptFailure::NoAnswer(_) => FailureKind::NoAnswer,
            AttemptFailure::Coercion(_) => FailureKind::Coercion,
            AttemptFailure::Rejected(_) => FailureKind::Rejected,
            AttemptFailure::ToolFailed { .. } => FailureKind::ToolFailed,
            AttemptFailure::RoundLimit(_) => FailureKind::RoundLimit,
            AttemptFailure::Backend(_) => FailureKind::Backend,
        }
    }
}

/// Discriminant of [`AttemptFailure`], cheap to copy into events and history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NoAnswer,
    Coercion,
    Rejected,
    ToolFailed,
    RoundLimit,
    Backend,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::NoAnswer => "no answer",
            FailureKind::Coercion => "schema mismatch",
            FailureKind::Rejected => "rejected",
            FailureKind::ToolFailed => "tool failed",
            FailureKind::RoundLimit => "round limit",
            FailureKind::Backend => "backend error",
        };
        f.write_str(s)
    }
}

/// One failed attempt, kept for the exhaustion report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 1-indexed.
    pub attempt: u32,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Every attempt failed. No partial result survives.
    #[error("no valid result after {attempts} attempt(s); last failure: {last_failure}")]
    Exhausted {
        trace_id: String,
        attempts: u32,
        last_failure: String,
        history: Vec<AttemptRecord>,
        usage: UsageTracker,
    },
    /// The backend refused the request outright (auth, bad request).
    #[error("backend rejected the request: {0}")]
    Backend(String),
}

impl ExtractionError {
    /// Token usage spent before the run failed, when known.
    pub fn usage(&self) -> Option<&UsageTracker> {
        match self {
            ExtractionError::Exhausted { usage, .. } => Some(usage),
            ExtractionError::Backend(_) => None,
        }
    }
}
