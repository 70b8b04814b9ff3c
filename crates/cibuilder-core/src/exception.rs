//! Structured failure payload carried by every build step.
//!
//! An [`Exception`] is created where a failure happens and composed by
//! wrapping: the outer exception keeps the inner one as its `cause`, so the
//! full chain survives to the process boundary where it is dumped as JSON.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Failure with optional context and a singly-linked cause chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
#[serde(rename_all = "camelCase")]
pub struct Exception {
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Arbitrary structured context (raw tool output, offending values).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[source]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<Exception>>,

    /// Captured frames, empty unless backtraces are enabled (`RUST_BACKTRACE`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack_trace: Vec<String>,
}

/// Result type used across the builder.
pub type Result<T, E = Exception> = std::result::Result<T, E>;

/// Outcome of a single build step. The success payload carries no data.
pub type StepResult = Result<()>;

impl Exception {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            description: None,
            data: None,
            cause: None,
            stack_trace: capture_stack_trace(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_cause(mut self, cause: impl Into<Exception>) -> Self {
        self.cause = Some(Box::new(cause.into()));
        self
    }

    /// Convert an arbitrary error and its `source()` chain.
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        let mut exception = Self::new(err.to_string());
        if let Some(source) = err.source() {
            exception.cause = Some(Box::new(Self::from_error(source)));
        }
        exception
    }

    /// Wrap `self` as the cause of a new exception with `message`.
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::new(message).with_cause(self)
    }

    /// Plain structured object with the cause chain fully expanded.
    pub fn to_object(&self) -> Value {
        serde_json::to_value(self)
            .unwrap_or_else(|_| serde_json::json!({ "message": self.message }))
    }

    /// Iterate this exception followed by each nested cause.
    pub fn chain(&self) -> impl Iterator<Item = &Exception> {
        std::iter::successors(Some(self), |e| e.cause.as_deref())
    }
}

fn capture_stack_trace() -> Vec<String> {
    let backtrace = Backtrace::capture();
    if backtrace.status() != BacktraceStatus::Captured {
        return Vec::new();
    }
    backtrace
        .to_string()
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

impl From<std::io::Error> for Exception {
    fn from(err: std::io::Error) -> Self {
        Self::from_error(&err)
    }
}

impl From<serde_json::Error> for Exception {
    fn from(err: serde_json::Error) -> Self {
        Self::from_error(&err)
    }
}

impl From<reqwest::Error> for Exception {
    fn from(err: reqwest::Error) -> Self {
        Self::from_error(&err)
    }
}

impl From<&str> for Exception {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for Exception {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}
