//! Diagnostics reported by the compiler and the linter.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity of a diagnostic. Only `Error` and `Warning` count towards the gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageCategory {
    Error,
    Warning,
    Info,
    Log,
    Debug,
}

impl MessageCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageCategory::Error => "error",
            MessageCategory::Warning => "warning",
            MessageCategory::Info => "info",
            MessageCategory::Log => "log",
            MessageCategory::Debug => "debug",
        }
    }
}

impl fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single compiler or lint message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    /// 1-based.
    pub line: u32,
    /// 1-based column.
    pub character: u32,
    #[serde(default)]
    pub width: u32,
    /// Tool that produced the message, e.g. `typescript` or `eslint`.
    pub issuer: String,
    pub category: MessageCategory,
    /// Code identifying the kind of message, e.g. `TS2322` or `max-len`.
    #[serde(rename = "type")]
    pub code: String,
}

impl Diagnostic {
    pub fn new(
        issuer: impl Into<String>,
        category: MessageCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            line: 1,
            character: 1,
            width: 0,
            issuer: issuer.into(),
            category,
            code: code.into(),
        }
    }

    pub fn at(mut self, line: u32, character: u32) -> Self {
        self.line = line;
        self.character = character;
        self
    }
}

/// Where a file lives on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub file_name: String,
    pub abs_path: String,
    pub out_directory: String,
}

/// All diagnostics of one file, ordered by line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileMessages {
    #[serde(flatten)]
    pub info: FileInfo,
    pub messages: Vec<Diagnostic>,
}

impl FileMessages {
    pub fn new(info: FileInfo) -> Self {
        Self {
            info,
            messages: Vec::new(),
        }
    }

    /// Insert keeping messages sorted by line. Messages on the same line keep
    /// their insertion order.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        let at = self
            .messages
            .partition_point(|m| m.line <= diagnostic.line);
        self.messages.insert(at, diagnostic);
    }
}

/// A diagnostic together with the file it was found in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageReference {
    pub message: Diagnostic,
    pub file_info: FileInfo,
}

/// Occurrences of one diagnostic code across the project.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageInfo {
    pub count: usize,
    pub references: Vec<MessageReference>,
}

impl MessageInfo {
    /// Category of the first occurrence, if any.
    pub fn category(&self) -> Option<MessageCategory> {
        self.references.first().map(|r| r.message.category)
    }
}
