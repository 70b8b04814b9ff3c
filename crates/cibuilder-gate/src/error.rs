use std::path::PathBuf;

use cibuilder_core::Exception;

/// Failures of the gate itself, as opposed to verdicts.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("unable to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} is not a valid -D argument")]
    InvalidDefinition(String),

    #[error("invalid value '{value}' for -D{name}")]
    InvalidValue { name: String, value: String },

    /// The compiler or linter could not produce diagnostics.
    #[error("{tool}: {message}")]
    Tool { tool: String, message: String },
}

impl GateError {
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

impl From<GateError> for Exception {
    fn from(err: GateError) -> Self {
        Exception::from_error(&err)
    }
}
