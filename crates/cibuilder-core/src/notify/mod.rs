//! Chat notifications summarising a CI build.
//!
//! The notifier reads the log file written by the builder (and by the gate,
//! when it ran in the same job) and posts one attachment to every configured
//! channel. Channels are independent, so sends run concurrently; the notifier
//! waits for all of them before returning.

pub mod slack;
pub mod travis;

use serde::{Deserialize, Serialize};

pub use slack::{ChatTransport, SlackApi, SlackNotifier};
pub use travis::TravisTitle;

use crate::environment::Environment;

/// Attachment color, derived from the recorded messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Good,
    Warning,
    Danger,
}

impl BuildStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildStatus::Good => "good",
            BuildStatus::Warning => "warning",
            BuildStatus::Danger => "danger",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            BuildStatus::Good => "passed with flying colors!",
            BuildStatus::Warning => "passed, but check the logs.",
            BuildStatus::Danger => "failed.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    pub short: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub url: String,
}

impl Action {
    pub fn button(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: "button".to_string(),
            text: text.into(),
            url: url.into(),
        }
    }
}

/// Legacy Slack message attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub fallback: String,
    pub color: BuildStatus,
    pub title: String,
    pub title_link: String,
    pub text: String,
    pub fields: Vec<Field>,
    pub actions: Vec<Action>,
}

/// CI-service specific title of a notification.
pub trait TitleProvider: Send + Sync {
    fn title(&self, env: &Environment, build_type: &str) -> String;

    fn title_link(&self, env: &Environment) -> String;
}
