//! Slack delivery of build notifications.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Value};

use super::{Action, Attachment, BuildStatus, Field, TitleProvider};
use crate::console::Console;
use crate::environment::Environment;
use crate::exception::{Exception, Result, StepResult};
use crate::messages::{BuilderMessages, LogFile, TimedMessage};

const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

/// Delivers one attachment to one channel.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn post(&self, token: &str, channel: &str, attachment: &Attachment) -> Result<()>;
}

/// [`ChatTransport`] using Slack's `chat.postMessage` Web API.
pub struct SlackApi {
    url: String,
    http: reqwest::Client,
}

impl Default for SlackApi {
    fn default() -> Self {
        Self {
            url: POST_MESSAGE_URL.to_string(),
            http: reqwest::Client::builder()
                .user_agent(concat!("cibuilder/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl ChatTransport for SlackApi {
    async fn post(&self, token: &str, channel: &str, attachment: &Attachment) -> Result<()> {
        let body = json!({
            "channel": channel,
            "attachments": [attachment],
            "as_user": true,
        });
        let response: Value = self
            .http
            .post(&self.url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if response.get("ok").and_then(Value::as_bool) == Some(true) {
            Ok(())
        } else {
            Err(Exception::new(format!("slack rejected message for channel '{channel}'"))
                .with_data(response))
        }
    }
}

/// Posts a summary of the build recorded in the log file.
pub struct SlackNotifier {
    env: Environment,
    console: Arc<Console>,
    messages: BuilderMessages,
    /// Why the log file could not be read, if it could not.
    load_error: Option<Exception>,
    title: Box<dyn TitleProvider>,
    transport: Arc<dyn ChatTransport>,
}

impl SlackNotifier {
    pub fn new(
        env: Environment,
        console: Arc<Console>,
        log_file: &LogFile,
        title: Box<dyn TitleProvider>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        let (messages, load_error) = match log_file.load() {
            Ok(messages) => (messages, None),
            Err(err) => (BuilderMessages::default(), Some(err)),
        };
        Self {
            env,
            console,
            messages,
            load_error,
            title,
            transport,
        }
    }

    pub fn load_error(&self) -> Option<&Exception> {
        self.load_error.as_ref()
    }

    pub fn status(&self) -> BuildStatus {
        if !self.messages.errors.is_empty() {
            BuildStatus::Danger
        } else if !self.messages.warnings.is_empty() {
            BuildStatus::Warning
        } else {
            BuildStatus::Good
        }
    }

    pub fn build_type(&self) -> String {
        if self.env.build.is_pull_request() {
            "Pull Request".to_string()
        } else if self.messages.is_release() {
            "Release".to_string()
        } else {
            format!("{} Branch", self.env.build.target_branch)
        }
    }

    pub fn build_branch(&self) -> &str {
        if self.env.build.is_pull_request() {
            &self.env.build.pull_request_branch
        } else {
            "master"
        }
    }

    pub fn fields(&self) -> Vec<Field> {
        let list = |items: &[TimedMessage]| {
            let mut items = items.to_vec();
            items.sort_by_key(|(_, millis)| *millis);
            items
                .iter()
                .map(|(msg, _)| format!("• {msg}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let mut fields = Vec::new();
        if !self.messages.errors.is_empty() {
            fields.push(Field {
                title: "Problems".to_string(),
                value: list(&self.messages.errors),
                short: false,
            });
        }
        if !self.messages.warnings.is_empty() {
            fields.push(Field {
                title: "Warnings".to_string(),
                value: list(&self.messages.warnings),
                short: false,
            });
        }
        fields
    }

    pub fn actions(&self) -> Vec<Action> {
        let repo_url = format!(
            "https://github.com/{}/{}",
            self.env.package.owner, self.env.package.repo
        );
        if self.env.build.is_pull_request() {
            let num = &self.env.build.pull_request_number;
            return vec![Action::button(format!("PR #{num}"), format!("{repo_url}/pull/{num}"))];
        }
        if self.messages.is_release() {
            let pkg = &self.env.package;
            return vec![Action::button(
                format!("{}@{}", pkg.name, pkg.version),
                format!("{repo_url}/releases/tag/{}", pkg.version),
            )];
        }
        vec![Action::button("Github", repo_url)]
    }

    pub fn attachment(&self) -> Attachment {
        let status = self.status();
        let build_type = self.build_type();
        let branch = self.build_branch();
        Attachment {
            fallback: format!(
                "{}: {}/{branch} build {}",
                status.as_str(),
                self.env.package.repo,
                status.message()
            ),
            color: status,
            title: self.title.title(&self.env, &build_type),
            title_link: self.title.title_link(&self.env),
            text: format!(
                "The _{build_type}_ build for the *{branch}* branch {}",
                status.message()
            ),
            fields: self.fields(),
            actions: self.actions(),
        }
    }

    /// Send the attachment to every channel and wait for all sends.
    ///
    /// Missing channels and failed sends are reported as warnings.
    pub async fn run(&self) -> StepResult {
        if self.env.slack_channels.is_empty() {
            self.console.warn(&Exception::new("no slack channels found"));
            return Ok(());
        }

        let attachment = self.attachment();
        let sends = self.env.slack_channels.iter().map(|entry| {
            let (token, channel) = entry.split_once('#').unwrap_or((entry.as_str(), ""));
            self.console
                .log(format!("sending message to channel: '{channel}'"));
            let attachment = &attachment;
            async move {
                self.transport
                    .post(token, channel, attachment)
                    .await
                    .map_err(|e| e.context(format!("unable to notify channel '{channel}'")))
            }
        });

        for result in join_all(sends).await {
            if let Err(err) = result {
                self.console.warn(&err);
            }
        }
        Ok(())
    }
}
