//! Interactive selection of the next release version.

use async_trait::async_trait;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;

use crate::exception::{Exception, Result};
use crate::version::{Bump, Semver};

/// Asks the operator which version the next release gets.
#[async_trait]
pub trait VersionPrompt: Send + Sync {
    async fn next_version(&self, current: &str) -> Result<String>;
}

/// Patch, minor and major candidates for `current`, in that order.
pub fn version_choices(current: &str) -> Result<Vec<String>> {
    let version = Semver::parse(current)
        .ok_or_else(|| Exception::new(format!("Unable to parse version: {current}")))?;
    Ok(Bump::ALL
        .iter()
        .map(|bump| version.bump(*bump).to_string())
        .collect())
}

/// Terminal prompt rendered with `dialoguer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DialoguerPrompt;

#[async_trait]
impl VersionPrompt for DialoguerPrompt {
    async fn next_version(&self, current: &str) -> Result<String> {
        let choices = version_choices(current)?;
        let prompt = format!("Current version is {current}. Choose the next version:");
        let items = choices.clone();
        let selected = tokio::task::spawn_blocking(move || {
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .items(&items)
                .default(0)
                .interact()
        })
        .await
        .map_err(|e| Exception::new("version prompt aborted").with_cause(e.to_string()))?
        .map_err(|e| Exception::new("version prompt failed").with_cause(e.to_string()))?;

        choices
            .get(selected)
            .cloned()
            .ok_or_else(|| Exception::new("invalid version selection"))
    }
}
