//! Package registry operations.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::console::Console;
use crate::environment::PackageInfo;
use crate::exception::{Exception, Result};
use crate::process::CommandLine;

/// Registry operations used by release policies.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Publish the working tree as `version` under the dist-tag `tag`.
    async fn publish(&self, version: &str, tag: &str) -> Result<()>;

    /// User authenticated against the package's publish registry.
    async fn whoami(&self) -> Result<String>;

    /// Version currently published under the `latest` tag.
    async fn latest_version(&self) -> Result<String>;
}

/// [`Registry`] backed by the `yarn` and `npm` executables.
pub struct YarnRegistry {
    console: Arc<Console>,
    package: PackageInfo,
    project_dir: Option<PathBuf>,
}

impl YarnRegistry {
    pub fn new(console: Arc<Console>, package: PackageInfo) -> Self {
        Self {
            console,
            package,
            project_dir: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    fn command(&self, program: &str) -> CommandLine {
        let cmd = CommandLine::new(program);
        match &self.project_dir {
            Some(dir) => cmd.current_dir(dir),
            None => cmd,
        }
    }
}

#[async_trait]
impl Registry for YarnRegistry {
    async fn publish(&self, version: &str, tag: &str) -> Result<()> {
        self.console.open_block("yarn-publish", "publishing");
        let result = self
            .command("yarn")
            .args(["publish", "--new-version", version, "--tag", tag])
            .inherit_output()
            .run()
            .await;
        self.console.close_block("yarn-publish");
        result
            .map(|_| ())
            .map_err(|e| Exception::from(e).context("yarn publish failed"))
    }

    async fn whoami(&self) -> Result<String> {
        let registry = self
            .package
            .publish_registry()
            .ok_or_else(|| Exception::new("missing publishConfig.registry in package.json"))?;
        self.command("npm")
            .args(["whoami", "--registry", registry])
            .read()
            .await
            .map_err(|e| Exception::from(e).context("npm whoami failure"))
    }

    async fn latest_version(&self) -> Result<String> {
        let output = self
            .command("yarn")
            .args(["info", self.package.name.as_str(), "version", "--json"])
            .run()
            .await
            .map_err(|e| {
                Exception::from(e).context("failure to obtain package version from registry")
            })?;
        parse_yarn_info(&output.stdout)
    }
}

/// Extract `data` from a `yarn info --json` response.
fn parse_yarn_info(response: &str) -> Result<String> {
    let parsed: std::result::Result<Value, _> = serde_json::from_str(response.trim());
    match parsed {
        Ok(Value::Object(obj)) => match obj.get("data") {
            Some(Value::String(version)) => Ok(version.clone()),
            _ => Err(Exception::new("failed to parse yarn response")
                .with_data(json!({ "response": response }))),
        },
        Ok(_) => Err(Exception::new("failed to parse yarn response")
            .with_data(json!({ "response": response }))),
        Err(err) => Err(Exception::new("failed to parse yarn response")
            .with_data(json!({ "response": response }))
            .with_cause(err)),
    }
}
