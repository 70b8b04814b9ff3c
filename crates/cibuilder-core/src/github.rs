//! GitHub repository API client.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::console::Console;
use crate::environment::Environment;
use crate::exception::{Exception, Result};

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("cibuilder/", env!("CARGO_PKG_VERSION"));

/// Hosting service of the package's repository.
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Link showing the changes between two refs.
    fn compare_link(&self, prev: &str, next: &str) -> String;

    /// Publish release notes for the current package version.
    async fn create_release(&self, changelog_file: &str, version_prefix: &str) -> Result<()>;
}

/// Payload of `POST /repos/{owner}/{repo}/releases`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRelease {
    pub tag_name: String,
    pub target_commitish: String,
    pub name: String,
    pub body: String,
    pub draft: bool,
    pub prerelease: bool,
}

/// Client for the repository named in the package manifest.
pub struct GithubClient {
    console: Arc<Console>,
    owner: String,
    repo: String,
    token: String,
    version: String,
    main_branch: String,
    api_base: String,
    http: reqwest::Client,
}

impl GithubClient {
    pub fn new(env: &Environment, console: Arc<Console>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            console,
            owner: env.package.owner.clone(),
            repo: env.package.repo.clone(),
            token: env.github_token.clone(),
            version: env.package.version.clone(),
            main_branch: "master".to_string(),
            api_base: API_BASE.to_string(),
            http,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_main_branch(mut self, branch: impl Into<String>) -> Self {
        self.main_branch = branch.into();
        self
    }

    /// Release for the current package version pointing at the changelog.
    pub fn release_for_version(&self, changelog_file: &str, version_prefix: &str) -> NewRelease {
        NewRelease {
            tag_name: self.version.clone(),
            target_commitish: self.main_branch.clone(),
            name: format!("{version_prefix}{}", self.version),
            body: format!(
                "**See [CHANGELOG](https://github.com/{}/{}/blob/{}/{changelog_file}).**",
                self.owner, self.repo, self.main_branch
            ),
            draft: false,
            prerelease: false,
        }
    }

    async fn request(&self, method: reqwest::Method, endpoint: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}/repos/{}/{}/{endpoint}", self.api_base, self.owner, self.repo);
        let mut request = self.http.request(method, &url);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(Exception::new("https request failure").with_data(json!({
                "path": url,
                "body": text,
                "code": status.as_u16(),
            })));
        }
        serde_json::from_str(&text)
            .map_err(|e| Exception::from(e).context("failed to parse JSON string"))
    }
}

#[async_trait]
impl RepositoryHost for GithubClient {
    /// `https://github.com/{owner}/{repo}/compare/{prev}...{next}`
    fn compare_link(&self, prev: &str, next: &str) -> String {
        format!(
            "https://github.com/{}/{}/compare/{prev}...{next}",
            self.owner, self.repo
        )
    }

    async fn create_release(&self, changelog_file: &str, version_prefix: &str) -> Result<()> {
        let release = serde_json::to_value(self.release_for_version(changelog_file, version_prefix))?;
        self.request(reqwest::Method::POST, "releases", Some(&release))
            .await
            .map_err(|err| {
                Exception::new("Failed to release to GitHub")
                    .with_data(json!({
                        "version": self.version,
                        "owner": self.owner,
                        "repo": self.repo,
                    }))
                    .with_cause(err)
            })?;
        self.console.log("Created Github release");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{BuildInfo, CiKind, PackageInfo};

    fn client() -> GithubClient {
        let env = Environment {
            ci: CiKind::None,
            build: BuildInfo::default(),
            github_token: String::new(),
            slack_channels: vec![],
            is_release_setup: false,
            is_pre_release: false,
            package: PackageInfo {
                name: "widgets".into(),
                version: "2.1.0".into(),
                owner: "acme".into(),
                repo: "widgets".into(),
                data: Value::Null,
            },
            error: None,
        };
        GithubClient::new(&env, Arc::new(Console::new(CiKind::None)))
    }

    #[test]
    fn test_compare_link() {
        assert_eq!(
            client().compare_link("1.0.0", "HEAD"),
            "https://github.com/acme/widgets/compare/1.0.0...HEAD"
        );
    }

    #[test]
    fn test_release_payload() {
        let release = client().release_for_version("CHANGELOG.md", "Version ");
        assert_eq!(release.tag_name, "2.1.0");
        assert_eq!(release.target_commitish, "master");
        assert_eq!(release.name, "Version 2.1.0");
        assert_eq!(
            release.body,
            "**See [CHANGELOG](https://github.com/acme/widgets/blob/master/CHANGELOG.md).**"
        );
    }
}
