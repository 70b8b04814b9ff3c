//! Package manifest (`package.json`) reading.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::version::Semver;

/// Pattern splitting a git remote into `(prefix, owner, repo)`.
const REPOSITORY_URL_PATTERN: &str = r"(.*)[/:](.*)/(.*)\.git$";

/// Errors raised while reading the package manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("unable to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("package.json missing \"{0}\" field")]
    MissingField(&'static str),

    #[error("package.json \"version\" field is not parsable: {0}")]
    InvalidVersion(String),

    #[error("failed to match on git url: {0}")]
    RepositoryUrl(String),
}

/// The fields of the manifest the builder relies on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    /// Owner of the git repository.
    pub owner: String,
    /// Name of the git repository.
    pub repo: String,
    /// Full manifest contents.
    pub data: Value,
}

impl PackageInfo {
    pub fn read(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let data: Value = serde_json::from_str(&text).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_value(data)
    }

    pub fn from_value(data: Value) -> Result<Self, ManifestError> {
        let name = data
            .get("name")
            .and_then(Value::as_str)
            .ok_or(ManifestError::MissingField("name"))?
            .to_string();

        let version = data
            .get("version")
            .and_then(Value::as_str)
            .ok_or(ManifestError::MissingField("version"))?
            .to_string();
        if Semver::parse(&version).is_none() {
            return Err(ManifestError::InvalidVersion(version));
        }

        let url = match data.get("repository") {
            Some(Value::String(url)) => url.as_str(),
            Some(other) => other
                .get("url")
                .and_then(Value::as_str)
                .ok_or(ManifestError::MissingField("repository"))?,
            None => return Err(ManifestError::MissingField("repository")),
        };
        let (owner, repo) = split_repository_url(url)?;

        Ok(Self {
            name,
            version,
            owner,
            repo,
            data,
        })
    }

    /// `publishConfig.registry`, when the manifest pins one.
    pub fn publish_registry(&self) -> Option<&str> {
        self.data
            .get("publishConfig")
            .and_then(|c| c.get("registry"))
            .and_then(Value::as_str)
    }
}

fn split_repository_url(url: &str) -> Result<(String, String), ManifestError> {
    let captures = regex::Regex::new(REPOSITORY_URL_PATTERN)
        .ok()
        .and_then(|re| {
            re.captures(url)
                .map(|c| (c[2].to_string(), c[3].to_string()))
        });
    captures.ok_or_else(|| ManifestError::RepositoryUrl(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_repository_forms() {
        let https = PackageInfo::from_value(json!({
            "name": "pkg",
            "version": "1.0.0",
            "repository": { "type": "git", "url": "git+https://github.com/acme/widgets.git" },
        }))
        .unwrap();
        assert_eq!((https.owner.as_str(), https.repo.as_str()), ("acme", "widgets"));

        let ssh = PackageInfo::from_value(json!({
            "name": "pkg",
            "version": "1.0.0",
            "repository": "git@github.com:acme/widgets.git",
        }))
        .unwrap();
        assert_eq!((ssh.owner.as_str(), ssh.repo.as_str()), ("acme", "widgets"));
    }

    #[test]
    fn test_missing_and_invalid_fields() {
        let err = PackageInfo::from_value(json!({ "version": "1.0.0" })).unwrap_err();
        assert_eq!(err.to_string(), "package.json missing \"name\" field");

        let err = PackageInfo::from_value(json!({ "name": "p", "version": "latest" })).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidVersion(v) if v == "latest"));

        let err = PackageInfo::from_value(json!({
            "name": "p",
            "version": "1.0.0",
            "repository": "https://example.com/not-a-git-remote",
        }))
        .unwrap_err();
        assert!(matches!(err, ManifestError::RepositoryUrl(_)));
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PackageInfo::read(&dir.path().join("package.json")).unwrap_err();
        assert!(matches!(err, ManifestError::Read { .. }));
    }

    #[test]
    fn test_publish_registry() {
        let info = PackageInfo::from_value(json!({
            "name": "p",
            "version": "1.0.0",
            "repository": "https://github.com/a/b.git",
            "publishConfig": { "registry": "https://npm.example.com" },
        }))
        .unwrap();
        assert_eq!(info.publish_registry(), Some("https://npm.example.com"));
    }
}
