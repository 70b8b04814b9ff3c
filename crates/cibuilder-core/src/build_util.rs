//! Version verification and release file edits shared by release policies.

use std::path::Path;

use crate::builder::BuildContext;
use crate::exception::{Exception, Result, StepResult};
use crate::github::RepositoryHost;
use crate::version::Semver;

const UNRELEASED_HEADING: &str = "## [Unreleased]";

/// Helpers operating on the services of a [`BuildContext`].
pub struct BuildUtil<'a> {
    ctx: &'a BuildContext,
}

impl<'a> BuildUtil<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        Self { ctx }
    }

    async fn published_version(&self) -> Result<Semver> {
        let raw = self.ctx.registry.latest_version().await?;
        Semver::parse(&raw)
            .ok_or_else(|| Exception::new(format!("Unable to parse version: {raw}")))
    }

    fn package_version(&self) -> Result<Semver> {
        let raw = &self.ctx.env.package.version;
        Semver::parse(raw).ok_or_else(|| Exception::new(format!("Unable to parse version: {raw}")))
    }

    /// Non-release pull requests must not touch the package version.
    pub async fn verify_untouched_package_version(&self) -> StepResult {
        let published = self.published_version().await?;
        if published.is_prerelease() {
            self.ctx.console.log("Package has only been pre-released");
            return Ok(());
        }
        if self.package_version()? != published {
            return Err(Exception::new("Modifications to package version are not allowed"));
        }
        Ok(())
    }

    /// Release pull requests must bump the package version.
    pub async fn verify_new_package_version(&self) -> StepResult {
        let published = self.published_version().await?;
        if self.package_version()? <= published {
            return Err(Exception::new(format!("Package version needs to be > {published}")));
        }
        Ok(())
    }

    /// Move the `Unreleased` entries of the changelog under `new_version` and
    /// regenerate the compare links.
    pub async fn update_changelog(&self, new_version: &str, path: &Path) -> StepResult {
        let content = read_file(path)?;
        let first_commit = self.ctx.git.first_commit().await?;
        let date = chrono::Local::now().format("%B %-d, %Y").to_string();
        let updated = changelog_with_release(
            &content,
            new_version,
            &first_commit,
            &date,
            self.ctx.host.as_ref(),
        )?;
        write_file(path, &updated)
    }

    /// Replace every occurrence of `current` with `new` in the README.
    pub fn replace_versions_in_readme(&self, current: &str, new: &str, path: &Path) -> StepResult {
        let content = read_file(path)?;
        write_file(path, &content.replace(current, new))
    }
}

/// Rewrite the top-level `"version"` entry of a package manifest.
pub fn change_package_version(new_version: &str, path: &Path) -> StepResult {
    let content = read_file(path)?;
    let mut replaced = false;
    let lines: Vec<String> = content
        .split('\n')
        .map(|line| {
            if !replaced && line.trim_start().starts_with("\"version\"") {
                replaced = true;
                format!("  \"version\": \"{new_version}\",")
            } else {
                line.to_string()
            }
        })
        .collect();
    if !replaced {
        return Err(Exception::new(format!(
            "no \"version\" field found in {}",
            path.display()
        )));
    }
    write_file(path, &lines.join("\n"))
}

fn changelog_with_release(
    content: &str,
    new_version: &str,
    first_commit: &str,
    date: &str,
    host: &dyn RepositoryHost,
) -> Result<String> {
    let (header, main) = content
        .split_once(UNRELEASED_HEADING)
        .filter(|(_, main)| !main.is_empty())
        .ok_or_else(|| Exception::new("Missing \"Unreleased\" link"))?;

    let entries = main.split("[Unreleased]:").next().unwrap_or_default();

    let mut versions: Vec<&str> = vec![new_version];
    versions.extend(entries.lines().filter_map(|line| {
        let rest = line.strip_prefix("## [")?;
        let end = rest.find(']')?;
        Some(&rest[..end]).filter(|v| !v.is_empty())
    }));
    versions.push(first_commit);

    let mut links = vec![format!("[Unreleased]: {}", host.compare_link(new_version, "HEAD"))];
    for pair in versions.windows(2) {
        links.push(format!("[{}]: {}", pair[0], host.compare_link(pair[1], pair[0])));
    }

    Ok(format!(
        "{header}{UNRELEASED_HEADING}\n\n## [{new_version}] - {date}\n\n{entries}{}\n",
        links.join("\n")
    ))
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Exception::from(e).context(format!("unable to read {}", path.display())))
}

fn write_file(path: &Path, content: &str) -> StepResult {
    std::fs::write(path, content)
        .map_err(|e| Exception::from(e).context(format!("unable to write {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Links;

    #[async_trait]
    impl RepositoryHost for Links {
        fn compare_link(&self, prev: &str, next: &str) -> String {
            format!("https://github.com/acme/widgets/compare/{prev}...{next}")
        }

        async fn create_release(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_changelog_with_release() {
        let content = "# Changelog\n\n## [Unreleased]\n\n### Fixed\n- thing\n\n## [1.0.0] - May 1, 2024\n\n- first\n\n[Unreleased]: old\n[1.0.0]: old\n";
        let updated = changelog_with_release(content, "1.1.0", "abc123", "June 2, 2024", &Links).unwrap();
        assert_eq!(
            updated,
            "# Changelog\n\n## [Unreleased]\n\n## [1.1.0] - June 2, 2024\n\n\n\n### Fixed\n- thing\n\n## [1.0.0] - May 1, 2024\n\n- first\n\n\
[Unreleased]: https://github.com/acme/widgets/compare/1.1.0...HEAD\n\
[1.1.0]: https://github.com/acme/widgets/compare/1.0.0...1.1.0\n\
[1.0.0]: https://github.com/acme/widgets/compare/abc123...1.0.0\n"
        );
    }

    #[test]
    fn test_changelog_without_unreleased_section() {
        let err = changelog_with_release("# Changelog\n", "1.0.0", "abc", "x", &Links).unwrap_err();
        assert_eq!(err.message, "Missing \"Unreleased\" link");
    }

    #[test]
    fn test_change_package_version_only_top_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package.json");
        std::fs::write(
            &path,
            "{\n  \"name\": \"w\",\n  \"version\": \"1.0.0\",\n  \"engines\": {\n    \"version\": \"x\"\n  }\n}\n",
        )
        .unwrap();
        change_package_version("1.1.0", &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("  \"version\": \"1.1.0\",\n"));
        assert!(content.contains("    \"version\": \"x\""));
    }
}
