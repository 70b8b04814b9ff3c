//! Version control operations used by the builder.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::console::Console;
use crate::exception::{Exception, Result};
use crate::process::CommandLine;

/// Git operations the builder depends on.
#[async_trait]
pub trait Git: Send + Sync {
    async fn current_branch(&self) -> Result<String>;

    /// Root commit of the repository.
    async fn first_commit(&self) -> Result<String>;

    async fn current_commit(&self) -> Result<String>;

    /// Entries of `git status -s`, one per modified or untracked path.
    async fn modified_files(&self) -> Result<Vec<String>>;

    async fn switch_branch(&self, branch: &str, create: bool) -> Result<()>;

    /// Reset tracked files and remove untracked ones.
    async fn discard_changes(&self) -> Result<()>;

    async fn delete_branch(&self, branch: &str) -> Result<()>;

    /// Discard changes on `from`, check out `to`, then delete `from`.
    async fn switch_and_delete(&self, to: &str, from: &str) -> Result<()> {
        self.discard_changes().await?;
        self.switch_branch(to, false).await?;
        self.delete_branch(from).await
    }
}

/// [`Git`] backed by the `git` executable.
pub struct GitCli {
    console: Arc<Console>,
    repo_dir: Option<PathBuf>,
}

impl GitCli {
    pub fn new(console: Arc<Console>) -> Self {
        Self {
            console,
            repo_dir: None,
        }
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.repo_dir = Some(dir.into());
        self
    }

    fn git<'a>(&self, args: impl IntoIterator<Item = &'a str>) -> CommandLine {
        let cmd = CommandLine::new("git").args(args);
        match &self.repo_dir {
            Some(dir) => cmd.current_dir(dir),
            None => cmd,
        }
    }

    async fn read(&self, op: &str, cmd: CommandLine) -> Result<String> {
        cmd.read()
            .await
            .map_err(|e| Exception::from(e).context(format!("Git.{op} failure")))
    }
}

#[async_trait]
impl Git for GitCli {
    async fn current_branch(&self) -> Result<String> {
        let branch = self
            .read("currentBranch", self.git(["rev-parse", "--abbrev-ref", "HEAD"]))
            .await?;
        self.console.log(format!("Git branch: {branch}"));
        Ok(branch)
    }

    async fn first_commit(&self) -> Result<String> {
        let commit = self
            .read("firstCommit", self.git(["rev-list", "--max-parents=0", "HEAD"]))
            .await?;
        self.console.log(format!("First commit: {commit}"));
        Ok(commit)
    }

    async fn current_commit(&self) -> Result<String> {
        let commit = self.read("currentCommit", self.git(["rev-parse", "HEAD"])).await?;
        self.console.log(format!("Current commit: {commit}"));
        Ok(commit)
    }

    async fn modified_files(&self) -> Result<Vec<String>> {
        let status = self.read("modifiedFiles", self.git(["status", "-s"])).await?;
        Ok(status
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    async fn switch_branch(&self, branch: &str, create: bool) -> Result<()> {
        let mut args = vec!["checkout"];
        if create {
            args.push("-b");
        }
        args.extend([branch, "-q"]);
        self.read(&format!("switchBranch({branch}, {create})"), self.git(args))
            .await?;
        self.console.log(format!("Switched to '{branch}' branch"));
        Ok(())
    }

    async fn discard_changes(&self) -> Result<()> {
        self.read("discardChanges", self.git(["reset", "--hard"])).await?;
        self.read("discardChanges", self.git(["clean", "-fd"])).await?;
        self.console.log("Branch changes have been discarded");
        Ok(())
    }

    async fn delete_branch(&self, branch: &str) -> Result<()> {
        self.read(&format!("deleteBranch('{branch}')"), self.git(["branch", "-D", branch, "-q"]))
            .await?;
        self.console.log(format!("'{branch}' branch has been deleted"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::CiKind;
    use crate::fakes::MemorySink;
    use std::path::Path;
    use std::process::Command as StdCommand;

    fn run_git(repo_dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn init_repo(dir: &Path) {
        run_git(dir, &["init", "-q", "-b", "master"]);
        run_git(dir, &["config", "user.email", "ci@example.com"]);
        run_git(dir, &["config", "user.name", "CI"]);
        std::fs::write(dir.join("README.md"), "# test\n").unwrap();
        run_git(dir, &["add", "."]);
        run_git(dir, &["commit", "-q", "-m", "initial"]);
    }

    fn git_in(dir: &Path) -> (GitCli, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let console = Arc::new(Console::with_sink(CiKind::Other, sink.clone()));
        (GitCli::new(console).in_dir(dir), sink)
    }

    #[tokio::test]
    async fn test_branch_and_commits() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let (git, sink) = git_in(dir.path());

        assert_eq!(git.current_branch().await.unwrap(), "master");
        let head = git.current_commit().await.unwrap();
        assert_eq!(head.len(), 40);
        assert_eq!(git.first_commit().await.unwrap(), head);
        assert!(sink.lines().contains(&"Git branch: master".to_string()));
    }

    #[tokio::test]
    async fn test_modified_files_and_switch_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path());
        let (git, sink) = git_in(dir.path());

        assert!(git.modified_files().await.unwrap().is_empty());

        git.switch_branch("__build", true).await.unwrap();
        std::fs::write(dir.path().join("README.md"), "changed\n").unwrap();
        std::fs::write(dir.path().join("new.txt"), "x\n").unwrap();
        assert_eq!(
            git.modified_files().await.unwrap(),
            vec!["M README.md", "?? new.txt"]
        );

        git.switch_and_delete("master", "__build").await.unwrap();
        assert!(git.modified_files().await.unwrap().is_empty());
        assert_eq!(git.current_branch().await.unwrap(), "master");
        assert!(sink
            .lines()
            .contains(&"'__build' branch has been deleted".to_string()));
    }

    #[tokio::test]
    async fn test_failure_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        let (git, _) = git_in(dir.path());
        let err = git.current_branch().await.unwrap_err();
        assert_eq!(err.message, "Git.currentBranch failure");
        assert!(err.cause.is_some());
    }
}
