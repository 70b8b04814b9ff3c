//! In-memory fakes for builder services (testing only)
//!
//! Provides `MemorySink`, `MemoryGit`, `MemoryRegistry`, `MemoryHost` and
//! `ScriptedPrompt`, which satisfy the service traits without touching git,
//! the registry or the network. All of them can share a [`Journal`] so tests
//! can assert the interleaving of calls across services.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::builder::BuildContext;
use crate::console::{Console, LineSink};
use crate::environment::{BuildInfo, CiKind, Environment, PackageInfo};
use crate::exception::{Exception, Result};
use crate::git::Git;
use crate::github::RepositoryHost;
use crate::messages::LogFile;
use crate::prompt::VersionPrompt;
use crate::registry::Registry;

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

/// Shared, ordered record of calls.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// Console sink keeping every line in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, line: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|l| l == line)
    }
}

impl LineSink for MemorySink {
    fn write_line(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}

// ---------------------------------------------------------------------------
// MemoryGit
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct GitState {
    branch: String,
    commit: String,
    modified: Vec<String>,
}

/// Git fake tracking the current branch. Operations named in `failing` return
/// an error without changing state.
#[derive(Debug)]
pub struct MemoryGit {
    state: Mutex<GitState>,
    failing: HashSet<String>,
    journal: Journal,
}

impl MemoryGit {
    pub fn new(branch: &str) -> Self {
        Self {
            state: Mutex::new(GitState {
                branch: branch.to_string(),
                commit: "0000000".to_string(),
                modified: Vec::new(),
            }),
            failing: HashSet::new(),
            journal: Journal::default(),
        }
    }

    pub fn with_commit(self, commit: &str) -> Self {
        self.state.lock().unwrap().commit = commit.to_string();
        self
    }

    pub fn with_modified_files(self, files: &[&str]) -> Self {
        self.state.lock().unwrap().modified = files.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Make `op` (e.g. `"switch_branch"`) fail.
    pub fn failing(mut self, op: &str) -> Self {
        self.failing.insert(op.to_string());
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn branch(&self) -> String {
        self.state.lock().unwrap().branch.clone()
    }

    fn call(&self, op: &str, entry: String) -> Result<()> {
        self.journal.record(entry);
        if self.failing.contains(op) {
            return Err(Exception::new(format!("Git.{op} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl Git for MemoryGit {
    async fn current_branch(&self) -> Result<String> {
        self.call("current_branch", "git.current_branch".into())?;
        Ok(self.branch())
    }

    async fn first_commit(&self) -> Result<String> {
        self.call("first_commit", "git.first_commit".into())?;
        Ok(self.state.lock().unwrap().commit.clone())
    }

    async fn current_commit(&self) -> Result<String> {
        self.call("current_commit", "git.current_commit".into())?;
        Ok(self.state.lock().unwrap().commit.clone())
    }

    async fn modified_files(&self) -> Result<Vec<String>> {
        self.call("modified_files", "git.modified_files".into())?;
        Ok(self.state.lock().unwrap().modified.clone())
    }

    async fn switch_branch(&self, branch: &str, create: bool) -> Result<()> {
        self.call("switch_branch", format!("git.switch_branch({branch}, {create})"))?;
        self.state.lock().unwrap().branch = branch.to_string();
        Ok(())
    }

    async fn discard_changes(&self) -> Result<()> {
        self.call("discard_changes", "git.discard_changes".into())?;
        self.state.lock().unwrap().modified.clear();
        Ok(())
    }

    async fn delete_branch(&self, branch: &str) -> Result<()> {
        self.call("delete_branch", format!("git.delete_branch({branch})"))
    }
}

// ---------------------------------------------------------------------------
// MemoryRegistry
// ---------------------------------------------------------------------------

/// Registry fake with a fixed published version.
#[derive(Debug)]
pub struct MemoryRegistry {
    latest: String,
    published: Mutex<Vec<(String, String)>>,
    fail_publish: bool,
    journal: Journal,
}

impl MemoryRegistry {
    pub fn new(latest: &str) -> Self {
        Self {
            latest: latest.to_string(),
            published: Mutex::new(Vec::new()),
            fail_publish: false,
            journal: Journal::default(),
        }
    }

    pub fn failing_publish(mut self) -> Self {
        self.fail_publish = true;
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    /// `(version, tag)` pairs published so far.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn publish(&self, version: &str, tag: &str) -> Result<()> {
        self.journal.record(format!("registry.publish({version}, {tag})"));
        if self.fail_publish {
            return Err(Exception::new("yarn publish failed"));
        }
        self.published
            .lock()
            .unwrap()
            .push((version.to_string(), tag.to_string()));
        Ok(())
    }

    async fn whoami(&self) -> Result<String> {
        Ok("ci-bot".to_string())
    }

    async fn latest_version(&self) -> Result<String> {
        Ok(self.latest.clone())
    }
}

// ---------------------------------------------------------------------------
// MemoryHost
// ---------------------------------------------------------------------------

/// Repository host fake producing GitHub-style links.
#[derive(Debug)]
pub struct MemoryHost {
    owner: String,
    repo: String,
    releases: Mutex<Vec<String>>,
}

impl MemoryHost {
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            releases: Mutex::new(Vec::new()),
        }
    }

    /// Names of the releases created so far.
    pub fn releases(&self) -> Vec<String> {
        self.releases.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepositoryHost for MemoryHost {
    fn compare_link(&self, prev: &str, next: &str) -> String {
        format!(
            "https://github.com/{}/{}/compare/{prev}...{next}",
            self.owner, self.repo
        )
    }

    async fn create_release(&self, _changelog_file: &str, version_prefix: &str) -> Result<()> {
        self.releases.lock().unwrap().push(version_prefix.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedPrompt
// ---------------------------------------------------------------------------

/// Prompt answering every question with the same version.
#[derive(Debug)]
pub struct ScriptedPrompt {
    answer: String,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Current versions the prompt was shown with.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl VersionPrompt for ScriptedPrompt {
    async fn next_version(&self, current: &str) -> Result<String> {
        self.asked.lock().unwrap().push(current.to_string());
        Ok(self.answer.clone())
    }
}

// ---------------------------------------------------------------------------
// Context helpers
// ---------------------------------------------------------------------------

/// Environment for the `acme/widgets` package at `version`.
pub fn package_env(ci: CiKind, version: &str) -> Environment {
    Environment {
        ci,
        build: BuildInfo::default(),
        github_token: String::new(),
        slack_channels: Vec::new(),
        is_release_setup: false,
        is_pre_release: false,
        package: PackageInfo {
            name: "widgets".to_string(),
            version: version.to_string(),
            owner: "acme".to_string(),
            repo: "widgets".to_string(),
            data: Value::Null,
        },
        error: None,
    }
}

/// Unique log file path under the system temp dir.
pub fn temp_log_file() -> LogFile {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    LogFile::new(std::env::temp_dir().join(format!(
        "cibuilder-log-{}-{n}.json",
        std::process::id()
    )))
}

/// Context wired entirely with fakes, printing into a [`MemorySink`].
///
/// Disables terminal colors so captured lines can be compared verbatim.
pub fn context_for(env: Environment) -> (BuildContext, Arc<MemorySink>) {
    colored::control::set_override(false);
    let sink = Arc::new(MemorySink::default());
    let console = Arc::new(Console::with_sink(env.ci, sink.clone()));
    let branch = if env.build.target_branch.is_empty() {
        "master"
    } else {
        env.build.target_branch.as_str()
    };
    let ctx = BuildContext {
        git: Arc::new(MemoryGit::new(branch)),
        registry: Arc::new(MemoryRegistry::new(&env.package.version)),
        host: Arc::new(MemoryHost::new(&env.package.owner, &env.package.repo)),
        prompt: Arc::new(ScriptedPrompt::new("0.0.1")),
        log_file: temp_log_file(),
        console,
        env,
    };
    (ctx, sink)
}
