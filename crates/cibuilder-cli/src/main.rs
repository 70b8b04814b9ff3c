//! cibuilder - release builder for npm packages on CI
//!
//! ## Commands
//!
//! - `build`: Run the builder state machine for the current CI build
//! - `notify`: Post a summary of the build log to the configured chat channels

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::Level;

use cibuilder_core::{
    run_builder, BuildContext, CiBuilder, Console, Environment, LogFile, NpmPolicy, NpmPolicyConfig, SlackApi,
    SlackNotifier, TravisTitle, DEFAULT_LOG_FILE,
};

#[derive(Parser)]
#[command(name = "cibuilder")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Release builder for npm packages on CI", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Project directory (default: current directory)
    #[arg(short = 'C', long, global = true, default_value = ".")]
    dir: PathBuf,

    /// Log file shared by the builder, the gate and the notifier
    #[arg(long, global = true, env = "CIBUILDER_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the builder for the current CI build
    Build(BuildArgs),

    /// Send the build summary to every configured Slack channel
    Notify,
}

#[derive(Args)]
struct BuildArgs {
    /// Branch releases are cut from
    #[arg(long, env = "CIBUILDER_MAIN_BRANCH", default_value = "master")]
    main_branch: String,

    /// Command running the test suite
    #[arg(long, env = "CIBUILDER_TEST_COMMAND", default_value = "yarn test")]
    test_command: String,

    /// Command run before publishing; skipped when empty
    #[arg(long, env = "CIBUILDER_BEFORE_PUBLISH", default_value = "")]
    before_publish: String,

    /// Changelog updated during release setup
    #[arg(long, env = "CIBUILDER_CHANGELOG", default_value = "./CHANGELOG.md")]
    changelog: PathBuf,

    /// Prefix of GitHub release names
    #[arg(long, default_value = "Version ")]
    release_name_prefix: String,

    /// Skip dumping warnings and errors to the log file
    #[arg(long)]
    no_msg_dump: bool,
}

impl BuildArgs {
    fn policy_config(self) -> NpmPolicyConfig {
        NpmPolicyConfig {
            main_branch: self.main_branch,
            test_command: self.test_command,
            before_publish_command: self.before_publish,
            changelog_path: self.changelog,
            release_name_prefix: self.release_name_prefix,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    cibuilder_core::init_tracing(cli.json, level);

    std::env::set_current_dir(&cli.dir)
        .with_context(|| format!("Failed to enter project directory {}", cli.dir.display()))?;
    let log_file = LogFile::new(cli.log_file);

    let code = match cli.command {
        Commands::Build(args) => cmd_build(args, log_file).await,
        Commands::Notify => cmd_notify(&log_file).await,
    };
    std::process::exit(code);
}

async fn cmd_build(args: BuildArgs, log_file: LogFile) -> i32 {
    let dump_messages = !args.no_msg_dump;
    let env = Environment::from_process();
    tracing::debug!(ci = ?env.ci, package = %env.package.name, "environment loaded");

    let ctx = BuildContext::from_environment(env, log_file);
    let mut builder = CiBuilder::new(NpmPolicy::new(args.policy_config()), ctx);
    run_builder(&mut builder, dump_messages).await
}

async fn cmd_notify(log_file: &LogFile) -> i32 {
    let env = Environment::from_process();
    let console = Arc::new(Console::new(env.ci));
    let notifier = SlackNotifier::new(
        env,
        console.clone(),
        log_file,
        Box::new(TravisTitle),
        Arc::new(SlackApi::default()),
    );
    if let Some(err) = notifier.load_error() {
        tracing::warn!(path = %log_file.path().display(), error = %err, "no build log to report");
    }

    match notifier.run().await {
        Ok(()) => 0,
        Err(err) => {
            console.error(&err, true);
            1
        }
    }
}
