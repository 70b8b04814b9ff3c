//! cibuilder-tsc - TypeScript/ESLint diagnostics gate
//!
//! Compiles the project described by the tsconfig file, lints its files
//! unless `--no-lint` is given, and exits with the gate verdict:
//!
//! | code | verdict |
//! |------|---------|
//! | 0 | OK |
//! | 1 | WARNING |
//! | 2 | ERROR |
//! | 3 | WARNING_EXCEPTION |
//! | 4 | ERROR_EXCEPTION |
//! | 5 | NODE_ERROR |
//! | 6 | NEEDS_READJUSTMENT |
//!
//! Configuration problems print the error as JSON and exit with 1.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use tracing::Level;

use cibuilder_core::environment::ProcessEnv;
use cibuilder_core::{CiKind, Console, Exception, LogFile, DEFAULT_LOG_FILE};
use cibuilder_gate::{check_project, Definitions, GateConfig, GateFlags};

const AFTER_HELP: &str = "\
Inputs:

  -DtsconfigPath: defaults to './tsconfig.json'
  -DeslintPath: defaults to './.eslintrc.json'
  -DciLimit: defaults to '10'
  -DciFilesPerMessage: defaults to '5'

To change an input enter \"-DinputName=newValue\". For instance \"-DciLimit=5\".
Allowed message counts are read from the \"ciBuilder\" section of the tsconfig file.";

#[derive(Parser)]
#[command(name = "cibuilder-tsc")]
#[command(version = env!("CARGO_PKG_VERSION"), disable_version_flag = true)]
#[command(about = "TypeScript/ESLint checker", long_about = None)]
#[command(after_help = AFTER_HELP)]
struct Cli {
    /// Print the version
    #[arg(short = 'v', long, action = ArgAction::Version)]
    version: Option<bool>,

    /// Print messages of the compilation steps
    #[arg(long)]
    verbose: bool,

    /// Minimize the output when there are too many messages
    #[arg(long)]
    ci: bool,

    /// Skip dumping error and warning messages to the log file
    #[arg(long)]
    no_msg_dump: bool,

    /// Skip linting
    #[arg(long)]
    no_lint: bool,

    /// Override an input, e.g. -DciLimit=5
    #[arg(short = 'D', value_name = "NAME=VALUE")]
    define: Vec<String>,

    /// Project directory
    #[arg(long, default_value = ".")]
    project: PathBuf,

    /// Log file receiving the messages
    #[arg(long, env = "CIBUILDER_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,
}

fn fail(err: Exception) -> ! {
    let json = serde_json::to_string_pretty(&err.to_object()).unwrap_or_else(|_| err.message.clone());
    println!("{json}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    cibuilder_core::init_tracing(false, level);

    let flags = GateFlags {
        ci: cli.ci,
        no_lint: cli.no_lint,
        no_msg_dump: cli.no_msg_dump,
        verbose: cli.verbose,
    };
    let config = match Definitions::parse(&cli.define)
        .and_then(|defs| GateConfig::load(&cli.project, flags, &defs))
    {
        Ok(config) => config,
        Err(e) => fail(e.into()),
    };

    let console = Console::new(CiKind::detect(&ProcessEnv));
    let log_file = LogFile::new(cli.project.join(&cli.log_file));
    let status = check_project(&config, &console, &log_file).await;
    std::process::exit(status.code());
}
