//! Testframe CLI - Main Entry Point
//!
//! Runs every test found under a directory tree against one target system
//! and writes pass/fail summary reports.

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser};
use testframe_common::{HttpsMode, Overrides, RunIdentity};
use testframe_runner::{RunError, RunnerConfig, TestRunner};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod output;

/// Exit status after Ctrl-C
const EXIT_INTERRUPTED: i32 = 130;

/// Run a collection of tests against a target system
#[derive(Parser, Debug)]
#[command(name = "testframe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity of output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Directory containing the hierarchy of tests to run
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Target hostname or IP address with optional :port
    #[arg(short, long)]
    rhost: Option<String>,

    /// Username for authentication to the target host
    #[arg(short, long)]
    user: Option<String>,

    /// Password for authentication to the target host
    #[arg(short, long)]
    password: Option<String>,

    /// Security token for authentication to the target host
    #[arg(short, long)]
    token: Option<String>,

    /// https security option: Always, Never, IfSendingCredentials or IfLoginOrAuthenticatedApi
    #[arg(short, long)]
    secure: Option<HttpsMode>,

    /// Interpreter used to launch script-based tests
    #[arg(short, long)]
    interpreter: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            target_system: self.rhost.clone(),
            username: self.user.clone(),
            password: self.password.clone(),
            token: self.token.clone(),
            https: self.secure,
            interpreter: self.interpreter.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let root = match &cli.directory {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping the run");
            interrupt.cancel();
        }
    });

    let config = RunnerConfig {
        root: root.clone(),
        overrides: cli.overrides(),
        run: RunIdentity::now(),
        cancel,
    };
    output::print_info(&format!("Running tests under {} (run {})", root.display(), config.run));

    match TestRunner::with_config(config).run().await {
        Ok(summary) => {
            output::print_summary(&summary);
            Ok(0)
        }
        Err(RunError::Interrupted) => {
            output::print_warning(
                "Run interrupted; remaining tests were not run and no reports were written",
            );
            Ok(EXIT_INTERRUPTED)
        }
        Err(e) => Err(e).context(format!("test run under {} aborted", root.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "testframe",
            "-vv",
            "-d",
            "/tree",
            "-r",
            "10.0.0.5:8443",
            "-u",
            "admin",
            "-p",
            "pw",
            "-s",
            "Always",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.directory, Some(PathBuf::from("/tree")));

        let overrides = cli.overrides();
        assert_eq!(overrides.target_system.as_deref(), Some("10.0.0.5:8443"));
        assert_eq!(overrides.username.as_deref(), Some("admin"));
        assert_eq!(overrides.https, Some(HttpsMode::Always));
        assert!(overrides.token.is_none());
    }

    #[test]
    fn test_invalid_secure_value_rejected() {
        assert!(Cli::try_parse_from(["testframe", "--secure", "Sometimes"]).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_tests_still_exit_zero() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::write(root.join("framework_conf.json"), "{}").unwrap();
        std::fs::create_dir_all(root.join("suite/case")).unwrap();
        std::fs::write(
            root.join("suite/case/test_conf.json"),
            r#"{"test": {"command": "exit 1"}}"#,
        )
        .unwrap();

        let cli = Cli::try_parse_from(["testframe", "-d", root.to_str().unwrap()]).unwrap();
        assert_eq!(run(cli).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_framework_config_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cli = Cli::try_parse_from(["testframe", "-d", tmp.path().to_str().unwrap()]).unwrap();
        assert!(run(cli).await.is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
