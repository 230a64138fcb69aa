//! Sequential execution of the discovered tests
//!
//! Every test runs to completion before the next starts. A failing test,
//! whatever the cause, is recorded and the run moves on; only an interrupt
//! stops the queue.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use testframe_common::output::{STDERR_LOG, STDOUT_LOG};
use testframe_common::{
    CommandTemplater, OutputLayout, Overrides, VariableBindingResolver, VariableNamespace,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::discovery::{TestEntry, TestTree};
use crate::error::{RunError, RunResult};
use crate::process;

/// What was run for one test and how it ended
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    /// Resolved command line handed to the shell
    pub command: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `None` when the process never started or was ended by a signal
    pub exit_code: Option<i32>,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    /// Spawn or wait failure
    pub error: Option<String>,
}

impl ExecutionRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.exit_code == Some(0)
    }
}

/// Why a test could not be started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupFailure {
    Config(String),
    Template(String),
    Io(String),
}

impl std::fmt::Display for SetupFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupFailure::Config(msg) => write!(f, "config error: {}", msg),
            SetupFailure::Template(msg) => write!(f, "template error: {}", msg),
            SetupFailure::Io(msg) => write!(f, "io error: {}", msg),
        }
    }
}

/// Outcome of orchestrating one test node
#[derive(Debug, Clone)]
pub struct TestRun {
    pub name: String,
    pub suite: Option<String>,
    pub rel_path: PathBuf,
    pub dir: PathBuf,
    pub command_template: Option<String>,
    pub namespace: Option<VariableNamespace>,
    pub output_dir: Option<PathBuf>,
    pub execution: Option<ExecutionRecord>,
    pub setup_failure: Option<SetupFailure>,
}

impl TestRun {
    fn new(entry: &TestEntry<'_>) -> Self {
        Self {
            name: entry.node.name.clone(),
            suite: entry.suite_name().map(str::to_string),
            rel_path: entry.node.rel_path.clone(),
            dir: entry.node.dir.clone(),
            command_template: entry.node.command_template().map(str::to_string),
            namespace: None,
            output_dir: None,
            execution: None,
            setup_failure: None,
        }
    }

    fn fail_setup(mut self, failure: SetupFailure) -> Self {
        error!("Test {} not run: {}", self.rel_path.display(), failure);
        self.setup_failure = Some(failure);
        self
    }

    /// Error text of a test that did not run or could not be spawned
    pub fn error(&self) -> Option<String> {
        self.setup_failure
            .as_ref()
            .map(|f| f.to_string())
            .or_else(|| self.execution.as_ref().and_then(|e| e.error.clone()))
    }
}

/// Runs every test of a tree in discovery order
pub struct Orchestrator {
    layout: OutputLayout,
    overrides: Overrides,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(layout: OutputLayout, overrides: Overrides) -> Self {
        Self {
            layout,
            overrides,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `cancel` to interrupt the run from outside
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Run all tests of `tree`, one at a time.
    ///
    /// Returns one [`TestRun`] per test node. Errors only on interrupt.
    pub async fn run(&self, tree: &TestTree) -> RunResult<Vec<TestRun>> {
        let resolver =
            VariableBindingResolver::new(&tree.framework, &self.overrides, self.layout.run());
        let entries = tree.tests();
        let mut runs = Vec::with_capacity(entries.len());

        info!("Running {} test(s), run {}", entries.len(), self.layout.run());

        for entry in &entries {
            if self.cancel.is_cancelled() {
                return Err(RunError::Interrupted);
            }

            let run = self.run_node(entry, &resolver).await?;
            let ran = run.execution.is_some();
            runs.push(run);

            let wait = entry.node.wait_seconds_after();
            if ran && wait > 0 {
                info!("Sleeping for {} seconds after running test", wait);
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(wait)) => {}
                    _ = self.cancel.cancelled() => return Err(RunError::Interrupted),
                }
            }
        }

        Ok(runs)
    }

    async fn run_node(
        &self,
        entry: &TestEntry<'_>,
        resolver: &VariableBindingResolver<'_>,
    ) -> RunResult<TestRun> {
        let mut run = TestRun::new(entry);
        debug!("Preparing test {}", run.rel_path.display());

        let config = match &entry.node.config {
            Ok(config) => config,
            Err(e) => {
                run.namespace = Some(resolver.resolve_framework());
                return Ok(run.fail_setup(SetupFailure::Config(e.clone())));
            }
        };
        let suites = match entry.suite_configs() {
            Ok(suites) => suites,
            Err(e) => {
                run.namespace = Some(resolver.resolve_framework());
                return Ok(run.fail_setup(SetupFailure::Config(e)));
            }
        };

        let namespace = resolver.resolve(&suites, config);
        debug!("Variables for {}: {:?}", run.rel_path.display(), namespace.masked());
        run.namespace = Some(namespace.clone());

        let output_dir = match self.layout.create_node_output(&entry.node.dir).await {
            Ok(dir) => dir,
            Err(e) => return Ok(run.fail_setup(SetupFailure::Io(e.to_string()))),
        };
        run.output_dir = Some(output_dir.clone());

        let stdout_path = output_dir.join(STDOUT_LOG);
        let stderr_path = output_dir.join(STDERR_LOG);

        let template = config.test.command.as_str();
        let command = match CommandTemplater::render(template, &namespace) {
            Ok(command) => command,
            Err(e) => {
                if let Err(io) = tokio::fs::write(&stderr_path, format!("{}\n", e)).await {
                    warn!("Failed to write {}: {}", stderr_path.display(), io);
                }
                return Ok(run.fail_setup(SetupFailure::Template(e.to_string())));
            }
        };
        let printable = CommandTemplater::render_masked(template, &namespace);

        info!("Running test in {}: {}", run.rel_path.display(), printable);
        let started_at = Utc::now();
        let result = process::run_command(
            &command,
            &entry.node.dir,
            &stdout_path,
            &stderr_path,
            &self.cancel,
        )
        .await;

        let (exit_code, error) = match result {
            Ok(status) => {
                let msg = format!(
                    "Test {} finished with {}",
                    run.rel_path.display(),
                    process::describe_exit(&status)
                );
                if status.success() {
                    info!("{}", msg);
                } else {
                    warn!("{}", msg);
                }
                (process::exit_code(&status), None)
            }
            Err(RunError::Interrupted) => return Err(RunError::Interrupted),
            Err(e) => {
                error!("Test {} could not be executed: {}", run.rel_path.display(), e);
                (None, Some(e.to_string()))
            }
        };

        run.execution = Some(ExecutionRecord {
            command,
            started_at,
            finished_at: Utc::now(),
            exit_code,
            stdout_path,
            stderr_path,
            error,
        });
        Ok(run)
    }
}
