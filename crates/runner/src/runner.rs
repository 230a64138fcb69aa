//! Top-level run: discover, execute, collect, report

use std::path::PathBuf;

use testframe_common::{OutputLayout, Overrides, RunIdentity};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::discovery::TreeDiscoverer;
use crate::error::RunResult;
use crate::orchestrator::Orchestrator;
use crate::report::{ReportGenerator, SummaryDocuments};
use crate::results::{ResultCollector, TestOutcome};

/// Configuration for one framework invocation
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Root of the test tree
    pub root: PathBuf,

    /// Command-line overrides of framework keys
    pub overrides: Overrides,

    /// Identity of this run; names every output directory
    pub run: RunIdentity,

    /// Interrupts the run when cancelled
    pub cancel: CancellationToken,
}

impl RunnerConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            overrides: Overrides::default(),
            run: RunIdentity::now(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run: RunIdentity,
    pub outcomes: Vec<TestOutcome>,
    pub documents: SummaryDocuments,
    pub reports_dir: PathBuf,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }
}

/// Runs a whole test tree
pub struct TestRunner {
    config: RunnerConfig,
}

impl TestRunner {
    pub fn with_config(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Discover and run every test, then write the aggregate reports.
    ///
    /// Fails only on run-fatal errors: a bad root, a bad framework config, or
    /// an interrupt.
    pub async fn run(&self) -> RunResult<RunSummary> {
        let tree = TreeDiscoverer::discover(&self.config.root)?;
        let layout = OutputLayout::new(&tree.root, self.config.run.clone());

        let orchestrator = Orchestrator::new(layout.clone(), self.config.overrides.clone())
            .with_cancellation(self.config.cancel.clone());
        let runs = orchestrator.run(&tree).await?;

        let outcomes = ResultCollector::collect_all(runs).await;
        let generator = ReportGenerator::new(&layout);
        let documents = generator.build(&outcomes);
        let reports_dir = generator.write(&documents).await?;

        let summary = RunSummary {
            run: self.config.run.clone(),
            outcomes,
            documents,
            reports_dir,
        };
        info!(
            "Test Results: {} passed, {} failed",
            summary.passed(),
            summary.failed()
        );
        Ok(summary)
    }
}
