//! Testframe Runner
//!
//! Runs a directory tree of tests:
//! - Discovers suites and tests from `suite_conf.json` / `test_conf.json`
//! - Resolves each test's variables and renders its command
//! - Executes tests one at a time in their own directory, capturing output
//! - Collects `results.json` payloads and writes pass/fail summary reports
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── framework_conf.json
//! ├── <suite>/
//! │   ├── suite_conf.json            (optional)
//! │   └── <test>/
//! │       ├── test_conf.json
//! │       └── output-<run>/
//! │           ├── stdout.log
//! │           ├── stderr.log
//! │           └── results.json       (written by the test, optional)
//! └── reports/
//!     └── output-<run>/
//!         ├── results_pass.json
//!         └── results_fail.json
//! ```

pub mod discovery;
pub mod error;
pub mod orchestrator;
pub mod process;
pub mod report;
pub mod results;
pub mod runner;

pub use discovery::{SuiteNode, TestNode, TestTree, TreeDiscoverer, TreeNode};
pub use error::{RunError, RunResult};
pub use orchestrator::{ExecutionRecord, Orchestrator, SetupFailure, TestRun};
pub use report::{render_summary, ReportGenerator, SummaryDocuments};
pub use results::{Counts, ResultCollector, TestOutcome};
pub use runner::{RunSummary, RunnerConfig, TestRunner};
