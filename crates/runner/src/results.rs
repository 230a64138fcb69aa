//! Collection of the result payloads written by test programs
//!
//! A test may leave `results.json` in its output directory. The payload is
//! opaque apart from its `TestResults` section, whose `pass`/`fail` counts
//! feed the pass/fail classification. A missing or unparsable payload is not
//! an error: classification then rests on the exit code alone.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::orchestrator::TestRun;

/// Payload file name inside a test's output directory
pub const RESULTS_FILE: &str = "results.json";

/// Pass/fail counts reported by a test program
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub pass: u64,
    pub fail: u64,
}

/// A test run with its payload and classification
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub run: TestRun,
    pub payload: Option<Value>,
    pub counts: Option<Counts>,
    pub passed: bool,
}

impl TestOutcome {
    pub fn exit_code(&self) -> Option<i32> {
        self.run.execution.as_ref().and_then(|e| e.exit_code)
    }
}

pub struct ResultCollector;

impl ResultCollector {
    /// Read and classify every run, keeping order
    pub async fn collect_all(runs: Vec<TestRun>) -> Vec<TestOutcome> {
        let mut outcomes = Vec::with_capacity(runs.len());
        for run in runs {
            outcomes.push(Self::collect(run).await);
        }
        outcomes
    }

    /// Read the payload of one run and classify it
    pub async fn collect(run: TestRun) -> TestOutcome {
        let payload = match &run.output_dir {
            Some(dir) if run.execution.is_some() => Self::read_payload(dir).await,
            _ => None,
        };
        let counts = payload.as_ref().and_then(Self::counts);
        let passed = Self::classify(&run, counts);

        TestOutcome {
            run,
            payload,
            counts,
            passed,
        }
    }

    /// Parse `results.json` in `output_dir`, if present and valid JSON
    pub async fn read_payload(output_dir: &Path) -> Option<Value> {
        let path = output_dir.join(RESULTS_FILE);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No structured result at {}", path.display());
                return None;
            }
            Err(e) => {
                warn!("Unable to read {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                error!("Invalid JSON in {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Sum the `pass`/`fail` counts of a payload's `TestResults` section.
    ///
    /// Counts may sit on `TestResults` itself or on each of its entries.
    pub fn counts(payload: &Value) -> Option<Counts> {
        let results = payload.get("TestResults")?.as_object()?;

        let own = count_fields(results);
        let nested = results
            .values()
            .filter_map(Value::as_object)
            .filter_map(count_fields)
            .fold(None, |acc: Option<Counts>, c| {
                let acc = acc.unwrap_or_default();
                Some(Counts {
                    pass: acc.pass + c.pass,
                    fail: acc.fail + c.fail,
                })
            });

        match (own, nested) {
            (Some(a), Some(b)) => Some(Counts {
                pass: a.pass + b.pass,
                fail: a.fail + b.fail,
            }),
            (a, b) => a.or(b),
        }
    }

    /// A test passes when it ran, exited 0 and reported no failures
    pub fn classify(run: &TestRun, counts: Option<Counts>) -> bool {
        let exited_clean = run.execution.as_ref().is_some_and(|e| e.succeeded());
        exited_clean && counts.map_or(true, |c| c.fail == 0)
    }
}

fn count_fields(obj: &serde_json::Map<String, Value>) -> Option<Counts> {
    let pass = obj.get("pass").and_then(Value::as_u64);
    let fail = obj.get("fail").and_then(Value::as_u64);
    if pass.is_none() && fail.is_none() {
        return None;
    }
    Some(Counts {
        pass: pass.unwrap_or(0),
        fail: fail.unwrap_or(0),
    })
}
