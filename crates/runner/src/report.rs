//! Aggregate reports
//!
//! Two JSON documents per run, `results_pass.json` and `results_fail.json`,
//! written to `<root>/reports/output-<run>/`. Each lists one entry per test:
//! the test's own payload when it wrote one, otherwise a synthesized entry
//! describing the test and how it ended.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde_json::{json, Value};
use testframe_common::{CommandTemplater, OutputLayout, RunIdentity};
use tracing::{error, info};

use crate::error::RunResult;
use crate::results::TestOutcome;

pub const RESULTS_PASS_FILE: &str = "results_pass.json";
pub const RESULTS_FAIL_FILE: &str = "results_fail.json";

const PASS_HEADING: &str = "Test Framework Passing Results";
const FAIL_HEADING: &str = "Test Framework Failing Results";

const TARGET_SYSTEM: &str = "target_system";

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// The pass and fail documents of one run
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryDocuments {
    pub pass: Value,
    pub fail: Value,
}

impl SummaryDocuments {
    pub fn pass_cases(&self) -> &[Value] {
        cases(&self.pass)
    }

    pub fn fail_cases(&self) -> &[Value] {
        cases(&self.fail)
    }
}

fn cases(doc: &Value) -> &[Value] {
    doc.get("TestCases")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Builds and writes the aggregate reports of a run
pub struct ReportGenerator<'a> {
    layout: &'a OutputLayout,
}

impl<'a> ReportGenerator<'a> {
    pub fn new(layout: &'a OutputLayout) -> Self {
        Self { layout }
    }

    /// Split outcomes into the pass and fail documents
    pub fn build(&self, outcomes: &[TestOutcome]) -> SummaryDocuments {
        let run = self.layout.run();
        let mut pass = Vec::new();
        let mut fail = Vec::new();

        for outcome in outcomes {
            let entry = outcome
                .payload
                .clone()
                .unwrap_or_else(|| Self::fallback_entry(outcome, run));
            if outcome.passed {
                pass.push(entry);
            } else {
                fail.push(entry);
            }
        }

        SummaryDocuments {
            pass: document(PASS_HEADING, run, pass),
            fail: document(FAIL_HEADING, run, fail),
        }
    }

    /// Entry for a test that left no usable payload.
    ///
    /// The command line is shown rendered with credentials masked.
    pub fn fallback_entry(outcome: &TestOutcome, run: &RunIdentity) -> Value {
        let test = &outcome.run;
        let timestamp = test
            .execution
            .as_ref()
            .map(|e| e.started_at)
            .unwrap_or_else(|| run.started_at());
        let command_line = match (&test.command_template, &test.namespace) {
            (Some(template), Some(ns)) => CommandTemplater::render_masked(template, ns),
            (Some(template), None) => template.clone(),
            (None, _) => String::new(),
        };
        let command_args: Vec<&str> = command_line.split_whitespace().collect();
        let target_system = test
            .namespace
            .as_ref()
            .and_then(|ns| ns.get(TARGET_SYSTEM));
        let (pass, fail) = if outcome.passed { (1, 0) } else { (0, 1) };
        let name = test.name.as_str();
        let suite = test.suite.as_deref().unwrap_or("");

        let mut entry = json!({
            "ToolName": format!("Suite: {}, Test case: {}", suite, name),
            "Timestamp": {
                "DateTime": format_timestamp(timestamp)
            },
            "TargetSystem": target_system,
            "CommandLineArgs": command_args,
            "TestResults": {
                name: {
                    "fail": fail,
                    "pass": pass
                }
            },
            "ServiceRoot": {},
            "Path": test.rel_path.to_string_lossy().replace('\\', "/"),
        });

        if let Some(code) = outcome.exit_code() {
            entry["ReturnCode"] = json!(code);
        }
        if let Some(err) = test.error() {
            entry["Error"] = json!(err);
        }
        entry
    }

    /// Write both documents into the run's reports directory.
    ///
    /// Falls back to the current directory when the reports directory cannot
    /// be created, and to stdout when a file cannot be written. Returns the
    /// directory used.
    pub async fn write(&self, docs: &SummaryDocuments) -> RunResult<PathBuf> {
        let dir = match self.layout.create_reports_dir().await {
            Ok(dir) => dir,
            Err(e) => {
                error!(
                    "Error creating reports directory {}: {}",
                    self.layout.reports_dir().display(),
                    e
                );
                error!("Writing results files to the current directory instead");
                std::env::current_dir()?
            }
        };

        write_document(&dir, RESULTS_PASS_FILE, &docs.pass).await?;
        write_document(&dir, RESULTS_FAIL_FILE, &docs.fail).await?;
        info!("Results written to: {}", dir.display());
        Ok(dir)
    }
}

fn document(heading: &str, run: &RunIdentity, cases: Vec<Value>) -> Value {
    json!({
        heading: {
            "Timestamp": {
                "DateTime": format_timestamp(run.started_at())
            }
        },
        "TestCases": cases
    })
}

async fn write_document(dir: &Path, file: &str, doc: &Value) -> RunResult<()> {
    let path = dir.join(file);
    let content = serde_json::to_string_pretty(doc)?;
    if let Err(e) = tokio::fs::write(&path, &content).await {
        error!("Error writing results file to {}: {}", path.display(), e);
        error!("Printing results to stdout instead");
        println!("{}", content);
    }
    Ok(())
}

/// Color-coded text summary of a run
pub fn render_summary(outcomes: &[TestOutcome], reports_dir: Option<&Path>) -> String {
    let mut out = String::new();
    let passed = outcomes.iter().filter(|o| o.passed).count();
    let failed = outcomes.len() - passed;

    for outcome in outcomes {
        let status = if outcome.passed {
            "PASS".green().bold()
        } else {
            "FAIL".red().bold()
        };
        let mut line = format!("{} {}", status, outcome.run.rel_path.display());
        if let Some(counts) = outcome.counts {
            line.push_str(&format!(" ({} passed, {} failed)", counts.pass, counts.fail));
        }
        if let Some(err) = outcome.run.error() {
            line.push_str(&format!(" - {}", err.dimmed()));
        } else if let Some(code) = outcome.exit_code().filter(|c| *c != 0) {
            line.push_str(&format!(" - {}", format!("exit code {}", code).dimmed()));
        }
        out.push_str(&line);
        out.push('\n');
    }

    let totals = format!(
        "{} test(s): {} passed, {} failed",
        outcomes.len(),
        passed,
        failed
    );
    if failed == 0 {
        out.push_str(&totals.green().to_string());
    } else {
        out.push_str(&totals.red().to_string());
    }
    out.push('\n');

    if let Some(dir) = reports_dir {
        out.push_str(&format!("See JSON summary results in {}\n", dir.display()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{ExecutionRecord, SetupFailure, TestRun};
    use crate::results::Counts;
    use chrono::TimeZone;
    use tempfile::TempDir;
    use testframe_common::{
        FrameworkConfig, Overrides, TestConfig, TestSection, VariableBindingResolver,
        VariableNamespace,
    };

    fn layout(root: &Path) -> OutputLayout {
        OutputLayout::new(
            root,
            RunIdentity::from_datetime(Utc.with_ymd_and_hms(2022, 11, 12, 13, 14, 15).unwrap()),
        )
    }

    fn namespace(target: &str, password: &str) -> VariableNamespace {
        let framework = FrameworkConfig {
            target_system: Some(target.to_string()),
            password: Some(password.to_string()),
            interpreter: Some("python3".to_string()),
            ..Default::default()
        };
        let test = TestConfig {
            test: TestSection {
                command: "true".to_string(),
                wait_seconds_after: 0,
            },
            custom_variables: Default::default(),
        };
        let overrides = Overrides::default();
        let run =
            RunIdentity::from_datetime(Utc.with_ymd_and_hms(2022, 11, 12, 13, 14, 15).unwrap());
        VariableBindingResolver::new(&framework, &overrides, &run).resolve(&[], &test)
    }

    fn outcome(name: &str, code: Option<i32>, payload: Option<Value>, passed: bool) -> TestOutcome {
        let started = Utc.with_ymd_and_hms(2022, 11, 12, 13, 20, 0).unwrap();
        TestOutcome {
            run: TestRun {
                name: name.to_string(),
                suite: Some("Schema".to_string()),
                rel_path: PathBuf::from("Schema").join(name),
                dir: PathBuf::from("/tree/Schema").join(name),
                command_template: Some(
                    "$interpreter validate.py -r $target_system -p $password".to_string(),
                ),
                namespace: None,
                output_dir: None,
                execution: code.map(|c| ExecutionRecord {
                    command: "python3 validate.py -r 10.0.0.1".to_string(),
                    started_at: started,
                    finished_at: started,
                    exit_code: Some(c),
                    stdout_path: PathBuf::from("stdout.log"),
                    stderr_path: PathBuf::from("stderr.log"),
                    error: None,
                }),
                setup_failure: None,
            },
            counts: payload.as_ref().and_then(crate::results::ResultCollector::counts),
            payload,
            passed,
        }
    }

    #[test]
    fn test_payload_copied_unchanged() {
        let tmp = TempDir::new().unwrap();
        let layout = layout(tmp.path());
        let payload = json!({
            "ToolName": "Redfish Service Validator",
            "Timestamp": {"DateTime": "2022-11-12T13:21:00Z"},
            "CommandLineArgs": ["-r", "10.0.0.1"],
            "ServiceRoot": {"Product": "Widget BMC"},
            "TestResults": {"ServiceRoot": {"pass": 9, "fail": 0}}
        });

        let passed = outcome("a", Some(0), Some(payload.clone()), true);
        let docs = ReportGenerator::new(&layout).build(&[passed]);
        assert_eq!(docs.pass_cases(), &[payload]);
        assert!(docs.fail_cases().is_empty());
        assert_eq!(
            docs.pass[PASS_HEADING]["Timestamp"]["DateTime"],
            json!("2022-11-12T13:14:15Z")
        );
    }

    #[test]
    fn test_fallback_entry() {
        let tmp = TempDir::new().unwrap();
        let layout = layout(tmp.path());
        let mut failed = outcome("b", Some(2), None, false);
        failed.run.namespace = Some(namespace("10.9.8.7:8443", "hunter2"));
        let docs = ReportGenerator::new(&layout).build(&[failed]);

        let entry = &docs.fail_cases()[0];
        assert_eq!(entry["ToolName"], json!("Suite: Schema, Test case: b"));
        assert_eq!(entry["Timestamp"]["DateTime"], json!("2022-11-12T13:20:00Z"));
        assert_eq!(entry["TargetSystem"], json!("10.9.8.7:8443"));
        assert_eq!(
            entry["CommandLineArgs"],
            json!(["python3", "validate.py", "-r", "10.9.8.7:8443", "-p", "********"])
        );
        assert!(!entry.to_string().contains("hunter2"));
        assert_eq!(entry["TestResults"]["b"], json!({"pass": 0, "fail": 1}));
        assert_eq!(entry["ReturnCode"], json!(2));
        assert_eq!(entry["Path"], json!("Schema/b"));
    }

    #[test]
    fn test_setup_failure_in_fallback() {
        let tmp = TempDir::new().unwrap();
        let layout = layout(tmp.path());
        let mut failed = outcome("c", None, None, false);
        failed.run.setup_failure =
            Some(SetupFailure::Template("variable $x is not defined".to_string()));

        let entry = ReportGenerator::fallback_entry(&failed, layout.run());
        assert_eq!(entry["Timestamp"]["DateTime"], json!("2022-11-12T13:14:15Z"));
        assert!(entry["Error"].as_str().unwrap().starts_with("template error"));
        assert!(entry.get("ReturnCode").is_none());
        assert_eq!(entry["TargetSystem"], Value::Null);
        assert_eq!(entry["CommandLineArgs"][4], json!("-p"));
        assert_eq!(entry["CommandLineArgs"][5], json!("$password"));
    }

    #[tokio::test]
    async fn test_write_documents() {
        let tmp = TempDir::new().unwrap();
        let layout = layout(tmp.path());
        let generator = ReportGenerator::new(&layout);
        let docs = generator.build(&[
            outcome("a", Some(0), None, true),
            outcome("b", Some(1), None, false),
        ]);

        let dir = generator.write(&docs).await.unwrap();
        assert_eq!(dir, tmp.path().join("reports/output-2022-11-12T131415Z"));

        let read = |file: &str| -> Value {
            serde_json::from_str(&std::fs::read_to_string(dir.join(file)).unwrap()).unwrap()
        };
        let pass = read(RESULTS_PASS_FILE);
        let fail = read(RESULTS_FAIL_FILE);
        assert_eq!(pass, docs.pass);
        assert_eq!(fail, docs.fail);
    }

    #[test]
    fn test_render_summary_counts() {
        colored::control::set_override(false);
        let mut with_counts = outcome("a", Some(0), None, true);
        with_counts.counts = Some(Counts { pass: 3, fail: 0 });
        let text = render_summary(
            &[with_counts, outcome("b", Some(4), None, false)],
            Some(Path::new("/tree/reports/x")),
        );

        assert!(text.contains("PASS Schema/a (3 passed, 0 failed)"));
        assert!(text.contains("FAIL Schema/b - exit code 4"));
        assert!(text.contains("2 test(s): 1 passed, 1 failed"));
        assert!(text.contains("/tree/reports/x"));
    }
}
