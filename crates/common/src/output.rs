//! Run identity and per-run output layout
//!
//! Every invocation gets one timestamp token. All test output directories
//! and the reports directory of that invocation are named from it, so two
//! runs against the same tree never share an output directory.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::debug;

use crate::error::Result;

/// Name of the reports directory at the tree root
pub const REPORTS_DIR: &str = "reports";

/// File receiving a test's captured stdout
pub const STDOUT_LOG: &str = "stdout.log";

/// File receiving a test's captured stderr
pub const STDERR_LOG: &str = "stderr.log";

/// Timestamp token identifying one framework invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIdentity {
    started_at: DateTime<Utc>,
    token: String,
}

impl RunIdentity {
    /// Identity for a run starting now
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Identity for a run starting at `started_at`
    pub fn from_datetime(started_at: DateTime<Utc>) -> Self {
        let token = started_at.format("%Y-%m-%dT%H%M%SZ").to_string();
        Self { started_at, token }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Directory name used for every output directory of this run
    pub fn output_subdir(&self) -> String {
        format!("output-{}", self.token)
    }
}

impl fmt::Display for RunIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

/// Where a run writes its files
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
    run: RunIdentity,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, run: RunIdentity) -> Self {
        Self {
            root: root.into(),
            run,
        }
    }

    pub fn run(&self) -> &RunIdentity {
        &self.run
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<node_dir>/output-<token>`
    pub fn node_output_dir(&self, node_dir: &Path) -> PathBuf {
        node_dir.join(self.run.output_subdir())
    }

    /// `<root>/reports/output-<token>`
    pub fn reports_dir(&self) -> PathBuf {
        self.root.join(REPORTS_DIR).join(self.run.output_subdir())
    }

    /// Create the output directory of one test node.
    ///
    /// The directory must not exist yet; results of an earlier run are
    /// never written over.
    pub async fn create_node_output(&self, node_dir: &Path) -> Result<PathBuf> {
        let dir = self.node_output_dir(node_dir);
        fs::create_dir(&dir).await?;
        debug!("Created output directory {}", dir.display());
        Ok(dir)
    }

    /// Create the reports directory of this run, including parents
    pub async fn create_reports_dir(&self) -> Result<PathBuf> {
        let dir = self.reports_dir();
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn run_at(secs: u32) -> RunIdentity {
        RunIdentity::from_datetime(Utc.with_ymd_and_hms(2017, 9, 1, 10, 15, secs).unwrap())
    }

    #[test]
    fn test_token_format() {
        let run = run_at(0);
        assert_eq!(run.token(), "2017-09-01T101500Z");
        assert_eq!(run.output_subdir(), "output-2017-09-01T101500Z");
    }

    #[test]
    fn test_layout_paths() {
        let layout = OutputLayout::new("/tree", run_at(7));
        assert_eq!(
            layout.node_output_dir(Path::new("/tree/suite/case")),
            PathBuf::from("/tree/suite/case/output-2017-09-01T101507Z")
        );
        assert_eq!(layout.reports_dir(), PathBuf::from("/tree/reports/output-2017-09-01T101507Z"));
    }

    #[tokio::test]
    async fn test_node_output_not_reused() {
        let tmp = TempDir::new().unwrap();
        let layout = OutputLayout::new(tmp.path(), run_at(1));

        let dir = layout.create_node_output(tmp.path()).await.unwrap();
        assert!(dir.is_dir());
        assert!(layout.create_node_output(tmp.path()).await.is_err());

        let next = OutputLayout::new(tmp.path(), run_at(2));
        let other = next.create_node_output(tmp.path()).await.unwrap();
        assert_ne!(dir, other);
        assert!(dir.is_dir() && other.is_dir());
    }
}
