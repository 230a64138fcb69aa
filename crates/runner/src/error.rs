//! Error types for discovery and orchestration

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error(transparent)]
    Common(#[from] testframe_common::Error),

    /// The test process could not be started or waited on
    #[error("Failed to spawn test process in {}: {reason}", cwd.display())]
    Spawn { cwd: PathBuf, reason: String },

    #[error("Run interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RunError {
    /// Whether the error stops the whole run rather than one test
    pub fn is_fatal(&self) -> bool {
        match self {
            RunError::Discovery(_) | RunError::Interrupted => true,
            RunError::Common(e) => e.is_config(),
            _ => false,
        }
    }
}

pub type RunResult<T> = Result<T, RunError>;
