//! Error types for config loading and command templating

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading config scopes or rendering commands
#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error in {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("Template error: variable ${name} is not defined (template: {template})")]
    Template { name: String, template: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a config error for the given file
    pub fn config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Config {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error comes from a config scope
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config { .. })
    }
}
