//! Testframe Common Library
//!
//! Config scopes, variable resolution, command templating and the per-run
//! output layout shared by the runner and the CLI.

pub mod config;
pub mod error;
pub mod output;
pub mod template;
pub mod vars;

// Re-export commonly used types
pub use config::{
    ConfigStore, CustomVariables, FrameworkConfig, HttpsMode, Scope, ScopeConfig, SuiteConfig,
    TestConfig, TestSection,
};
pub use error::{Error, Result};
pub use output::{OutputLayout, RunIdentity};
pub use template::CommandTemplater;
pub use vars::{Overrides, VariableBindingResolver, VariableNamespace};
