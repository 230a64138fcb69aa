//! Config scopes
//!
//! A test tree carries up to three JSON config files:
//! - `framework_conf.json` at the tree root (target system, credentials)
//! - `suite_conf.json` in suite directories (custom variables only)
//! - `test_conf.json` in test directories (the command to run)
//!
//! Unknown keys are rejected at every scope.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Variables defined under `custom_variables` at any scope
pub type CustomVariables = BTreeMap<String, String>;

static VARIABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[_a-z][_a-z0-9]*$").expect("valid variable name pattern"));

/// The three config levels of a test tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Framework,
    Suite,
    Test,
}

impl Scope {
    /// Config file name expected in a directory of this scope
    pub fn file_name(&self) -> &'static str {
        match self {
            Scope::Framework => "framework_conf.json",
            Scope::Suite => "suite_conf.json",
            Scope::Test => "test_conf.json",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Framework => write!(f, "framework"),
            Scope::Suite => write!(f, "suite"),
            Scope::Test => write!(f, "test"),
        }
    }
}

/// When the test programs should talk https to the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpsMode {
    Always,
    Never,
    IfSendingCredentials,
    IfLoginOrAuthenticatedApi,
}

impl HttpsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpsMode::Always => "Always",
            HttpsMode::Never => "Never",
            HttpsMode::IfSendingCredentials => "IfSendingCredentials",
            HttpsMode::IfLoginOrAuthenticatedApi => "IfLoginOrAuthenticatedApi",
        }
    }
}

impl fmt::Display for HttpsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpsMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Always" => Ok(HttpsMode::Always),
            "Never" => Ok(HttpsMode::Never),
            "IfSendingCredentials" => Ok(HttpsMode::IfSendingCredentials),
            "IfLoginOrAuthenticatedApi" => Ok(HttpsMode::IfLoginOrAuthenticatedApi),
            other => Err(format!(
                "invalid https mode '{}': expected Always, Never, \
                 IfSendingCredentials or IfLoginOrAuthenticatedApi",
                other
            )),
        }
    }
}

/// Top-level config read from `framework_conf.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrameworkConfig {
    /// Target host with optional `:port`
    #[serde(default)]
    pub target_system: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub https: Option<HttpsMode>,

    /// Program used to launch script-based tests
    #[serde(default)]
    pub interpreter: Option<String>,

    #[serde(default)]
    pub custom_variables: CustomVariables,
}

impl FrameworkConfig {
    /// Predefined keys that are set, in namespace form
    pub fn predefined(&self) -> Vec<(&'static str, String)> {
        let mut vars = Vec::new();
        if let Some(v) = &self.target_system {
            vars.push(("target_system", v.clone()));
        }
        if let Some(v) = &self.username {
            vars.push(("username", v.clone()));
        }
        if let Some(v) = &self.password {
            vars.push(("password", v.clone()));
        }
        if let Some(v) = &self.token {
            vars.push(("token", v.clone()));
        }
        if let Some(v) = &self.https {
            vars.push(("https", v.to_string()));
        }
        if let Some(v) = &self.interpreter {
            vars.push(("interpreter", v.clone()));
        }
        vars
    }

    /// Load the framework config from the tree root. The file is required.
    pub fn load(dir: &Path) -> Result<Self> {
        ConfigStore::load::<Self>(dir)?.ok_or_else(|| {
            Error::config(
                dir.join(Scope::Framework.file_name()),
                "framework config file not found",
            )
        })
    }
}

/// Suite-level config read from `suite_conf.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteConfig {
    #[serde(default)]
    pub custom_variables: CustomVariables,
}

impl SuiteConfig {
    /// Load a suite config; a missing file yields an empty record
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(ConfigStore::load::<Self>(dir)?.unwrap_or_default())
    }
}

/// Test-level config read from `test_conf.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    pub test: TestSection,

    #[serde(default)]
    pub custom_variables: CustomVariables,
}

/// The `test` element of a test config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestSection {
    /// Command template with `$name` substitution tokens
    pub command: String,

    /// Seconds to pause after the test before starting the next one
    #[serde(default)]
    pub wait_seconds_after: u64,
}

impl TestConfig {
    /// Load a test config; `None` means the directory is not a test
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        ConfigStore::load::<Self>(dir)
    }
}

/// A config record bound to one scope
pub trait ScopeConfig: DeserializeOwned {
    const SCOPE: Scope;

    fn custom_variables(&self) -> &CustomVariables;

    /// Checks beyond what deserialization enforces
    fn validate(&self, path: &Path) -> Result<()> {
        validate_variable_names(self.custom_variables(), path)
    }
}

impl ScopeConfig for FrameworkConfig {
    const SCOPE: Scope = Scope::Framework;

    fn custom_variables(&self) -> &CustomVariables {
        &self.custom_variables
    }
}

impl ScopeConfig for SuiteConfig {
    const SCOPE: Scope = Scope::Suite;

    fn custom_variables(&self) -> &CustomVariables {
        &self.custom_variables
    }
}

impl ScopeConfig for TestConfig {
    const SCOPE: Scope = Scope::Test;

    fn custom_variables(&self) -> &CustomVariables {
        &self.custom_variables
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.test.command.trim().is_empty() {
            return Err(Error::config(path, "test.command must not be empty"));
        }
        validate_variable_names(&self.custom_variables, path)
    }
}

fn validate_variable_names(vars: &CustomVariables, path: &Path) -> Result<()> {
    for name in vars.keys() {
        if !VARIABLE_NAME.is_match(name) {
            return Err(Error::config(
                path,
                format!("invalid custom variable name '{}': must match [_a-z][_a-z0-9]*", name),
            ));
        }
    }
    Ok(())
}

/// Reads config records from the filesystem
pub struct ConfigStore;

impl ConfigStore {
    /// Whether `dir` holds the config file for `scope`
    pub fn has_config(dir: &Path, scope: Scope) -> bool {
        dir.join(scope.file_name()).is_file()
    }

    /// Load the config of scope `T` from `dir`.
    ///
    /// Returns `Ok(None)` when the file is absent. A file that is present but
    /// unreadable, not JSON, or does not match the scope's shape is an error.
    pub fn load<T: ScopeConfig>(dir: &Path) -> Result<Option<T>> {
        let path = dir.join(T::SCOPE.file_name());
        if !path.is_file() {
            debug!("No {} config at {}", T::SCOPE, path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| Error::config(&path, format!("unable to read file: {}", e)))?;
        let config = Self::parse::<T>(&content, &path)?;
        debug!("Read {} config {}", T::SCOPE, path.display());
        Ok(Some(config))
    }

    /// Parse and validate a config document of scope `T`
    pub fn parse<T: ScopeConfig>(content: &str, path: &Path) -> Result<T> {
        let config: T = serde_json::from_str(content)
            .map_err(|e| Error::config(path, format!("invalid {} config: {}", T::SCOPE, e)))?;
        config.validate(path)?;
        Ok(config)
    }
}
