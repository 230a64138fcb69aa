//! Variable resolution across config scopes
//!
//! The namespace of a test is built from ordered layers, later layers
//! replacing earlier values key by key:
//!
//! ```text
//! framework predefined keys + custom_variables
//!   -> suite custom_variables (outermost suite first)
//!   -> test custom_variables
//!   -> command-line overrides
//!   -> output_subdir (generated, never taken from config)
//! ```

use std::collections::BTreeMap;

use tracing::warn;

use crate::config::{CustomVariables, FrameworkConfig, HttpsMode, SuiteConfig, TestConfig};
use crate::output::RunIdentity;

/// Generated variable naming the test's output directory
pub const OUTPUT_SUBDIR: &str = "output_subdir";

/// Variables whose values must not appear in logs
pub const SENSITIVE_VARIABLES: &[&str] = &["password", "token"];

/// Replacement shown in place of sensitive values
pub const MASK: &str = "********";

/// Command-line overrides of framework keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub target_system: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub https: Option<HttpsMode>,
    pub interpreter: Option<String>,
}

impl Overrides {
    fn layer(&self) -> Vec<(String, String)> {
        let entries = [
            ("target_system", self.target_system.clone()),
            ("username", self.username.clone()),
            ("password", self.password.clone()),
            ("token", self.token.clone()),
            ("https", self.https.map(|h| h.to_string())),
            ("interpreter", self.interpreter.clone()),
        ];
        entries
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
            .collect()
    }
}

/// Final variable mapping of one test node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableNamespace {
    vars: BTreeMap<String, String>,
}

impl VariableNamespace {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn is_sensitive(name: &str) -> bool {
        SENSITIVE_VARIABLES.contains(&name)
    }

    /// Names defined in this namespace, with sensitive values hidden
    pub fn masked(&self) -> BTreeMap<&str, &str> {
        self.vars
            .iter()
            .map(|(k, v)| {
                let shown = if Self::is_sensitive(k) { MASK } else { v.as_str() };
                (k.as_str(), shown)
            })
            .collect()
    }

    fn apply<I>(&mut self, scope: &str, layer: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in layer {
            if name == OUTPUT_SUBDIR {
                warn!(
                    "Ignoring {} defined in {} config; it is generated per run",
                    OUTPUT_SUBDIR, scope
                );
                continue;
            }
            self.vars.insert(name, value);
        }
    }
}

fn custom_layer(vars: &CustomVariables) -> impl Iterator<Item = (String, String)> + '_ {
    vars.iter().map(|(k, v)| (k.clone(), v.clone()))
}

/// Builds variable namespaces for the tests of one run
#[derive(Debug, Clone)]
pub struct VariableBindingResolver<'a> {
    framework: &'a FrameworkConfig,
    overrides: &'a Overrides,
    run: &'a RunIdentity,
}

impl<'a> VariableBindingResolver<'a> {
    pub fn new(
        framework: &'a FrameworkConfig,
        overrides: &'a Overrides,
        run: &'a RunIdentity,
    ) -> Self {
        Self {
            framework,
            overrides,
            run,
        }
    }

    /// Resolve the namespace of one test.
    ///
    /// `suites` lists the enclosing suite configs, outermost first.
    pub fn resolve(&self, suites: &[&SuiteConfig], test: &TestConfig) -> VariableNamespace {
        let mut ns = self.framework_layer();
        for suite in suites {
            ns.apply("suite", custom_layer(&suite.custom_variables));
        }
        ns.apply("test", custom_layer(&test.custom_variables));
        self.finish(ns)
    }

    /// Namespace without any suite or test layer, for nodes whose own
    /// configs could not be loaded
    pub fn resolve_framework(&self) -> VariableNamespace {
        self.finish(self.framework_layer())
    }

    fn framework_layer(&self) -> VariableNamespace {
        let mut ns = VariableNamespace::default();
        ns.apply(
            "framework",
            self.framework
                .predefined()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v)),
        );
        ns.apply("framework", custom_layer(&self.framework.custom_variables));
        ns
    }

    fn finish(&self, mut ns: VariableNamespace) -> VariableNamespace {
        ns.apply("command line", self.overrides.layer());
        ns.vars.insert(OUTPUT_SUBDIR.to_string(), self.run.output_subdir());
        ns
    }
}
