//! Test tree discovery
//!
//! A directory holding `test_conf.json` is a test. A directory that is not a
//! test but has tests below it is a suite and may hold `suite_conf.json`.
//! Everything else is inert (shared code, fixtures, reports) and does not
//! appear in the tree. Siblings are visited in file-name order, depth first,
//! which fixes the execution order.

use std::path::{Path, PathBuf};

use testframe_common::{ConfigStore, FrameworkConfig, Scope, SuiteConfig, TestConfig};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{RunError, RunResult};

/// A runnable test directory
#[derive(Debug, Clone)]
pub struct TestNode {
    /// Directory name
    pub name: String,

    /// Absolute directory path
    pub dir: PathBuf,

    /// Path relative to the tree root
    pub rel_path: PathBuf,

    /// Parsed `test_conf.json`, or why it could not be used
    pub config: Result<TestConfig, String>,
}

impl TestNode {
    pub fn wait_seconds_after(&self) -> u64 {
        self.config
            .as_ref()
            .map(|c| c.test.wait_seconds_after)
            .unwrap_or(0)
    }

    pub fn command_template(&self) -> Option<&str> {
        self.config.as_ref().ok().map(|c| c.test.command.as_str())
    }
}

/// A directory grouping tests
#[derive(Debug, Clone)]
pub struct SuiteNode {
    pub name: String,
    pub dir: PathBuf,
    pub rel_path: PathBuf,

    /// Parsed `suite_conf.json` (empty when absent), or why it is unusable
    pub config: Result<SuiteConfig, String>,

    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone)]
pub enum TreeNode {
    Suite(SuiteNode),
    Test(TestNode),
}

/// A test together with its enclosing suites, outermost first
#[derive(Debug, Clone)]
pub struct TestEntry<'a> {
    pub node: &'a TestNode,
    pub suites: Vec<&'a SuiteNode>,
}

impl<'a> TestEntry<'a> {
    /// Name of the innermost suite, if any
    pub fn suite_name(&self) -> Option<&'a str> {
        self.suites.last().map(|s| s.name.as_str())
    }

    /// Suite configs to merge, or the first suite config error
    pub fn suite_configs(&self) -> Result<Vec<&'a SuiteConfig>, String> {
        self.suites
            .iter()
            .map(|s| s.config.as_ref().map_err(Clone::clone))
            .collect()
    }
}

/// The discovered tree of one run
#[derive(Debug, Clone)]
pub struct TestTree {
    pub root: PathBuf,
    pub framework: FrameworkConfig,
    pub children: Vec<TreeNode>,
}

impl TestTree {
    /// All tests in execution order
    pub fn tests(&self) -> Vec<TestEntry<'_>> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        collect_tests(&self.children, &mut stack, &mut out);
        out
    }

    pub fn test_count(&self) -> usize {
        self.tests().len()
    }
}

fn collect_tests<'a>(
    nodes: &'a [TreeNode],
    suites: &mut Vec<&'a SuiteNode>,
    out: &mut Vec<TestEntry<'a>>,
) {
    for node in nodes {
        match node {
            TreeNode::Test(test) => out.push(TestEntry {
                node: test,
                suites: suites.clone(),
            }),
            TreeNode::Suite(suite) => {
                suites.push(suite);
                collect_tests(&suite.children, suites, out);
                suites.pop();
            }
        }
    }
}

/// Builds the test tree from a root directory
pub struct TreeDiscoverer;

impl TreeDiscoverer {
    /// Discover the tree under `root`.
    ///
    /// Fails when `root` is not a directory or the framework config is
    /// missing or invalid. Suite and test config problems are kept on the
    /// affected node.
    pub fn discover(root: &Path) -> RunResult<TestTree> {
        if !root.is_dir() {
            return Err(RunError::Discovery(format!(
                "{} does not exist or is not a directory",
                root.display()
            )));
        }
        let root = root
            .canonicalize()
            .map_err(|e| RunError::Discovery(format!("cannot resolve {}: {}", root.display(), e)))?;

        let framework = FrameworkConfig::load(&root)?;
        if ConfigStore::has_config(&root, Scope::Test) {
            warn!(
                "Ignoring {} at the tree root {}",
                Scope::Test.file_name(),
                root.display()
            );
        }

        let children = walk(&root, &root)?;
        let tree = TestTree {
            root,
            framework,
            children,
        };
        info!("Discovered {} test(s) under {}", tree.test_count(), tree.root.display());
        Ok(tree)
    }
}

fn walk(root: &Path, dir: &Path) -> RunResult<Vec<TreeNode>> {
    let mut nodes = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if dir == root => {
                return Err(RunError::Discovery(format!("cannot read {}: {}", dir.display(), e)));
            }
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path().to_path_buf();
        let rel_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

        if ConfigStore::has_config(&path, Scope::Test) {
            let config = match TestConfig::load(&path) {
                Ok(Some(config)) => Ok(config),
                Ok(None) => Err(format!(
                    "{} disappeared during discovery",
                    Scope::Test.file_name()
                )),
                Err(e) => {
                    warn!("Test {} has an unusable config: {}", rel_path.display(), e);
                    Err(e.to_string())
                }
            };
            debug!("Test node {}", rel_path.display());
            nodes.push(TreeNode::Test(TestNode {
                name,
                dir: path,
                rel_path,
                config,
            }));
            continue;
        }

        let children = walk(root, &path)?;
        if children.is_empty() {
            debug!("Inert directory {}", rel_path.display());
            continue;
        }

        let config = SuiteConfig::load(&path).map_err(|e| {
            warn!("Suite {} has an unusable config: {}", rel_path.display(), e);
            e.to_string()
        });
        debug!("Suite node {}", rel_path.display());
        nodes.push(TreeNode::Suite(SuiteNode {
            name,
            dir: path,
            rel_path,
            config,
            children,
        }));
    }

    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn test_conf(dir: &Path, command: &str) {
        write(
            &dir.join("test_conf.json"),
            &format!(r#"{{"test": {{"command": "{}"}}}}"#, command),
        );
    }

    fn sample_tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(&root.join("framework_conf.json"), r#"{"target_system": "127.0.0.1"}"#);
        write(&root.join("Schema/suite_conf.json"), r#"{"custom_variables": {"a": "1"}}"#);
        test_conf(&root.join("Schema/b_second"), "echo b");
        test_conf(&root.join("Schema/a_first"), "echo a");
        test_conf(&root.join("Usecases/power"), "echo power");
        fs::create_dir_all(root.join("Usecases/common_lib")).unwrap();
        fs::create_dir_all(root.join("tools/bin")).unwrap();
        tmp
    }

    fn names(tree: &TestTree) -> Vec<String> {
        tree.tests()
            .iter()
            .map(|e| e.node.rel_path.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_discovery_order_is_lexicographic() {
        let tmp = sample_tree();
        let tree = TreeDiscoverer::discover(tmp.path()).unwrap();
        assert_eq!(names(&tree), vec!["Schema/a_first", "Schema/b_second", "Usecases/power"]);
    }

    #[test]
    fn test_discovery_is_deterministic() {
        let tmp = sample_tree();
        let first = names(&TreeDiscoverer::discover(tmp.path()).unwrap());
        let second = names(&TreeDiscoverer::discover(tmp.path()).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn test_inert_directories_are_not_nodes() {
        let tmp = sample_tree();
        let tree = TreeDiscoverer::discover(tmp.path()).unwrap();

        // tools/ has no tests and is dropped; Usecases/common_lib is not a test
        assert_eq!(tree.children.len(), 2);
        for entry in tree.tests() {
            assert!(entry.node.dir.join("test_conf.json").is_file());
        }
    }

    #[test]
    fn test_suite_config_attached() {
        let tmp = sample_tree();
        let tree = TreeDiscoverer::discover(tmp.path()).unwrap();
        let tests = tree.tests();

        assert_eq!(tests[0].suite_name(), Some("Schema"));
        let configs = tests[0].suite_configs().unwrap();
        assert_eq!(configs[0].custom_variables["a"], "1");

        // Usecases has no suite_conf.json: empty record
        let configs = tests[2].suite_configs().unwrap();
        assert!(configs[0].custom_variables.is_empty());
    }

    #[test]
    fn test_test_node_not_descended() {
        let tmp = sample_tree();
        test_conf(&tmp.path().join("Schema/a_first/nested"), "echo nested");
        let tree = TreeDiscoverer::discover(tmp.path()).unwrap();
        assert_eq!(tree.test_count(), 3);
    }

    #[test]
    fn test_invalid_test_config_kept_on_node() {
        let tmp = sample_tree();
        write(&tmp.path().join("Usecases/broken/test_conf.json"), "{\"test\": 5}");
        let tree = TreeDiscoverer::discover(tmp.path()).unwrap();

        let broken = tree
            .tests()
            .into_iter()
            .find(|e| e.node.name == "broken")
            .unwrap();
        assert!(broken.node.config.is_err());
    }

    #[test]
    fn test_missing_root_is_discovery_error() {
        let tmp = TempDir::new().unwrap();
        let err = TreeDiscoverer::discover(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, RunError::Discovery(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_framework_config_is_fatal() {
        let tmp = TempDir::new().unwrap();
        test_conf(&tmp.path().join("suite/case"), "true");
        let err = TreeDiscoverer::discover(tmp.path()).unwrap_err();
        assert!(err.is_fatal());
    }
}
