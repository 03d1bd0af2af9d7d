//! Runtime configuration.
//!
//! Values come from three layers, strongest last: built-in defaults, an
//! optional `testsmith.toml` in the project directory, then CLI flags applied
//! by the binary through the `with_*` builders.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the optional config file looked up in the project directory.
pub const CONFIG_FILE: &str = "testsmith.toml";

fn default_artifact_root() -> PathBuf {
    PathBuf::from("output")
}

fn default_max_iterations() -> u32 {
    crate::orchestrator::DEFAULT_MAX_ITERATIONS
}

fn default_dispatch_timeout_secs() -> u64 {
    600
}

fn default_exec_timeout_secs() -> u64 {
    30
}

fn default_agent_cmd() -> String {
    "claude".to_string()
}

fn default_test_cmd() -> String {
    "pytest".to_string()
}

/// Everything the binary needs to wire a session together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory the workers write artifacts into, one subdirectory per
    /// category.
    #[serde(default = "default_artifact_root")]
    pub artifact_root: PathBuf,
    /// Location of the code under test, passed to specialists when known.
    #[serde(default)]
    pub source_root: Option<PathBuf>,
    /// Iteration budget for a session.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Wall-clock ceiling for one dispatch batch.
    #[serde(default = "default_dispatch_timeout_secs")]
    pub dispatch_timeout_secs: u64,
    /// Ceiling for one test-tool invocation.
    #[serde(default = "default_exec_timeout_secs")]
    pub exec_timeout_secs: u64,
    /// Agent CLI command.
    #[serde(default = "default_agent_cmd")]
    pub agent_cmd: String,
    /// Test tool command.
    #[serde(default = "default_test_cmd")]
    pub test_cmd: String,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            artifact_root: default_artifact_root(),
            source_root: None,
            max_iterations: default_max_iterations(),
            dispatch_timeout_secs: default_dispatch_timeout_secs(),
            exec_timeout_secs: default_exec_timeout_secs(),
            agent_cmd: default_agent_cmd(),
            test_cmd: default_test_cmd(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration for a project directory: `testsmith.toml` when
    /// present, defaults otherwise. Relative artifact roots are anchored at
    /// the project directory.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        if config.artifact_root.is_relative() {
            config.artifact_root = project_dir.join(&config.artifact_root);
        }
        if let Some(src) = config.source_root.take() {
            config.source_root = Some(if src.is_relative() {
                project_dir.join(src)
            } else {
                src
            });
        }
        Ok(config)
    }

    pub fn with_artifact_root(mut self, dir: PathBuf) -> Self {
        self.artifact_root = dir;
        self
    }

    pub fn with_source_root(mut self, dir: PathBuf) -> Self {
        self.source_root = Some(dir);
        self
    }

    pub fn with_max_iterations(mut self, budget: u32) -> Self {
        self.max_iterations = budget;
        self
    }

    pub fn with_test_cmd(mut self, cmd: &str) -> Self {
        self.test_cmd = cmd.to_string();
        self
    }

    pub fn with_agent_cmd(mut self, cmd: &str) -> Self {
        self.agent_cmd = cmd.to_string();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.test_cmd, "pytest");
        assert_eq!(config.agent_cmd, "claude");
        assert_eq!(config.dispatch_timeout(), Duration::from_secs(600));
        assert_eq!(config.exec_timeout(), Duration::from_secs(30));
        assert!(!config.verbose);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.max_iterations, 5);
        // Relative default root is anchored at the project dir.
        assert_eq!(config.artifact_root, dir.path().join("output"));
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "max_iterations = 3\ntest_cmd = \"pytest-3\"\nsource_root = \"src\"\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.test_cmd, "pytest-3");
        assert_eq!(config.source_root, Some(dir.path().join("src")));
        // Unspecified fields keep their defaults.
        assert_eq!(config.exec_timeout_secs, 30);
    }

    #[test]
    fn test_load_rejects_malformed_toml() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "max_iterations = \"many\"").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }

    #[test]
    fn test_builders_override() {
        let config = Config::default()
            .with_max_iterations(2)
            .with_test_cmd("tox")
            .with_verbose(true);
        assert_eq!(config.max_iterations, 2);
        assert_eq!(config.test_cmd, "tox");
        assert!(config.verbose);
    }
}
