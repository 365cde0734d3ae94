//! Engine configuration file parsing.
//!
//! ```toml
//! [engine]
//! script_root = "scripts"
//! worker_threads = 2
//! run_timeout_ms = 5000
//! max_call_depth = 128
//! max_nesting_depth = 48
//! std_lib = true
//!
//! [modules]
//! disabled = ["chat"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

fn default_true() -> bool {
    true
}

fn default_script_root() -> PathBuf {
    PathBuf::from("scripts")
}

fn default_worker_threads() -> usize {
    2
}

fn default_max_call_depth() -> usize {
    128
}

fn default_max_nesting_depth() -> usize {
    48
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSection {
    /// Root that file sources are named relative to.
    #[serde(default = "default_script_root")]
    pub script_root: PathBuf,

    /// Workers for listeners that may run off the main thread.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Per-run timeout applied to listener runs.
    #[serde(default)]
    pub run_timeout_ms: Option<u64>,

    /// Script function recursion limit.
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,

    /// How deeply brackets, blocks and operators may nest in a script.
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,

    /// Register the built-in `helix` module.
    #[serde(default = "default_true")]
    pub std_lib: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        EngineSection {
            script_root: default_script_root(),
            worker_threads: default_worker_threads(),
            run_timeout_ms: None,
            max_call_depth: default_max_call_depth(),
            max_nesting_depth: default_max_nesting_depth(),
            std_lib: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModulesSection {
    /// Module ids whose `load()` is skipped.
    #[serde(default)]
    pub disabled: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub modules: ModulesSection,
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::parse(&content)?;
        debug!(target: "helix::config", "loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_script_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.engine.script_root = root.into();
        self
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.engine.run_timeout_ms.map(Duration::from_millis)
    }

    pub fn is_disabled(&self, module_id: &str) -> bool {
        self.modules.disabled.iter().any(|m| m == module_id)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.worker_threads == 0 {
            return Err(ConfigError::Invalid(
                "engine.worker_threads must be at least 1".to_string(),
            ));
        }
        if self.engine.max_call_depth == 0 {
            return Err(ConfigError::Invalid(
                "engine.max_call_depth must be at least 1".to_string(),
            ));
        }
        if self.engine.max_nesting_depth == 0 {
            return Err(ConfigError::Invalid(
                "engine.max_nesting_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = EngineConfig::parse(
            r#"
[engine]
script_root = "data/scripts"
worker_threads = 4
run_timeout_ms = 250
max_call_depth = 16
max_nesting_depth = 20
std_lib = false

[modules]
disabled = ["chat", "economy"]
"#,
        )
        .unwrap();

        assert_eq!(config.engine.script_root, PathBuf::from("data/scripts"));
        assert_eq!(config.engine.worker_threads, 4);
        assert_eq!(config.run_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.engine.max_call_depth, 16);
        assert_eq!(config.engine.max_nesting_depth, 20);
        assert!(!config.engine.std_lib);
        assert!(config.is_disabled("chat"));
        assert!(!config.is_disabled("core"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::parse("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.engine.worker_threads, 2);
        assert!(config.engine.std_lib);
        assert_eq!(config.run_timeout(), None);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = EngineConfig::parse("[engine]\nworker_threads = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_nesting_depth_rejected() {
        let err = EngineConfig::parse("[engine]\nmax_nesting_depth = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = EngineConfig::parse("[engine\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
