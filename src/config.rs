//! Optional YAML settings for diagnostics.
//!
//! Nothing in matching reads this module. It is a convenience for building a
//! [`TracingSink`] from a settings file; a [`TracingSink`] built in code with
//! [`TracingSink::new`] behaves the same. Mock definitions always come from
//! the caller.

use crate::diagnostics::TracingSink;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Diagnostic sink logging according to these settings.
    pub fn tracing_sink(&self) -> TracingSink {
        TracingSink::new(self.settings.clone())
    }
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Log every mock evaluation that matched
    #[serde(default)]
    pub log_matches: bool,

    /// Log kind mismatches and matcher errors
    #[serde(default = "default_true")]
    pub log_failures: bool,

    /// Log post-action failures
    #[serde(default = "default_true")]
    pub log_post_action_failures: bool,

    /// Level failures are logged at
    #[serde(default)]
    pub failure_level: FailureLevel,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_matches: false,
            log_failures: true,
            log_post_action_failures: true,
            failure_level: FailureLevel::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Log level for failure reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureLevel {
    Debug,
    #[default]
    Warn,
    Error,
}
