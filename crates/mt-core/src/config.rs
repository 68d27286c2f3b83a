//! Configuration types and parsing for modeltable.yml

use crate::error::{CoreError, CoreResult};
use crate::names::ProjectName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Main configuration from modeltable.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Deployment name, used in log lines
    pub name: String,

    /// Project used for unqualified identifiers
    #[serde(default = "default_project")]
    pub default_project: String,

    /// Metadata store location
    #[serde(default)]
    pub meta: MetaConfig,

    /// Registered data sources, keyed by the namespace used in queries
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,

    /// Query execution settings
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Model training settings
    #[serde(default)]
    pub training: TrainingConfig,

    /// Job scheduler settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Metadata store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetaConfig {
    /// DuckDB file path, or `:memory:`
    #[serde(default = "default_meta_path")]
    pub path: String,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            path: default_meta_path(),
        }
    }
}

/// Data-source adapter kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Tables and views of a DuckDB database
    DuckDb,
    /// A directory of csv/json/parquet files
    Files,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::DuckDb => write!(f, "duckdb"),
            SourceType::Files => write!(f, "files"),
        }
    }
}

/// One data-source entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub path: String,
}

/// Query execution configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Deadline for a single adapter fetch
    #[serde(default)]
    pub fetch_timeout_ms: Option<u64>,

    /// Deadline for a single predictor invocation
    #[serde(default)]
    pub predict_timeout_ms: Option<u64>,

    /// Whether plain UNION removes duplicate rows
    #[serde(default)]
    pub union_deduplicate: bool,
}

impl ExecutionConfig {
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }

    pub fn predict_timeout(&self) -> Option<Duration> {
        self.predict_timeout_ms.map(Duration::from_millis)
    }
}

/// Model training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainingConfig {
    /// Upper bound for synchronous wait-for-completion
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,

    /// Poll period while waiting for completion
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: default_wait_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl TrainingConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Job scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Seconds between `check_timetable` ticks
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

const CONFIG_FILE_NAMES: [&str; 2] = ["modeltable.yml", "modeltable.yaml"];

fn default_project() -> String {
    "mindsdb".to_string()
}

fn default_meta_path() -> String {
    "target/meta.duckdb".to_string()
}

fn default_wait_timeout_secs() -> u64 {
    600
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_interval_secs() -> u64 {
    60
}

impl Config {
    /// A configuration with every default applied
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_project: default_project(),
            meta: MetaConfig::default(),
            sources: BTreeMap::new(),
            execution: ExecutionConfig::default(),
            training: TrainingConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }

    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load configuration from a directory containing modeltable.yml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        for file in CONFIG_FILE_NAMES {
            let path = dir.join(file);
            if path.exists() {
                return Self::load(&path);
            }
        }
        Err(CoreError::ConfigNotFound {
            path: dir.join(CONFIG_FILE_NAMES[0]).display().to_string(),
        })
    }

    /// Parse and validate YAML text
    pub fn parse(content: &str) -> CoreResult<Self> {
        let config: Config =
            serde_yaml::from_str(content).map_err(|e| CoreError::ConfigParseError {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// The default project as a typed name
    pub fn default_project_name(&self) -> CoreResult<ProjectName> {
        ProjectName::try_new(self.default_project.clone())
    }

    fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "name cannot be empty".to_string(),
            });
        }

        if ProjectName::try_new(self.default_project.clone()).is_err() {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "default_project '{}' is not a valid project name",
                    self.default_project
                ),
            });
        }

        for (name, source) in &self.sources {
            if name.is_empty() || name.contains('.') {
                return Err(CoreError::ConfigInvalid {
                    message: format!("source name '{}' is not a valid namespace", name),
                });
            }
            if source.path.is_empty() {
                return Err(CoreError::ConfigInvalid {
                    message: format!("source '{}' has an empty path", name),
                });
            }
        }

        if self.scheduler.interval_secs == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "scheduler.interval_secs must be greater than zero".to_string(),
            });
        }

        if self.training.poll_interval_ms == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "training.poll_interval_ms must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
