//! Model and model-version records

use crate::names::{ModelName, ProjectName};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a model: `(project, name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId {
    pub project: ProjectName,
    pub name: ModelName,
}

impl ModelId {
    pub fn new(project: ProjectName, name: ModelName) -> Self {
        Self { project, name }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.project, self.name)
    }
}

/// Training state of a model version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Generating,
    Complete,
    Error,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Generating => "generating",
            VersionStatus::Complete => "complete",
            VersionStatus::Error => "error",
        }
    }

    /// Parse the stored representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "generating" => Some(VersionStatus::Generating),
            "complete" => Some(VersionStatus::Complete),
            "error" => Some(VersionStatus::Error),
            _ => None,
        }
    }

    /// Whether training has finished, successfully or not
    pub fn is_terminal(&self) -> bool {
        !matches!(self, VersionStatus::Generating)
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One trained (or training) version of a model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelVersion {
    pub model: ModelId,
    /// Positive, strictly increasing per model, never reused
    pub version: u32,
    pub status: VersionStatus,
    pub engine: String,
    pub predict: Option<String>,
    pub tag: Option<String>,
    pub training_query: Option<String>,
    pub options: BTreeMap<String, String>,
    /// Whether completion should make this version active
    pub activate_on_complete: bool,
    pub error: Option<String>,
    pub created_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

impl ModelVersion {
    pub fn is_complete(&self) -> bool {
        self.status == VersionStatus::Complete
    }
}

/// A model and its version pointers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRecord {
    pub id: ModelId,
    pub engine: String,
    /// The single active version; `None` until the first completion
    pub active_version: Option<u32>,
    /// Highest version number ever allocated, including deleted versions
    pub last_version: u32,
    pub created_at: NaiveDateTime,
}

impl ModelRecord {
    pub fn is_active(&self, version: u32) -> bool {
        self.active_version == Some(version)
    }
}

/// Parameters of a CREATE or RETRAIN request.
///
/// Unset fields on retrain inherit from the currently active version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub engine: Option<String>,
    pub predict: Option<String>,
    pub tag: Option<String>,
    pub training_query: Option<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    /// `Some(false)` keeps the current active version after completion
    pub active: Option<bool>,
    /// Block until training finishes (bounded poll)
    #[serde(default)]
    pub wait: bool,
}

impl TrainingParams {
    pub fn predict(mut self, target: impl Into<String>) -> Self {
        self.predict = Some(target.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = Some(engine.into());
        self
    }

    pub fn training_query(mut self, sql: impl Into<String>) -> Self {
        self.training_query = Some(sql.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn wait(mut self) -> Self {
        self.wait = true;
        self
    }
}
