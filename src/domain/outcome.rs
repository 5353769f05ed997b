//! Units of work and their terminal outcomes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlates every log line of one validation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One metadata set to harvest and validate, identified by its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestUnit {
    pub name: String,
    pub path: PathBuf,
}

impl HarvestUnit {
    /// Build a unit from a payload path. `None` when the path has no
    /// UTF-8 file name.
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_string();
        Some(Self { name, path })
    }

    /// File name without its extension, used to derive report names.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.name)
    }
}

/// Where a validation result ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ArtifactLocation {
    /// Persisted locally under the results directory.
    File(PathBuf),
    /// Published by the remote service.
    Url(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
    /// Nothing matched the unit's query; no validation was attempted.
    Skipped,
}

/// Terminal result for one unit. Every unit of a run gets exactly one.
#[derive(Debug, Clone, Serialize)]
pub struct UnitOutcome {
    pub unit: String,
    pub status: OutcomeStatus,
    pub artifacts: Vec<ArtifactLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl UnitOutcome {
    pub fn succeeded(unit: String, artifacts: Vec<ArtifactLocation>, elapsed: Duration) -> Self {
        Self {
            unit,
            status: OutcomeStatus::Succeeded,
            artifacts,
            error: None,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn failed(unit: String, error: &dyn fmt::Display, elapsed: Duration) -> Self {
        Self {
            unit,
            status: OutcomeStatus::Failed,
            artifacts: Vec::new(),
            error: Some(error.to_string()),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn skipped(unit: String) -> Self {
        Self {
            unit,
            status: OutcomeStatus::Skipped,
            artifacts: Vec::new(),
            error: None,
            elapsed_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_from_path_uses_file_name() {
        let unit = HarvestUnit::from_path(PathBuf::from("/work/units/dataset-a.json")).unwrap();
        assert_eq!(unit.name, "dataset-a.json");
        assert_eq!(unit.stem(), "dataset-a");
    }

    #[test]
    fn test_stem_without_extension_is_the_name() {
        let unit = HarvestUnit::from_path(PathBuf::from("/work/units/plain")).unwrap();
        assert_eq!(unit.stem(), "plain");
    }

    #[test]
    fn test_skipped_outcome_carries_no_error() {
        let outcome = UnitOutcome::skipped("dataset-a.json".to_string());
        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert!(outcome.error.is_none());
        assert!(outcome.artifacts.is_empty());
    }
}
