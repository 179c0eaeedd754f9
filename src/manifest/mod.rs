//! Run manifest parsing.
//!
//! A manifest is a YAML document declaring the cases a run executes, in
//! order. Case definitions are inlined; the `engine` field selects the
//! target engine family.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::model::{CaseDefinition, CaseStatus, Priority, TestCase};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunManifest {
    pub title: String,
    #[serde(default = "default_owner")]
    pub owner: String,
    /// Run-wide default; a case-level timeout wins
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    pub cases: Vec<ManifestCase>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestCase {
    pub id: String,
    pub title: String,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(flatten)]
    pub definition: CaseDefinition,
}

fn default_owner() -> String {
    "local".to_string()
}

fn default_priority() -> Priority {
    Priority::Medium
}

impl RunManifest {
    pub fn parse(text: &str) -> EngineResult<Self> {
        let manifest: RunManifest = serde_yaml::from_str(text)
            .map_err(|e| EngineError::InvalidConfiguration(format!("manifest: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidConfiguration(format!("manifest {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    fn validate(&self) -> EngineResult<()> {
        if self.cases.is_empty() {
            return Err(EngineError::InvalidConfiguration(
                "manifest declares no cases".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for case in &self.cases {
            if case.id.trim().is_empty() {
                return Err(EngineError::InvalidConfiguration(
                    "case id must not be empty".to_string(),
                ));
            }
            if !seen.insert(case.id.as_str()) {
                return Err(EngineError::InvalidConfiguration(format!(
                    "duplicate case id: {}",
                    case.id
                )));
            }
        }
        Ok(())
    }

    /// Materialize the declared cases, applying the run-wide timeout where
    /// a case does not set its own.
    pub fn to_test_cases(&self) -> Vec<TestCase> {
        self.cases
            .iter()
            .map(|case| TestCase {
                id: case.id.clone(),
                title: case.title.clone(),
                priority: case.priority,
                status: CaseStatus::Active,
                definition: case.definition.clone(),
                timeout_ms: case.timeout_ms.or(self.timeout_ms),
            })
            .collect()
    }

    pub fn case_ids(&self) -> Vec<String> {
        self.cases.iter().map(|c| c.id.clone()).collect()
    }
}
