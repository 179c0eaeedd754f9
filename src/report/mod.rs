//! Run report output.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::model::{TestResult, TestRun};
use crate::orchestrator::{summarize, RunSummary};

/// Full record of one finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run: TestRun,
    pub summary: RunSummary,
    pub results: Vec<TestResult>,
    pub generated_at: DateTime<Utc>,
}

impl RunReport {
    pub fn new(run: TestRun, results: Vec<TestResult>) -> Self {
        Self {
            summary: summarize(&results),
            run,
            results,
            generated_at: Utc::now(),
        }
    }
}

/// Write the report as pretty JSON to a file, or to stdout when no path
/// is given.
pub fn write(report: &RunReport, output: Option<&Path>) -> EngineResult<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| EngineError::Store(format!("report serialization: {}", e)))?;

    if let Some(path) = output {
        std::fs::write(path, &json)
            .map_err(|e| EngineError::Store(format!("report {}: {}", path.display(), e)))?;
        println!("Run report saved to: {}", path.display());
    } else {
        println!("{}", json);
    }
    Ok(())
}
