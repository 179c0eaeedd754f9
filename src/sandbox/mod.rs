//! Execution Sandbox Adapter
//!
//! Runs one generated script to completion or timeout, isolated from other
//! concurrent executions, and returns a structured outcome. Timeout is a
//! normal outcome, not an error; only launch failures and unparsable
//! success reports surface as errors for the orchestrator to reconcile.

pub mod process;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::EngineResult;
use crate::generator::GeneratedScript;

pub use process::ProcessSandbox;

/// Wall-clock bounds for one execution
#[derive(Debug, Clone, Copy)]
pub struct ExecutionBudget {
    pub timeout: Duration,
    /// How long a cancelled execution gets to wind down before the adapter
    /// escalates to forced termination
    pub grace_period: Duration,
}

/// Structured report payload parsed from the engine's JSON output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineReport {
    #[serde(default)]
    pub assertions_passed: u32,
    #[serde(default)]
    pub assertions_failed: u32,
    #[serde(default)]
    pub failures: Vec<String>,
}

/// Outcome of one sandbox execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    /// None when the process was terminated before exiting on its own
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub report: Option<EngineReport>,
    /// Bounded-size captured stdout/stderr
    pub captured_output: String,
    pub duration_ms: u64,
    pub timed_out: bool,
    /// Terminated by a run-level abort rather than its own timeout
    #[serde(default)]
    pub cancelled: bool,
}

#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Execute one script. `cancel` flips to true when the owning run is
    /// aborted; the adapter must honor it within the grace period.
    async fn execute(
        &self,
        script: &GeneratedScript,
        budget: &ExecutionBudget,
        cancel: watch::Receiver<bool>,
    ) -> EngineResult<ExecutionOutcome>;
}
