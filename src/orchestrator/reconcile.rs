//! Outcome reconciliation.
//!
//! One code path maps an `ExecutionOutcome` onto a result state, whether
//! the outcome came from the orchestrator's own sandbox or from an
//! externally uploaded report: retryable infrastructure faults are decided
//! upstream; here an outcome is pure data.

use std::sync::Arc;

use regex::Regex;

use crate::error::EngineResult;
use crate::model::{OutcomePayload, ResultState};
use crate::sandbox::ExecutionOutcome;
use crate::store::{Reconciliation, RunStore};

pub struct Reconciler {
    store: Arc<dyn RunStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    /// Policy: PASS iff exit 0 and no assertion failures; FAIL on a
    /// semantic failure; BLOCKED on timeout or abort-termination.
    /// Launch failures and unparsable reports never reach this function —
    /// they surface as errors and are recorded via [`apply_blocked`].
    ///
    /// [`apply_blocked`]: Reconciler::apply_blocked
    pub fn classify(outcome: &ExecutionOutcome) -> (ResultState, OutcomePayload) {
        let mut payload = OutcomePayload {
            duration_ms: Some(outcome.duration_ms),
            timed_out: outcome.timed_out,
            logs: (!outcome.captured_output.is_empty())
                .then(|| outcome.captured_output.clone()),
            ..Default::default()
        };
        if let Some(report) = &outcome.report {
            payload.assertions_passed = report.assertions_passed;
            payload.assertions_failed = report.assertions_failed;
        }

        if outcome.timed_out {
            payload.failure_reason = Some("execution timed out".to_string());
            return (ResultState::Blocked, payload);
        }
        if outcome.cancelled && outcome.exit_code.is_none() {
            payload.failure_reason = Some("execution aborted".to_string());
            return (ResultState::Blocked, payload);
        }

        let assertion_failures = outcome
            .report
            .as_ref()
            .map(|r| r.assertions_failed)
            .unwrap_or(0);
        if outcome.exit_code == Some(0) && assertion_failures == 0 {
            return (ResultState::Pass, payload);
        }

        payload.failure_reason = outcome
            .report
            .as_ref()
            .and_then(|r| r.failures.first().cloned())
            .or_else(|| salvage_error_line(&outcome.captured_output))
            .or_else(|| {
                Some(match outcome.exit_code {
                    Some(code) => format!("engine exited with code {}", code),
                    None => "engine terminated without exit code".to_string(),
                })
            });
        (ResultState::Fail, payload)
    }

    /// Reconcile a captured outcome into the (run, case) result.
    pub async fn apply_outcome(
        &self,
        run_id: &str,
        case_id: &str,
        outcome: &ExecutionOutcome,
    ) -> EngineResult<Reconciliation> {
        let (state, payload) = Self::classify(outcome);
        self.store
            .reconcile_result(run_id, case_id, state, Some(payload))
            .await
    }

    /// Record an infrastructure-level failure (launch failure after the
    /// retry budget, unparsable report) as BLOCKED.
    pub async fn apply_blocked(
        &self,
        run_id: &str,
        case_id: &str,
        reason: &str,
    ) -> EngineResult<Reconciliation> {
        let payload = OutcomePayload {
            failure_reason: Some(reason.to_string()),
            ..Default::default()
        };
        self.store
            .reconcile_result(run_id, case_id, ResultState::Blocked, Some(payload))
            .await
    }
}

/// Pull the first error line out of captured engine output when the
/// report carried no failure detail.
fn salvage_error_line(captured: &str) -> Option<String> {
    let re = Regex::new(r"(?mi)^\s*error:?\s+(.+)$").ok()?;
    re.captures(captured)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}
