//! In-memory store. One mutex over the whole aggregate map realizes the
//! per-run exclusive section: a reconciliation reads the result, applies
//! the transition, and refreshes the run aggregate without another
//! reconciliation interleaving.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::{EngineError, EngineResult};
use crate::model::{
    new_id, Defect, DefectStatus, OutcomePayload, ResultState, RunState, TestCase, TestResult,
    TestRun,
};

use super::{Reconciliation, RunStore};

#[derive(Default)]
struct Inner {
    cases: HashMap<String, TestCase>,
    runs: HashMap<String, RunRecord>,
    /// case id -> terminal results in creation order (append-only)
    history: HashMap<String, Vec<TestResult>>,
    defects: HashMap<String, Defect>,
}

struct RunRecord {
    run: TestRun,
    /// Declared case order
    results: Vec<TestResult>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn record_mut(&mut self, run_id: &str) -> EngineResult<&mut RunRecord> {
        self.runs
            .get_mut(run_id)
            .ok_or_else(|| EngineError::UnknownReference(format!("run {}", run_id)))
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn insert_case(&self, case: TestCase) -> EngineResult<()> {
        let mut inner = self.inner.lock().await;
        inner.cases.insert(case.id.clone(), case);
        Ok(())
    }

    async fn test_case(&self, case_id: &str) -> EngineResult<TestCase> {
        let inner = self.inner.lock().await;
        inner
            .cases
            .get(case_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownReference(format!("test case {}", case_id)))
    }

    async fn create_run(
        &self,
        title: &str,
        owner: &str,
        case_ids: &[String],
    ) -> EngineResult<TestRun> {
        let mut inner = self.inner.lock().await;
        for case_id in case_ids {
            if !inner.cases.contains_key(case_id) {
                return Err(EngineError::UnknownReference(format!(
                    "test case {}",
                    case_id
                )));
            }
        }

        let now = Utc::now();
        let run = TestRun {
            id: new_id(),
            title: title.to_string(),
            state: RunState::Pending,
            case_ids: case_ids.to_vec(),
            owner: owner.to_string(),
            created_at: now,
            fault: None,
        };
        let results = case_ids
            .iter()
            .map(|case_id| TestResult {
                id: new_id(),
                run_id: run.id.clone(),
                case_id: case_id.clone(),
                state: ResultState::Pending,
                created_at: now,
                started_at: None,
                finished_at: None,
                outcome: None,
            })
            .collect();

        inner.runs.insert(
            run.id.clone(),
            RunRecord {
                run: run.clone(),
                results,
            },
        );
        Ok(run)
    }

    async fn run(&self, run_id: &str) -> EngineResult<TestRun> {
        let inner = self.inner.lock().await;
        inner
            .runs
            .get(run_id)
            .map(|r| r.run.clone())
            .ok_or_else(|| EngineError::UnknownReference(format!("run {}", run_id)))
    }

    async fn results(&self, run_id: &str) -> EngineResult<Vec<TestResult>> {
        let inner = self.inner.lock().await;
        inner
            .runs
            .get(run_id)
            .map(|r| r.results.clone())
            .ok_or_else(|| EngineError::UnknownReference(format!("run {}", run_id)))
    }

    async fn set_run_state(&self, run_id: &str, state: RunState) -> EngineResult<TestRun> {
        let mut inner = self.inner.lock().await;
        let record = inner.record_mut(run_id)?;
        record.run.state = state;
        Ok(record.run.clone())
    }

    async fn record_fault(&self, run_id: &str, fault: &str) -> EngineResult<()> {
        let mut inner = self.inner.lock().await;
        let record = inner.record_mut(run_id)?;
        record.run.fault = Some(fault.to_string());
        Ok(())
    }

    async fn mark_result_started(&self, run_id: &str, case_id: &str) -> EngineResult<()> {
        let mut inner = self.inner.lock().await;
        let record = inner.record_mut(run_id)?;
        let result = record
            .results
            .iter_mut()
            .find(|r| r.case_id == case_id)
            .ok_or_else(|| EngineError::UnknownReference(format!("result for {}", case_id)))?;
        result.started_at = Some(Utc::now());
        Ok(())
    }

    async fn reconcile_result(
        &self,
        run_id: &str,
        case_id: &str,
        state: ResultState,
        outcome: Option<OutcomePayload>,
    ) -> EngineResult<Reconciliation> {
        if !state.is_terminal() {
            return Err(EngineError::InvalidTransition {
                entity: "result",
                from: "PENDING".to_string(),
                event: format!("{:?}", state),
            });
        }

        let mut inner = self.inner.lock().await;
        let record = inner.record_mut(run_id)?;
        let result = record
            .results
            .iter_mut()
            .find(|r| r.case_id == case_id)
            .ok_or_else(|| EngineError::UnknownReference(format!("test case {}", case_id)))?;

        // Terminal states are final; a re-run creates a new result.
        if result.state.is_terminal() {
            return Ok(Reconciliation::AlreadyTerminal(result.clone()));
        }

        result.state = state;
        result.outcome = outcome;
        result.finished_at = Some(Utc::now());
        let applied = result.clone();

        // Refresh the aggregate under the same exclusive section
        if record.run.state == RunState::Pending {
            record.run.state = RunState::InProgress;
        }
        let mut run_completed = false;
        if record.run.state == RunState::InProgress
            && record.results.iter().all(|r| r.state.is_terminal())
        {
            record.run.state = RunState::Completed;
            run_completed = true;
        }

        inner
            .history
            .entry(case_id.to_string())
            .or_default()
            .push(applied.clone());

        Ok(Reconciliation::Applied {
            result: applied,
            run_completed,
        })
    }

    async fn skip_remaining(&self, run_id: &str, reason: &str) -> EngineResult<u32> {
        let mut inner = self.inner.lock().await;
        let record = inner.record_mut(run_id)?;
        let now = Utc::now();
        let mut skipped = Vec::new();
        for result in &mut record.results {
            if result.state == ResultState::Pending {
                result.state = ResultState::Skipped;
                result.finished_at = Some(now);
                result.outcome = Some(OutcomePayload {
                    failure_reason: Some(reason.to_string()),
                    ..Default::default()
                });
                skipped.push(result.clone());
            }
        }
        let count = skipped.len() as u32;
        for result in skipped {
            inner
                .history
                .entry(result.case_id.clone())
                .or_default()
                .push(result);
        }
        Ok(count)
    }

    async fn case_history(&self, case_id: &str) -> EngineResult<Vec<TestResult>> {
        let inner = self.inner.lock().await;
        Ok(inner.history.get(case_id).cloned().unwrap_or_default())
    }

    async fn result(&self, result_id: &str) -> EngineResult<TestResult> {
        let inner = self.inner.lock().await;
        inner
            .runs
            .values()
            .flat_map(|record| record.results.iter())
            .find(|r| r.id == result_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownReference(format!("result {}", result_id)))
    }

    async fn create_defect(&self, defect: Defect) -> EngineResult<Defect> {
        let mut inner = self.inner.lock().await;
        inner.defects.insert(defect.id.clone(), defect.clone());
        Ok(defect)
    }

    async fn defect(&self, defect_id: &str) -> EngineResult<Defect> {
        let inner = self.inner.lock().await;
        inner
            .defects
            .get(defect_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownReference(format!("defect {}", defect_id)))
    }

    async fn set_defect_status(
        &self,
        defect_id: &str,
        status: DefectStatus,
    ) -> EngineResult<Defect> {
        let mut inner = self.inner.lock().await;
        let defect = inner
            .defects
            .get_mut(defect_id)
            .ok_or_else(|| EngineError::UnknownReference(format!("defect {}", defect_id)))?;
        defect.status = status;
        Ok(defect.clone())
    }
}
