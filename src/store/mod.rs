//! Persistence collaborator.
//!
//! The engine needs create/read/update keyed by entity identity, an
//! append-only per-case result history ordered by creation time, and a
//! per-run exclusive section for reconciliation so that two concurrent
//! result reconciliations for the same run never observe a stale
//! aggregate. `MemoryStore` is the in-process implementation and the test
//! double; a database-backed store would implement the same trait.

pub mod memory;

use async_trait::async_trait;

use crate::error::EngineResult;
use crate::model::{
    Defect, DefectStatus, OutcomePayload, ResultState, RunState, TestCase, TestResult, TestRun,
};

pub use memory::MemoryStore;

/// Result of an atomic reconciliation.
#[derive(Debug, Clone)]
pub enum Reconciliation {
    /// The result transitioned out of PENDING; `run_completed` is set when
    /// this was the last outstanding result and the run auto-promoted to
    /// COMPLETED under the same exclusive section.
    Applied {
        result: TestResult,
        run_completed: bool,
    },
    /// The result was already terminal; nothing changed. Carried back so
    /// ingestion can return the stored outcome idempotently.
    AlreadyTerminal(TestResult),
}

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn insert_case(&self, case: TestCase) -> EngineResult<()>;
    async fn test_case(&self, case_id: &str) -> EngineResult<TestCase>;

    /// Create a run with one PENDING result per case, in declared order.
    async fn create_run(
        &self,
        title: &str,
        owner: &str,
        case_ids: &[String],
    ) -> EngineResult<TestRun>;
    async fn run(&self, run_id: &str) -> EngineResult<TestRun>;
    async fn results(&self, run_id: &str) -> EngineResult<Vec<TestResult>>;

    /// Write a run state. Transition legality is the orchestrator's
    /// responsibility; the store only persists.
    async fn set_run_state(&self, run_id: &str, state: RunState) -> EngineResult<TestRun>;
    async fn record_fault(&self, run_id: &str, fault: &str) -> EngineResult<()>;

    async fn mark_result_started(&self, run_id: &str, case_id: &str) -> EngineResult<()>;

    /// Apply a terminal state to the (run, case) result under the per-run
    /// exclusive section. Idempotent for already-terminal results.
    async fn reconcile_result(
        &self,
        run_id: &str,
        case_id: &str,
        state: ResultState,
        outcome: Option<OutcomePayload>,
    ) -> EngineResult<Reconciliation>;

    /// Cascade an abort: every still-PENDING result becomes SKIPPED.
    /// Returns how many were skipped.
    async fn skip_remaining(&self, run_id: &str, reason: &str) -> EngineResult<u32>;

    /// Terminal results for one case across all runs, ordered by creation.
    async fn case_history(&self, case_id: &str) -> EngineResult<Vec<TestResult>>;
    async fn result(&self, result_id: &str) -> EngineResult<TestResult>;

    async fn create_defect(&self, defect: Defect) -> EngineResult<Defect>;
    async fn defect(&self, defect_id: &str) -> EngineResult<Defect>;
    async fn set_defect_status(
        &self,
        defect_id: &str,
        status: DefectStatus,
    ) -> EngineResult<Defect>;
}
