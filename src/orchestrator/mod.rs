//! Execution Orchestrator
//!
//! Schedules a run's cases across a bounded worker pool, maps each unit to
//! its (run, case) result, applies the lifecycle state machines, and
//! reconciles outcomes. Pause is cooperative (in-flight executions run to
//! completion), abort is preemptive (in-flight executions are cancelled
//! and must wind down within the grace period).

pub mod events;
pub mod reconcile;
pub mod state;

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use log::info;
use tokio::sync::{broadcast, watch, Semaphore};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::generator::{self, GeneratedScript};
use crate::model::{RunState, TestCase, TestRun};
use crate::sandbox::{ExecutionBudget, Sandbox};
use crate::store::{Reconciliation, RunStore};

pub use events::{ConsoleEventListener, EventEmitter, RunEvent};
pub use reconcile::Reconciler;
pub use state::{next_state, summarize, RunCommand, RunSummary};

/// Cooperative control flags for one run, shared over a watch channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSignal {
    pub paused: bool,
    pub aborted: bool,
}

struct Controller {
    signal: watch::Sender<RunSignal>,
    cancel: watch::Sender<bool>,
}

struct Unit {
    index: usize,
    case: TestCase,
    script: GeneratedScript,
    timeout: Duration,
}

pub struct Orchestrator {
    store: Arc<dyn RunStore>,
    sandbox: Arc<dyn Sandbox>,
    reconciler: Arc<Reconciler>,
    emitter: Arc<EventEmitter>,
    config: EngineConfig,
    /// One controller per run in flight; no process-wide run state
    controllers: StdMutex<HashMap<String, Controller>>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn RunStore>, sandbox: Arc<dyn Sandbox>, config: EngineConfig) -> Self {
        let (emitter, _) = EventEmitter::new();
        Self {
            reconciler: Arc::new(Reconciler::new(store.clone())),
            store,
            sandbox,
            emitter: Arc::new(emitter),
            config,
            controllers: StdMutex::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.emitter.subscribe()
    }

    pub fn reconciler(&self) -> Arc<Reconciler> {
        self.reconciler.clone()
    }

    /// Execute a PENDING run to a terminal state.
    ///
    /// Scripts for every case are generated up front so that an
    /// `InvalidConfiguration` comes back synchronously before any state is
    /// touched.
    pub async fn execute_run(&self, run_id: &str) -> EngineResult<TestRun> {
        let run = self.store.run(run_id).await?;
        let next = state::next_state(run.state, RunCommand::Start)?;

        let mut units = Vec::new();
        for (index, case_id) in run.case_ids.iter().enumerate() {
            let case = self.store.test_case(case_id).await?;
            let mut script = generator::generate(&case.definition)?;
            script.case_id = Some(case.id.clone());
            let timeout = Duration::from_millis(
                case.timeout_ms.unwrap_or(self.config.default_timeout_ms),
            );
            units.push(Unit {
                index,
                case,
                script,
                timeout,
            });
        }

        self.store.set_run_state(run_id, next).await?;
        info!("run {} started with {} cases", run_id, units.len());

        let (signal_tx, signal_rx) = watch::channel(RunSignal::default());
        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.lock_controllers().insert(
            run_id.to_string(),
            Controller {
                signal: signal_tx,
                cancel: cancel_tx,
            },
        );

        self.emitter.emit(RunEvent::RunStarted {
            run_id: run_id.to_string(),
            title: run.title.clone(),
            case_count: units.len(),
        });

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let started = Instant::now();
        let mut signal_rx_gate = signal_rx.clone();
        let mut handles = Vec::new();

        for unit in units {
            // Worker-pool capacity first, then the pause/abort gate: a
            // pause must also hold back units already queued on capacity.
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| EngineError::Store(e.to_string()))?;

            loop {
                let signal = *signal_rx_gate.borrow();
                if signal.aborted || !signal.paused {
                    break;
                }
                if signal_rx_gate.changed().await.is_err() {
                    break;
                }
            }
            if signal_rx_gate.borrow().aborted {
                drop(permit);
                break;
            }

            let store = self.store.clone();
            let sandbox = self.sandbox.clone();
            let reconciler = self.reconciler.clone();
            let emitter = self.emitter.clone();
            let run_id = run_id.to_string();
            let cancel_rx = cancel_rx.clone();
            let launch_retry_limit = self.config.launch_retry_limit;
            let grace_period = Duration::from_millis(self.config.grace_period_ms);

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                run_unit(
                    store,
                    sandbox,
                    reconciler,
                    emitter,
                    run_id,
                    unit,
                    launch_retry_limit,
                    grace_period,
                    cancel_rx,
                )
                .await
            }));
        }

        let mut fault: Option<String> = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => fault = Some(e.to_string()),
                Err(e) => fault = Some(format!("worker panicked: {}", e)),
            }
        }

        let final_run = if signal_rx.borrow().aborted {
            // abort() already moved the run to ABORTED; cascade the skip
            self.store.skip_remaining(run_id, "run aborted").await?;
            self.store.run(run_id).await?
        } else if let Some(fault) = fault {
            self.store.record_fault(run_id, &fault).await?;
            self.store
                .skip_remaining(run_id, "orchestrator fault")
                .await?;
            self.store.set_run_state(run_id, RunState::Failed).await?
        } else {
            // The last reconciliation promoted the run to COMPLETED —
            // unless a pause landed after the final dispatch, in which
            // case the run is suspended with nothing left to do.
            let run = self.store.run(run_id).await?;
            if run.state.is_terminal() {
                run
            } else {
                self.complete_if_drained(run).await?
            }
        };

        self.lock_controllers().remove(run_id);

        let results = self.store.results(run_id).await?;
        self.emitter.emit(RunEvent::RunFinished {
            run_id: run_id.to_string(),
            state: final_run.state,
            summary: summarize(&results),
            duration_ms: started.elapsed().as_millis() as u64,
        });
        info!("run {} finished as {:?}", run_id, final_run.state);
        Ok(final_run)
    }

    /// Stop dispatching new cases; in-flight executions run to completion.
    pub async fn pause(&self, run_id: &str) -> EngineResult<TestRun> {
        let run = self.store.run(run_id).await?;
        let next = state::next_state(run.state, RunCommand::Pause)?;
        let updated = self.store.set_run_state(run_id, next).await?;
        self.send_signal(run_id, |signal| signal.paused = true);
        Ok(updated)
    }

    /// Resume dispatching the remaining PENDING cases. A paused run whose
    /// results all reached a terminal state in the meantime has nothing
    /// left to dispatch and completes instead.
    pub async fn resume(&self, run_id: &str) -> EngineResult<TestRun> {
        let run = self.store.run(run_id).await?;
        let next = state::next_state(run.state, RunCommand::Resume)?;
        let updated = self.store.set_run_state(run_id, next).await?;
        self.send_signal(run_id, |signal| signal.paused = false);
        self.complete_if_drained(updated).await
    }

    /// Complete a non-terminal run once every result is terminal; keeps
    /// the run from idling in IN_PROGRESS or PAUSED with all work done.
    async fn complete_if_drained(&self, run: TestRun) -> EngineResult<TestRun> {
        let results = self.store.results(&run.id).await?;
        if !results.is_empty() && results.iter().all(|r| r.state.is_terminal()) {
            return self.store.set_run_state(&run.id, RunState::Completed).await;
        }
        Ok(run)
    }

    /// Cancel in-flight executions and skip everything not yet started.
    pub async fn abort(&self, run_id: &str) -> EngineResult<TestRun> {
        let run = self.store.run(run_id).await?;
        let next = state::next_state(run.state, RunCommand::Abort)?;
        let updated = self.store.set_run_state(run_id, next).await?;

        let signalled = {
            let controllers = self.lock_controllers();
            match controllers.get(run_id) {
                Some(controller) => {
                    controller.signal.send_modify(|signal| signal.aborted = true);
                    let _ = controller.cancel.send(true);
                    true
                }
                None => false,
            }
        };
        if !signalled {
            // nothing in flight (e.g. an ingestion-fed run); cascade here
            self.store.skip_remaining(run_id, "run aborted").await?;
        }
        Ok(updated)
    }

    fn send_signal(&self, run_id: &str, f: impl FnOnce(&mut RunSignal)) {
        let controllers = self.lock_controllers();
        if let Some(controller) = controllers.get(run_id) {
            controller.signal.send_modify(f);
        }
    }

    fn lock_controllers(&self) -> std::sync::MutexGuard<'_, HashMap<String, Controller>> {
        self.controllers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Run one dispatched unit: execute the script (retrying launch failures
/// up to the budget, never semantic failures), then reconcile the outcome.
/// Returns Err only on an orchestrator-level fault, which fails the run.
#[allow(clippy::too_many_arguments)]
async fn run_unit(
    store: Arc<dyn RunStore>,
    sandbox: Arc<dyn Sandbox>,
    reconciler: Arc<Reconciler>,
    emitter: Arc<EventEmitter>,
    run_id: String,
    unit: Unit,
    launch_retry_limit: u32,
    grace_period: Duration,
    cancel_rx: watch::Receiver<bool>,
) -> EngineResult<()> {
    emitter.emit(RunEvent::CaseStarted {
        index: unit.index,
        case_id: unit.case.id.clone(),
        title: unit.case.title.clone(),
    });
    store.mark_result_started(&run_id, &unit.case.id).await?;

    let budget = ExecutionBudget {
        timeout: unit.timeout,
        grace_period,
    };
    let started = Instant::now();

    let mut attempt = 0;
    let reconciliation = loop {
        attempt += 1;
        match sandbox.execute(&unit.script, &budget, cancel_rx.clone()).await {
            Ok(outcome) => {
                break reconciler
                    .apply_outcome(&run_id, &unit.case.id, &outcome)
                    .await?
            }
            Err(EngineError::LaunchFailure(reason)) => {
                if attempt <= launch_retry_limit {
                    emitter.emit(RunEvent::CaseRetrying {
                        index: unit.index,
                        case_id: unit.case.id.clone(),
                        attempt,
                        max_attempts: launch_retry_limit,
                    });
                    continue;
                }
                break reconciler
                    .apply_blocked(&run_id, &unit.case.id, &format!("launch failure: {}", reason))
                    .await?;
            }
            Err(EngineError::ReportParseError(reason)) => {
                break reconciler
                    .apply_blocked(
                        &run_id,
                        &unit.case.id,
                        &format!("report parse error: {}", reason),
                    )
                    .await?;
            }
            Err(other) => return Err(other),
        }
    };

    let (state, reason) = match reconciliation {
        Reconciliation::Applied { result, .. } | Reconciliation::AlreadyTerminal(result) => (
            result.state,
            result.outcome.and_then(|o| o.failure_reason),
        ),
    };
    emitter.emit(RunEvent::CaseFinished {
        index: unit.index,
        case_id: unit.case.id.clone(),
        state,
        duration_ms: started.elapsed().as_millis() as u64,
        reason,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CaseDefinition, CaseStatus, LoadTestConfig, Priority, ResultState, TestCase,
    };
    use crate::sandbox::ExecutionOutcome;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    enum Scripted {
        Outcome(Box<ExecutionOutcome>),
        LaunchFailure(String),
        Fault(String),
    }

    /// Sandbox double scripted per case id; honors cancellation during its
    /// artificial delay.
    struct FakeSandbox {
        scripted: StdMutex<HashMap<String, VecDeque<Scripted>>>,
        delay: Duration,
    }

    impl FakeSandbox {
        fn new(delay: Duration) -> Self {
            Self {
                scripted: StdMutex::new(HashMap::new()),
                delay,
            }
        }

        fn script_case(&self, case_id: &str, results: Vec<Scripted>) {
            self.scripted
                .lock()
                .unwrap()
                .insert(case_id.to_string(), results.into());
        }
    }

    #[async_trait]
    impl Sandbox for FakeSandbox {
        async fn execute(
            &self,
            script: &GeneratedScript,
            _budget: &ExecutionBudget,
            mut cancel: watch::Receiver<bool>,
        ) -> EngineResult<ExecutionOutcome> {
            if !self.delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.delay) => {}
                    changed = cancel.changed() => {
                        if changed.is_ok() && *cancel.borrow() {
                            return Ok(ExecutionOutcome {
                                cancelled: true,
                                ..Default::default()
                            });
                        }
                    }
                }
            }

            let case_id = script.case_id.clone().unwrap_or_default();
            let next = self
                .scripted
                .lock()
                .unwrap()
                .get_mut(&case_id)
                .and_then(|queue| queue.pop_front());
            match next {
                Some(Scripted::Outcome(outcome)) => Ok(*outcome),
                Some(Scripted::LaunchFailure(reason)) => {
                    Err(EngineError::LaunchFailure(reason))
                }
                Some(Scripted::Fault(reason)) => Err(EngineError::Store(reason)),
                None => Ok(pass_outcome()),
            }
        }
    }

    fn pass_outcome() -> ExecutionOutcome {
        ExecutionOutcome {
            exit_code: Some(0),
            ..Default::default()
        }
    }

    fn fail_outcome() -> ExecutionOutcome {
        ExecutionOutcome {
            exit_code: Some(1),
            ..Default::default()
        }
    }

    fn timeout_outcome() -> ExecutionOutcome {
        ExecutionOutcome {
            timed_out: true,
            ..Default::default()
        }
    }

    fn sample_case(id: &str, vus: u32) -> TestCase {
        TestCase {
            id: id.to_string(),
            title: format!("case {}", id),
            priority: Priority::Medium,
            status: CaseStatus::Active,
            definition: CaseDefinition::LoadTest(LoadTestConfig {
                target_url: "https://example.com".to_string(),
                virtual_users: vus,
                duration: "1s".to_string(),
                thresholds: None,
            }),
            timeout_ms: None,
        }
    }

    async fn setup(
        case_ids: &[&str],
        sandbox: FakeSandbox,
        config: EngineConfig,
    ) -> (Arc<Orchestrator>, Arc<MemoryStore>, TestRun) {
        let store = Arc::new(MemoryStore::new());
        for id in case_ids {
            store.insert_case(sample_case(id, 1)).await.unwrap();
        }
        let ids: Vec<String> = case_ids.iter().map(|s| s.to_string()).collect();
        let run = store.create_run("test run", "tester", &ids).await.unwrap();
        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            Arc::new(sandbox),
            config,
        ));
        (orchestrator, store, run)
    }

    fn states(results: &[crate::model::TestResult]) -> Vec<ResultState> {
        results.iter().map(|r| r.state).collect()
    }

    #[tokio::test]
    async fn test_mixed_outcomes_complete_the_run() {
        let sandbox = FakeSandbox::new(Duration::ZERO);
        sandbox.script_case("a", vec![Scripted::Outcome(Box::new(pass_outcome()))]);
        sandbox.script_case("b", vec![Scripted::Outcome(Box::new(timeout_outcome()))]);
        sandbox.script_case("c", vec![Scripted::Outcome(Box::new(pass_outcome()))]);

        let (orchestrator, store, run) =
            setup(&["a", "b", "c"], sandbox, EngineConfig::default()).await;
        let finished = orchestrator.execute_run(&run.id).await.unwrap();

        // one timed-out case blocks its result but never fails the run
        assert_eq!(finished.state, RunState::Completed);
        assert_eq!(
            states(&store.results(&run.id).await.unwrap()),
            vec![ResultState::Pass, ResultState::Blocked, ResultState::Pass]
        );
    }

    #[tokio::test]
    async fn test_semantic_failure_completes_run_with_fail_result() {
        let sandbox = FakeSandbox::new(Duration::ZERO);
        sandbox.script_case("a", vec![Scripted::Outcome(Box::new(fail_outcome()))]);

        let (orchestrator, store, run) = setup(&["a"], sandbox, EngineConfig::default()).await;
        let finished = orchestrator.execute_run(&run.id).await.unwrap();

        assert_eq!(finished.state, RunState::Completed);
        assert_eq!(
            states(&store.results(&run.id).await.unwrap()),
            vec![ResultState::Fail]
        );
    }

    #[tokio::test]
    async fn test_launch_failure_retried_then_recovers() {
        let sandbox = FakeSandbox::new(Duration::ZERO);
        sandbox.script_case(
            "a",
            vec![
                Scripted::LaunchFailure("k6 missing".to_string()),
                Scripted::Outcome(Box::new(pass_outcome())),
            ],
        );

        let (orchestrator, store, run) = setup(&["a"], sandbox, EngineConfig::default()).await;
        orchestrator.execute_run(&run.id).await.unwrap();

        assert_eq!(
            states(&store.results(&run.id).await.unwrap()),
            vec![ResultState::Pass]
        );
    }

    #[tokio::test]
    async fn test_launch_failure_exhausting_budget_is_blocked() {
        let sandbox = FakeSandbox::new(Duration::ZERO);
        // default budget is 2 retries, i.e. 3 attempts total
        sandbox.script_case(
            "a",
            vec![
                Scripted::LaunchFailure("boom".to_string()),
                Scripted::LaunchFailure("boom".to_string()),
                Scripted::LaunchFailure("boom".to_string()),
            ],
        );

        let (orchestrator, store, run) = setup(&["a"], sandbox, EngineConfig::default()).await;
        let finished = orchestrator.execute_run(&run.id).await.unwrap();

        assert_eq!(finished.state, RunState::Completed);
        let results = store.results(&run.id).await.unwrap();
        assert_eq!(results[0].state, ResultState::Blocked);
        assert!(results[0]
            .outcome
            .as_ref()
            .and_then(|o| o.failure_reason.as_deref())
            .unwrap()
            .contains("launch failure"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_cancels_in_flight_and_skips_pending() {
        let sandbox = FakeSandbox::new(Duration::from_secs(10));
        let config = EngineConfig {
            max_concurrency: 2,
            ..Default::default()
        };
        let (orchestrator, store, run) =
            setup(&["a", "b", "c", "d", "e"], sandbox, config).await;

        let handle = {
            let orchestrator = orchestrator.clone();
            let run_id = run.id.clone();
            tokio::spawn(async move { orchestrator.execute_run(&run_id).await })
        };

        // let the first two units get in flight
        tokio::time::sleep(Duration::from_millis(100)).await;
        orchestrator.abort(&run.id).await.unwrap();

        let finished = handle.await.unwrap().unwrap();
        assert_eq!(finished.state, RunState::Aborted);

        let results = store.results(&run.id).await.unwrap();
        // in-flight executions were force-terminated within the grace
        // period; everything not yet started cascaded to SKIPPED
        assert_eq!(
            states(&results),
            vec![
                ResultState::Blocked,
                ResultState::Blocked,
                ResultState::Skipped,
                ResultState::Skipped,
                ResultState::Skipped
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_halts_dispatch_and_resume_continues() {
        let sandbox = FakeSandbox::new(Duration::from_millis(150));
        let config = EngineConfig {
            max_concurrency: 1,
            ..Default::default()
        };
        let (orchestrator, store, run) = setup(&["a", "b", "c"], sandbox, config).await;

        let handle = {
            let orchestrator = orchestrator.clone();
            let run_id = run.id.clone();
            tokio::spawn(async move { orchestrator.execute_run(&run_id).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        orchestrator.pause(&run.id).await.unwrap();

        // first case runs to completion, nothing further dispatches
        tokio::time::sleep(Duration::from_millis(300)).await;
        let results = store.results(&run.id).await.unwrap();
        assert_eq!(results[0].state, ResultState::Pass);
        assert_eq!(results[1].state, ResultState::Pending);
        assert_eq!(results[2].state, ResultState::Pending);
        assert_eq!(store.run(&run.id).await.unwrap().state, RunState::Paused);

        orchestrator.resume(&run.id).await.unwrap();
        let finished = handle.await.unwrap().unwrap();
        assert_eq!(finished.state, RunState::Completed);
        assert_eq!(
            states(&store.results(&run.id).await.unwrap()),
            vec![ResultState::Pass; 3]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_after_last_dispatch_still_completes_the_run() {
        let sandbox = FakeSandbox::new(Duration::from_millis(200));
        sandbox.script_case("a", vec![Scripted::Outcome(Box::new(pass_outcome()))]);
        let (orchestrator, store, run) =
            setup(&["a"], sandbox, EngineConfig::default()).await;

        let handle = {
            let orchestrator = orchestrator.clone();
            let run_id = run.id.clone();
            tokio::spawn(async move { orchestrator.execute_run(&run_id).await })
        };

        // pause lands after the sole case was dispatched; the in-flight
        // execution runs to completion and nothing is left to do
        tokio::time::sleep(Duration::from_millis(100)).await;
        orchestrator.pause(&run.id).await.unwrap();

        let finished = handle.await.unwrap().unwrap();
        assert_eq!(finished.state, RunState::Completed);
        assert_eq!(store.run(&run.id).await.unwrap().state, RunState::Completed);
        assert_eq!(
            states(&store.results(&run.id).await.unwrap()),
            vec![ResultState::Pass]
        );
    }

    #[tokio::test]
    async fn test_resume_with_all_results_terminal_completes() {
        // results arrive through ingestion while the run sits paused
        let (orchestrator, store, run) = setup(
            &["a", "b"],
            FakeSandbox::new(Duration::ZERO),
            EngineConfig::default(),
        )
        .await;

        store
            .reconcile_result(&run.id, "a", ResultState::Pass, None)
            .await
            .unwrap();
        orchestrator.pause(&run.id).await.unwrap();
        store
            .reconcile_result(&run.id, "b", ResultState::Fail, None)
            .await
            .unwrap();

        let resumed = orchestrator.resume(&run.id).await.unwrap();
        assert_eq!(resumed.state, RunState::Completed);
        assert_eq!(store.run(&run.id).await.unwrap().state, RunState::Completed);
    }

    #[tokio::test]
    async fn test_invalid_definition_rejected_before_any_state_change() {
        let store = Arc::new(MemoryStore::new());
        store.insert_case(sample_case("a", 0)).await.unwrap();
        let run = store
            .create_run("bad run", "tester", &["a".to_string()])
            .await
            .unwrap();
        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            Arc::new(FakeSandbox::new(Duration::ZERO)),
            EngineConfig::default(),
        ));

        let err = orchestrator.execute_run(&run.id).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration(_)));
        assert_eq!(store.run(&run.id).await.unwrap().state, RunState::Pending);
    }

    #[tokio::test]
    async fn test_orchestrator_fault_fails_the_run() {
        let sandbox = FakeSandbox::new(Duration::ZERO);
        sandbox.script_case("a", vec![Scripted::Fault("bookkeeping lost".to_string())]);
        sandbox.script_case("b", vec![Scripted::Outcome(Box::new(pass_outcome()))]);

        let config = EngineConfig {
            max_concurrency: 1,
            ..Default::default()
        };
        let (orchestrator, store, run) = setup(&["a", "b"], sandbox, config).await;
        let finished = orchestrator.execute_run(&run.id).await.unwrap();

        assert_eq!(finished.state, RunState::Failed);
        assert!(finished.fault.as_deref().unwrap().contains("bookkeeping lost"));
    }

    #[tokio::test]
    async fn test_pause_requires_in_progress() {
        let (orchestrator, _store, run) = setup(
            &["a"],
            FakeSandbox::new(Duration::ZERO),
            EngineConfig::default(),
        )
        .await;
        assert!(matches!(
            orchestrator.pause(&run.id).await.unwrap_err(),
            EngineError::InvalidTransition { .. }
        ));
    }
}
