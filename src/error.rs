use thiserror::Error;

/// Engine error taxonomy.
///
/// Generation-time and ingestion-time errors are returned synchronously to
/// the caller and never partially mutate state. Execution-time failures
/// (timeouts, launch failures after the retry budget, unparsable reports)
/// are captured into the result outcome and reconciled through the state
/// machine instead of being raised.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Caller error at generation or manifest-parse time. Never retried.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Engine binary missing or the process could not be spawned.
    /// Retried up to the configured budget, then recorded as BLOCKED.
    #[error("failed to launch execution engine: {0}")]
    LaunchFailure(String),

    /// The engine exited successfully but its structured report could not
    /// be parsed. Not retried; recorded as BLOCKED, never treated as PASS.
    #[error("engine report could not be parsed: {0}")]
    ReportParseError(String),

    /// A blocking wait exceeded its bound. Sandbox timeouts are *not*
    /// reported through this variant (they are normal outcomes); this is
    /// for orchestrator-level waits.
    #[error("operation exceeded {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Ingestion referenced a run or test case that does not exist.
    #[error("unknown reference: {0}")]
    UnknownReference(String),

    /// Ingestion credential rejected. Checked before any state is touched.
    #[error("unauthorized")]
    Unauthorized,

    /// Illegal lifecycle transition for a run, result, or defect.
    #[error("invalid {entity} transition from {from} on {event}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        event: String,
    },

    /// Fault in the orchestrator's own bookkeeping. Fatal to the run.
    #[error("store fault: {0}")]
    Store(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
