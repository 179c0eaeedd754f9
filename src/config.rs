/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of sandbox executions in flight at once
    pub max_concurrency: usize,

    /// Default wall-clock timeout per execution (ms), overridable per case
    pub default_timeout_ms: u64,

    /// Grace period between a cancellation signal and forced termination (ms)
    pub grace_period_ms: u64,

    /// Retry budget for launch failures. Semantic failures are never retried.
    pub launch_retry_limit: u32,

    /// Upper bound on captured stdout/stderr per execution (bytes)
    pub output_limit_bytes: usize,

    /// How many historical results the flakiness analyzer looks back over
    pub lookback_runs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            default_timeout_ms: 60_000,
            grace_period_ms: 5_000,
            launch_retry_limit: 2,
            output_limit_bytes: 64 * 1024,
            lookback_runs: 20,
        }
    }
}
