//! Entity vocabulary shared by the orchestrator, store, ingestion
//! endpoint, and reports. Wire forms match the platform's conventions
//! (SCREAMING_SNAKE_CASE states, camelCase payload keys).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    Active,
    Draft,
    Deprecated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Pending,
    InProgress,
    Paused,
    Completed,
    Failed,
    Aborted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed | RunState::Aborted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultState {
    Pending,
    Pass,
    Fail,
    Blocked,
    Skipped,
}

impl ResultState {
    /// Pending is the only state from which any other state is reachable.
    /// Terminal states never transition further; a re-run creates a new
    /// result instead of mutating the old one.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResultState::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefectStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

/// Target engine family for a generated script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    BrowserFlow,
    LoadTest,
}

/// Structured test definition, tagged by target engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "engine")]
pub enum CaseDefinition {
    #[serde(rename = "browser")]
    BrowserFlow(BrowserFlowConfig),
    #[serde(rename = "load")]
    LoadTest(LoadTestConfig),
}

impl CaseDefinition {
    pub fn engine_kind(&self) -> EngineKind {
        match self {
            CaseDefinition::BrowserFlow(_) => EngineKind::BrowserFlow,
            CaseDefinition::LoadTest(_) => EngineKind::LoadTest,
        }
    }
}

/// Configuration for a browser-flow (Playwright-style) script
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserFlowConfig {
    pub name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Values substituted into `{{variable}}` placeholders
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    pub steps: Vec<FlowStep>,
}

/// One named step in a browser flow, with its assertions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowStep {
    pub name: String,
    #[serde(flatten)]
    pub action: StepAction,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    Goto {
        url: String,
    },
    Click {
        selector: String,
    },
    Fill {
        selector: String,
        value: String,
    },
    Request {
        method: String,
        url: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        #[serde(default)]
        body: Option<serde_json::Value>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assertion {
    #[serde(rename = "type")]
    pub kind: AssertionKind,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default)]
    pub expected: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssertionKind {
    StatusCode,
    ResponseTime,
    JsonPath,
    HeaderValue,
    Visible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    #[default]
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    MatchesRegex,
    Exists,
    NotExists,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
    #[serde(rename_all = "camelCase")]
    ApiKey {
        key_name: String,
        key_value: String,
        #[serde(default)]
        in_query: bool,
    },
}

/// Configuration for a load-test (k6-style) script
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestConfig {
    pub target_url: String,
    pub virtual_users: u32,
    pub duration: String,
    /// metric name -> ordered threshold expressions; defaults applied by
    /// the generator when absent
    #[serde(default)]
    pub thresholds: Option<BTreeMap<String, Vec<String>>>,
}

/// A test case as the execution core sees it: referenced, never mutated,
/// except for its definition payload which the generator reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    pub title: String,
    pub priority: Priority,
    pub status: CaseStatus,
    pub definition: CaseDefinition,
    /// Per-case wall-clock timeout override (ms)
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// One execution campaign over an ordered set of test cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRun {
    pub id: String,
    pub title: String,
    pub state: RunState,
    /// Declared dispatch order
    pub case_ids: Vec<String>,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    /// Recorded when an orchestrator-level fault transitions the run to FAILED
    #[serde(default)]
    pub fault: Option<String>,
}

/// The outcome record for one test case within one run.
/// Exactly one per (run, case) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    pub run_id: String,
    pub case_id: String,
    pub state: ResultState,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub outcome: Option<OutcomePayload>,
}

/// Structured outcome captured from one sandbox execution (or an
/// externally ingested report).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomePayload {
    pub assertions_passed: u32,
    pub assertions_failed: u32,
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Bounded-size captured engine output
    #[serde(default)]
    pub logs: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub timed_out: bool,
}

/// A defect links back to the result that triggered it, but its lifecycle
/// is independent of run/result lifecycle. It may also exist without a
/// triggering result (manually filed).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defect {
    pub id: String,
    pub title: String,
    pub priority: Priority,
    pub status: DefectStatus,
    #[serde(default)]
    pub triggering_result_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
