//! Subprocess-backed sandbox.
//!
//! Each execution gets its own scratch directory under the work dir; the
//! script is written there, the engine binary is resolved (explicit
//! override first, then system PATH), and the child runs with a hard
//! wall-clock timeout and bounded output capture.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::watch;

use crate::error::{EngineError, EngineResult};
use crate::generator::{script_file_name, GeneratedScript};
use crate::model::EngineKind;

use super::{EngineReport, ExecutionBudget, ExecutionOutcome, Sandbox};

const REPORT_FILE: &str = "report.json";

pub struct ProcessSandbox {
    work_dir: PathBuf,
    output_limit: usize,
    binary_overrides: HashMap<EngineKind, PathBuf>,
}

impl ProcessSandbox {
    pub fn new(work_dir: PathBuf, output_limit: usize) -> Self {
        Self {
            work_dir,
            output_limit,
            binary_overrides: HashMap::new(),
        }
    }

    /// Pin the binary for an engine instead of resolving it from PATH
    pub fn with_engine_binary(mut self, engine: EngineKind, path: PathBuf) -> Self {
        self.binary_overrides.insert(engine, path);
        self
    }

    fn resolve_binary(&self, engine: EngineKind) -> EngineResult<PathBuf> {
        if let Some(path) = self.binary_overrides.get(&engine) {
            return Ok(path.clone());
        }
        let name = match engine {
            EngineKind::LoadTest => "k6",
            EngineKind::BrowserFlow => "npx",
        };
        which::which(name).map_err(|e| {
            EngineError::LaunchFailure(format!("engine binary '{}' not found: {}", name, e))
        })
    }

    fn build_command(&self, engine: EngineKind, scratch: &Path) -> EngineResult<Command> {
        let binary = self.resolve_binary(engine)?;
        let mut cmd = Command::new(binary);
        match engine {
            EngineKind::LoadTest => {
                cmd.args(["run", "--summary-export", REPORT_FILE, script_file_name(engine)]);
            }
            EngineKind::BrowserFlow => {
                cmd.args(["playwright", "test", script_file_name(engine), "--reporter=json"])
                    .env("PLAYWRIGHT_JSON_OUTPUT_NAME", REPORT_FILE);
            }
        }
        cmd.current_dir(scratch)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(cmd)
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn execute(
        &self,
        script: &GeneratedScript,
        budget: &ExecutionBudget,
        cancel: watch::Receiver<bool>,
    ) -> EngineResult<ExecutionOutcome> {
        let scratch = self.work_dir.join(crate::model::new_id());
        tokio::fs::create_dir_all(&scratch)
            .await
            .map_err(|e| EngineError::LaunchFailure(format!("scratch dir: {}", e)))?;

        // Clean the scratch dir up whichever way the execution ends;
        // launch and report errors must not strand it.
        let outcome = self.run_in_scratch(script, budget, cancel, &scratch).await;
        if let Err(e) = tokio::fs::remove_dir_all(&scratch).await {
            warn!("failed to clean scratch dir {}: {}", scratch.display(), e);
        }
        outcome
    }
}

impl ProcessSandbox {
    async fn run_in_scratch(
        &self,
        script: &GeneratedScript,
        budget: &ExecutionBudget,
        cancel: watch::Receiver<bool>,
        scratch: &Path,
    ) -> EngineResult<ExecutionOutcome> {
        tokio::fs::write(scratch.join(script_file_name(script.engine)), &script.text)
            .await
            .map_err(|e| EngineError::LaunchFailure(format!("script write: {}", e)))?;

        let mut cmd = self.build_command(script.engine, scratch)?;
        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::LaunchFailure(e.to_string()))?;

        let limit = self.output_limit;
        let stdout_task = child
            .stdout
            .take()
            .map(|r| tokio::spawn(read_capped(r, limit)));
        let stderr_task = child
            .stderr
            .take()
            .map(|r| tokio::spawn(read_capped(r, limit)));

        let started = Instant::now();
        let mut cancel = cancel;
        let mut cancel_open = true;
        let mut timed_out = false;
        let mut cancelled = false;

        let deadline = tokio::time::sleep(budget.timeout);
        tokio::pin!(deadline);

        let exit_code = loop {
            tokio::select! {
                status = child.wait() => {
                    let status = status
                        .map_err(|e| EngineError::LaunchFailure(e.to_string()))?;
                    break status.code();
                }
                _ = &mut deadline => {
                    timed_out = true;
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    break None;
                }
                changed = cancel.changed(), if cancel_open => {
                    match changed {
                        Ok(()) if *cancel.borrow() => {
                            cancelled = true;
                            // Grace period for the engine to wind down, then kill
                            match tokio::time::timeout(budget.grace_period, child.wait()).await {
                                Ok(Ok(status)) => break status.code(),
                                _ => {
                                    let _ = child.start_kill();
                                    let _ = child.wait().await;
                                    break None;
                                }
                            }
                        }
                        Ok(()) => {}
                        Err(_) => cancel_open = false,
                    }
                }
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let mut captured = String::new();
        if let Some(task) = stdout_task {
            captured.push_str(&task.await.unwrap_or_default());
        }
        if let Some(task) = stderr_task {
            captured.push_str(&task.await.unwrap_or_default());
        }
        if captured.len() > self.output_limit {
            let mut cut = self.output_limit;
            while !captured.is_char_boundary(cut) {
                cut -= 1;
            }
            captured.truncate(cut);
        }

        let report = if timed_out || (cancelled && exit_code.is_none()) {
            None
        } else {
            read_report(script.engine, scratch, exit_code).await?
        };

        debug!(
            "sandbox execution finished: exit={:?} timed_out={} cancelled={} in {}ms",
            exit_code, timed_out, cancelled, duration_ms
        );

        Ok(ExecutionOutcome {
            exit_code,
            report,
            captured_output: captured,
            duration_ms,
            timed_out,
            cancelled,
        })
    }
}

/// Read the engine's JSON report if one was produced. An unparsable report
/// alongside a successful exit is a contract mismatch worth surfacing
/// distinctly; alongside a failing exit it is ignored (the failure is
/// already known).
async fn read_report(
    engine: EngineKind,
    scratch: &Path,
    exit_code: Option<i32>,
) -> EngineResult<Option<EngineReport>> {
    let raw = match tokio::fs::read_to_string(scratch.join(REPORT_FILE)).await {
        Ok(raw) => raw,
        Err(_) => return Ok(None),
    };
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(value) => Ok(Some(match engine {
            EngineKind::BrowserFlow => summarize_playwright(&value),
            EngineKind::LoadTest => summarize_k6(&value),
        })),
        Err(e) if exit_code == Some(0) => Err(EngineError::ReportParseError(e.to_string())),
        Err(_) => Ok(None),
    }
}

/// Walk a Playwright JSON report (suites > specs > tests > results)
fn summarize_playwright(value: &serde_json::Value) -> EngineReport {
    fn walk(suite: &serde_json::Value, report: &mut EngineReport) {
        if let Some(specs) = suite.get("specs").and_then(|v| v.as_array()) {
            for spec in specs {
                let tests = spec
                    .get("tests")
                    .and_then(|v| v.as_array())
                    .map(|v| v.as_slice())
                    .unwrap_or_default();
                for test in tests {
                    let Some(result) = test.pointer("/results/0") else {
                        continue;
                    };
                    match result.get("status").and_then(|v| v.as_str()) {
                        Some("passed") => report.assertions_passed += 1,
                        Some("failed") | Some("timedOut") => {
                            report.assertions_failed += 1;
                            let reason = result
                                .pointer("/errors/0/message")
                                .and_then(|v| v.as_str())
                                .map(|s| s.to_string())
                                .unwrap_or_else(|| {
                                    format!(
                                        "{} failed",
                                        spec.get("title")
                                            .and_then(|v| v.as_str())
                                            .unwrap_or("test")
                                    )
                                });
                            report.failures.push(reason);
                        }
                        _ => {}
                    }
                }
            }
        }
        if let Some(children) = suite.get("suites").and_then(|v| v.as_array()) {
            for child in children {
                walk(child, report);
            }
        }
    }

    let mut report = EngineReport::default();
    if let Some(suites) = value.get("suites").and_then(|v| v.as_array()) {
        for suite in suites {
            walk(suite, &mut report);
        }
    }
    report
}

/// Summarize a k6 --summary-export report: check counts plus crossed
/// thresholds (k6 marks a crossed threshold with `true`).
fn summarize_k6(value: &serde_json::Value) -> EngineReport {
    let mut report = EngineReport::default();
    let Some(metrics) = value.get("metrics").and_then(|v| v.as_object()) else {
        return report;
    };
    if let Some(checks) = metrics.get("checks") {
        report.assertions_passed +=
            checks.get("passes").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        let fails = checks.get("fails").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        report.assertions_failed += fails;
        if fails > 0 {
            report.failures.push(format!("{} check(s) failed", fails));
        }
    }
    for (name, metric) in metrics {
        let Some(thresholds) = metric.get("thresholds").and_then(|v| v.as_object()) else {
            continue;
        };
        for (expr, crossed) in thresholds {
            if crossed.as_bool().unwrap_or(false) {
                report.assertions_failed += 1;
                report
                    .failures
                    .push(format!("threshold crossed: {} {}", name, expr));
            } else {
                report.assertions_passed += 1;
            }
        }
    }
    report
}

async fn read_capped<R: tokio::io::AsyncRead + Unpin>(mut reader: R, limit: usize) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                // Keep draining past the limit so the child never blocks on
                // a full pipe
                if buf.len() < limit {
                    let take = (limit - buf.len()).min(n);
                    buf.extend_from_slice(&chunk[..take]);
                }
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
