use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::model::{ResultState, RunState, TestResult};

/// Commands that drive the run state machine. `Complete` and `Fault` are
/// orchestrator-internal; the rest are caller-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunCommand {
    Start,
    Pause,
    Resume,
    Abort,
    Complete,
    Fault,
}

/// Run state transition table.
///
/// FAILED is reachable only from IN_PROGRESS on an orchestrator-level
/// fault; individual case failures never fail the run.
pub fn next_state(from: RunState, command: RunCommand) -> EngineResult<RunState> {
    use RunCommand::*;
    use RunState::*;

    let to = match (from, command) {
        (Pending, Start) => InProgress,
        (InProgress, Pause) => Paused,
        (Paused, Resume) => InProgress,
        (InProgress, Abort) => Aborted,
        (InProgress, Complete) => Completed,
        (InProgress, Fault) => Failed,
        _ => {
            return Err(EngineError::InvalidTransition {
                entity: "run",
                from: format!("{:?}", from),
                event: format!("{:?}", command),
            })
        }
    };
    Ok(to)
}

/// Aggregate stats for a finished (or in-flight) run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub blocked: u32,
    pub skipped: u32,
    pub pending: u32,
}

pub fn summarize(results: &[TestResult]) -> RunSummary {
    let mut summary = RunSummary {
        total: results.len() as u32,
        passed: 0,
        failed: 0,
        blocked: 0,
        skipped: 0,
        pending: 0,
    };
    for result in results {
        match result.state {
            ResultState::Pass => summary.passed += 1,
            ResultState::Fail => summary.failed += 1,
            ResultState::Blocked => summary.blocked += 1,
            ResultState::Skipped => summary.skipped += 1,
            ResultState::Pending => summary.pending += 1,
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert_eq!(
            next_state(RunState::Pending, RunCommand::Start).unwrap(),
            RunState::InProgress
        );
        assert_eq!(
            next_state(RunState::InProgress, RunCommand::Pause).unwrap(),
            RunState::Paused
        );
        assert_eq!(
            next_state(RunState::Paused, RunCommand::Resume).unwrap(),
            RunState::InProgress
        );
        assert_eq!(
            next_state(RunState::InProgress, RunCommand::Abort).unwrap(),
            RunState::Aborted
        );
        assert_eq!(
            next_state(RunState::InProgress, RunCommand::Complete).unwrap(),
            RunState::Completed
        );
        assert_eq!(
            next_state(RunState::InProgress, RunCommand::Fault).unwrap(),
            RunState::Failed
        );
    }

    #[test]
    fn test_terminal_states_accept_no_commands() {
        for from in [RunState::Completed, RunState::Failed, RunState::Aborted] {
            for command in [
                RunCommand::Start,
                RunCommand::Pause,
                RunCommand::Resume,
                RunCommand::Abort,
                RunCommand::Complete,
                RunCommand::Fault,
            ] {
                assert!(next_state(from, command).is_err());
            }
        }
    }

    #[test]
    fn test_paused_run_cannot_complete_or_fault() {
        assert!(next_state(RunState::Paused, RunCommand::Complete).is_err());
        assert!(next_state(RunState::Paused, RunCommand::Fault).is_err());
        assert!(next_state(RunState::Paused, RunCommand::Abort).is_err());
    }
}
