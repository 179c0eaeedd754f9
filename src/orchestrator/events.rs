use tokio::sync::broadcast;

use crate::model::{ResultState, RunState};

use super::state::RunSummary;

/// Run execution events for real-time console output
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        title: String,
        case_count: usize,
    },
    RunFinished {
        run_id: String,
        state: RunState,
        summary: RunSummary,
        duration_ms: u64,
    },
    CaseStarted {
        index: usize,
        case_id: String,
        title: String,
    },
    CaseFinished {
        index: usize,
        case_id: String,
        state: ResultState,
        duration_ms: u64,
        reason: Option<String>,
    },
    CaseRetrying {
        index: usize,
        case_id: String,
        attempt: u32,
        max_attempts: u32,
    },
    Log {
        message: String,
    },
}

/// Event emitter for broadcasting run events
pub struct EventEmitter {
    sender: broadcast::Sender<RunEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<RunEvent>) {
        let (sender, receiver) = broadcast::channel(256);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration as StdDuration;

/// Console event listener for printing real-time updates.
///
/// Cases complete in arbitrary order, so one spinner per in-flight case is
/// tracked by dispatch index.
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<RunEvent>) {
        use std::io::IsTerminal;

        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            // Piped output: no terminal escape codes
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let mut spinners: HashMap<usize, (ProgressBar, String)> = HashMap::new();

        while let Ok(event) = receiver.recv().await {
            match event {
                RunEvent::RunStarted {
                    run_id,
                    title,
                    case_count,
                } => {
                    multi
                        .println(format!(
                            "\n{} Run started: {} ({} cases) [{}]",
                            "▶".green().bold(),
                            title.white().bold(),
                            case_count,
                            run_id.dimmed()
                        ))
                        .ok();
                }

                RunEvent::RunFinished {
                    state,
                    summary,
                    duration_ms,
                    ..
                } => {
                    for (pb, _) in spinners.drain().map(|(_, v)| v) {
                        pb.finish();
                    }

                    let state_str = match state {
                        RunState::Completed => "COMPLETED".green().bold(),
                        RunState::Aborted => "ABORTED".yellow().bold(),
                        RunState::Failed => "FAILED".red().bold(),
                        _ => format!("{:?}", state).white().bold(),
                    };
                    println!("\n{} Run finished [{}]", "■".blue().bold(), state_str);
                    println!(
                        "  {} passed, {} failed, {} blocked, {} skipped",
                        summary.passed.to_string().green(),
                        summary.failed.to_string().red(),
                        summary.blocked.to_string().yellow(),
                        summary.skipped.to_string().dimmed()
                    );
                    println!("  Duration: {}ms", duration_ms);
                }

                RunEvent::CaseStarted { index, title, .. } => {
                    let pb = multi.add(ProgressBar::new_spinner());
                    let style = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("    {spinner} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner());
                    pb.set_style(style);

                    let text = format!("[{}] {}... ", index, title.dimmed());
                    pb.set_message(text.clone());
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinners.insert(index, (pb, text));
                }

                RunEvent::CaseFinished {
                    index,
                    state,
                    duration_ms,
                    reason,
                    ..
                } => {
                    let (marker, note) = match state {
                        ResultState::Pass => ("✓".green().to_string(), String::new()),
                        ResultState::Fail => (
                            "✗".red().to_string(),
                            reason.map(|r| format!(" — {}", r)).unwrap_or_default(),
                        ),
                        ResultState::Blocked => (
                            "⊘".yellow().to_string(),
                            reason.map(|r| format!(" — {}", r)).unwrap_or_default(),
                        ),
                        ResultState::Skipped => ("○".dimmed().to_string(), String::new()),
                        ResultState::Pending => ("?".to_string(), String::new()),
                    };

                    if let Some((pb, text)) = spinners.remove(&index) {
                        pb.finish_and_clear();
                        multi
                            .println(format!("    {} {}({}ms){}", marker, text, duration_ms, note))
                            .ok();
                    } else {
                        println!("    {} [{}] ({}ms){}", marker, index, duration_ms, note);
                    }
                }

                RunEvent::CaseRetrying {
                    index,
                    attempt,
                    max_attempts,
                    ..
                } => {
                    if let Some((pb, text)) = spinners.get(&index) {
                        pb.set_message(format!(
                            "{} {}",
                            text,
                            format!("↻ retry {}/{}", attempt, max_attempts).yellow()
                        ));
                    }
                }

                RunEvent::Log { message } => {
                    multi.println(format!("      {}", message)).ok();
                }
            }
        }
    }
}
