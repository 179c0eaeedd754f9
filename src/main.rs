use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use qa_nexus::config::EngineConfig;
use qa_nexus::generator;
use qa_nexus::ingest::{api_key_from_env, IngestConfig, IngestServer};
use qa_nexus::insights::{self, AnalyzerConfig};
use qa_nexus::manifest::RunManifest;
use qa_nexus::model::{ResultState, RunState};
use qa_nexus::orchestrator::{ConsoleEventListener, Orchestrator};
use qa_nexus::report::{self, RunReport};
use qa_nexus::sandbox::ProcessSandbox;
use qa_nexus::store::{MemoryStore, RunStore};

#[derive(Parser)]
#[command(name = "qa-nexus")]
#[command(version = "0.1.0")]
#[command(about = "Test execution orchestration engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the cases declared in a run manifest
    Run {
        /// Path to the run manifest (YAML)
        manifest: PathBuf,

        /// Working directory for scripts and engine artifacts
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Write a JSON run report to this path
        #[arg(long)]
        report: Option<PathBuf>,

        /// Maximum cases in flight at once
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Default per-case timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Generate engine scripts without executing them
    Generate {
        /// Path to the run manifest (YAML)
        manifest: PathBuf,

        /// Only generate for this case id
        #[arg(short, long)]
        case: Option<String>,

        /// Directory to write scripts into (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start the result ingestion gateway
    Serve {
        /// Server port
        #[arg(long, default_value = "9500")]
        port: u16,

        /// Expected x-api-key value (falls back to QA_NEXUS_API_KEY)
        #[arg(long)]
        api_key: Option<String>,

        /// Manifest whose cases are preloaded into the store
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// Score a case history for flakiness
    Analyze {
        /// JSON file holding an array of result states, oldest first
        history: PathBuf,

        /// How many recent samples to consider
        #[arg(long, default_value = "20")]
        lookback: usize,

        /// Minimum samples for a verdict
        #[arg(long, default_value = "3")]
        min_samples: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            manifest,
            output,
            report,
            concurrency,
            timeout_ms,
        } => {
            run_command(manifest, output, report, concurrency, timeout_ms).await?;
        }

        Commands::Generate {
            manifest,
            case,
            output,
        } => {
            generate_command(manifest, case, output)?;
        }

        Commands::Serve {
            port,
            api_key,
            manifest,
        } => {
            let store = Arc::new(MemoryStore::new());
            if let Some(path) = manifest {
                let parsed = RunManifest::from_file(&path)?;
                for test_case in parsed.to_test_cases() {
                    store.insert_case(test_case).await?;
                }
                println!(
                    "  Preloaded {} cases from {}",
                    parsed.cases.len().to_string().cyan(),
                    path.display()
                );
            }
            let server = IngestServer::new(
                store,
                IngestConfig {
                    port,
                    api_key: api_key.unwrap_or_else(api_key_from_env),
                },
            );
            server.start().await?;
        }

        Commands::Analyze {
            history,
            lookback,
            min_samples,
        } => {
            let text = std::fs::read_to_string(&history)?;
            let states: Vec<ResultState> = serde_json::from_str(&text)?;
            let config = AnalyzerConfig {
                lookback,
                min_samples,
                ..Default::default()
            };
            let score = insights::analyze(&states, &config);
            println!("{}", serde_json::to_string_pretty(&score)?);
        }
    }

    Ok(())
}

async fn run_command(
    manifest_path: PathBuf,
    output: PathBuf,
    report_path: Option<PathBuf>,
    concurrency: Option<usize>,
    timeout_ms: Option<u64>,
) -> anyhow::Result<()> {
    let manifest = RunManifest::from_file(&manifest_path)?;

    let mut config = EngineConfig::default();
    if let Some(limit) = concurrency {
        config.max_concurrency = limit;
    }
    if let Some(timeout) = timeout_ms {
        config.default_timeout_ms = timeout;
    }

    println!(
        "{} Running manifest: {}",
        "▶".green().bold(),
        manifest_path.display()
    );
    println!("  Title: {}", manifest.title.cyan());
    println!("  Cases: {}", manifest.cases.len().to_string().cyan());
    println!("  Output: {}", output.display().to_string().cyan());

    std::fs::create_dir_all(&output)?;

    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    for test_case in manifest.to_test_cases() {
        store.insert_case(test_case).await?;
    }
    let run = store
        .create_run(&manifest.title, &manifest.owner, &manifest.case_ids())
        .await?;

    let sandbox = Arc::new(ProcessSandbox::new(
        output.clone(),
        config.output_limit_bytes,
    ));
    let orchestrator = Arc::new(Orchestrator::new(store.clone(), sandbox, config));

    let listener = tokio::spawn(ConsoleEventListener::listen(orchestrator.subscribe()));

    // Ctrl+C aborts the run; in-flight engines get the grace period
    let abort_flag = Arc::new(AtomicBool::new(false));
    {
        let flag = abort_flag.clone();
        ctrlc::set_handler(move || {
            println!("\n{} Aborting run...", "⏹".yellow());
            flag.store(true, Ordering::SeqCst);
        })?;
    }
    {
        let orchestrator = orchestrator.clone();
        let run_id = run.id.clone();
        let flag = abort_flag.clone();
        tokio::spawn(async move {
            while !flag.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            if let Err(e) = orchestrator.abort(&run_id).await {
                log::warn!("abort failed: {}", e);
            }
        });
    }

    let finished = orchestrator.execute_run(&run.id).await?;

    // let the console listener drain the last events
    tokio::time::sleep(Duration::from_millis(50)).await;
    listener.abort();

    let results = store.results(&run.id).await?;
    let run_report = RunReport::new(finished.clone(), results);
    if let Some(path) = report_path {
        report::write(&run_report, Some(&path))?;
    }

    let clean = finished.state == RunState::Completed
        && run_report.summary.failed == 0
        && run_report.summary.blocked == 0;
    if !clean {
        std::process::exit(1);
    }
    Ok(())
}

fn generate_command(
    manifest_path: PathBuf,
    case: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let manifest = RunManifest::from_file(&manifest_path)?;

    for test_case in manifest.to_test_cases() {
        if let Some(ref wanted) = case {
            if &test_case.id != wanted {
                continue;
            }
        }
        let script = generator::generate(&test_case.definition)?;
        match output {
            Some(ref dir) => {
                let case_dir = dir.join(&test_case.id);
                std::fs::create_dir_all(&case_dir)?;
                let path = case_dir.join(generator::script_file_name(script.engine));
                std::fs::write(&path, &script.text)?;
                println!(
                    "{} {} -> {}",
                    "✓".green(),
                    test_case.id.cyan(),
                    path.display()
                );
            }
            None => {
                println!("{} {}", "//".dimmed(), test_case.id.cyan().bold());
                println!("{}", script.text);
            }
        }
    }
    Ok(())
}
