//! Iosans CLI — run, validate, and schedule node-graph workflows.
//!
//! Exit codes: 0 success, 1 validation failure, 2 runtime failure,
//! 130 cancelled by the user.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use iosans::artifact::ArtifactStore;
use iosans::config::Config;
use iosans::cron;
use iosans::graph::GraphModel;
use iosans::runtime::engine::ExecutionEngine;
use iosans::runtime::registry::ExecutorRegistry;
use iosans::runtime::scheduler::Scheduler;
use iosans::services::{HttpLlmService, Services};
use iosans::workflow::storage::WorkflowStorage;
use iosans::workflow::store::{export_json, import_json, WorkflowStore};
use iosans::workflow::types::{NodeType, Workflow};

const EXIT_VALIDATION: u8 = 1;
const EXIT_RUNTIME: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

/// Iosans workflow engine CLI
#[derive(Parser)]
#[command(name = "iosans", version, about = "Iosans workflow execution engine")]
struct Cli {
    /// Directory for the sqlite database
    #[arg(long, env = "IOSANS_DATA_DIR", default_value = "data")]
    data_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file once and print the terminal outputs
    Run {
        /// Path to the workflow JSON document
        file: PathBuf,
    },
    /// Validate a workflow file (structure, cycles, cron expressions)
    Validate {
        /// Path to the workflow JSON document
        file: PathBuf,
    },
    /// Print the persisted workflow document
    Export {
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a workflow file and persist it as the active document
    Import {
        /// Path to the workflow JSON document
        file: PathBuf,
    },
    /// Run the schedule-trigger loop for a workflow file
    Schedule {
        /// Path to the workflow JSON document
        file: PathBuf,
    },
    /// Start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3020)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_RUNTIME)
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Run { file } => run_command(&file).await,
        Commands::Validate { file } => validate_command(&file),
        Commands::Export { output } => export_command(&cli.data_dir, output).await,
        Commands::Import { file } => import_command(&cli.data_dir, &file).await,
        Commands::Schedule { file } => schedule_command(&file).await,
        Commands::Serve { host, port } => {
            let mut config = Config::default();
            config.server.host = host;
            config.server.port = port;
            config.storage.data_dir = cli.data_dir;
            iosans::server::start_server(config).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_file(file: &PathBuf) -> anyhow::Result<Workflow> {
    let document = std::fs::read_to_string(file)?;
    import_json(&document).map_err(|e| anyhow::anyhow!("{e}"))
}

async fn run_command(file: &PathBuf) -> anyhow::Result<ExitCode> {
    let workflow = match load_file(file) {
        Ok(workflow) => workflow,
        Err(err) => {
            eprintln!("validation failed: {err}");
            return Ok(ExitCode::from(EXIT_VALIDATION));
        }
    };

    let engine = build_engine().await?;
    let run = engine.run_to_outputs(Arc::new(workflow));
    tokio::pin!(run);

    let result = tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            engine.abort();
            // Let the teardown finish so node states settle.
            let _ = run.await;
            eprintln!("interrupted");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };

    match result {
        Ok(outputs) => {
            println!("{}", serde_json::to_string_pretty(&outputs)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("run failed: {err}");
            Ok(ExitCode::from(EXIT_RUNTIME))
        }
    }
}

fn validate_command(file: &PathBuf) -> anyhow::Result<ExitCode> {
    let outcome = load_file(file).and_then(|workflow| {
        GraphModel::build(&workflow).map_err(|e| anyhow::anyhow!("{e}"))?;
        for node in &workflow.nodes {
            if node.node_type == NodeType::ScheduleTrigger {
                if let Some(expr) = node.data_str("cronExpression") {
                    cron::validate(expr)
                        .map_err(|e| anyhow::anyhow!("node {}: {e}", node.id))?;
                }
            }
        }
        Ok(workflow)
    });

    match outcome {
        Ok(workflow) => {
            println!(
                "valid: {} nodes, {} edges",
                workflow.nodes.len(),
                workflow.edges.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("validation failed: {err}");
            Ok(ExitCode::from(EXIT_VALIDATION))
        }
    }
}

async fn export_command(data_dir: &str, output: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    let storage = open_storage(data_dir).await?;
    match storage.load().await.map_err(|e| anyhow::anyhow!("{e}"))? {
        Some(workflow) => {
            let document = export_json(&workflow).map_err(|e| anyhow::anyhow!("{e}"))?;
            match output {
                Some(path) => std::fs::write(path, document)?,
                None => println!("{document}"),
            }
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("no workflow document stored");
            Ok(ExitCode::from(EXIT_VALIDATION))
        }
    }
}

async fn import_command(data_dir: &str, file: &PathBuf) -> anyhow::Result<ExitCode> {
    let workflow = match load_file(file) {
        Ok(workflow) => workflow,
        Err(err) => {
            eprintln!("validation failed: {err}");
            return Ok(ExitCode::from(EXIT_VALIDATION));
        }
    };
    let storage = open_storage(data_dir).await?;
    storage
        .save(&workflow)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("imported {} nodes, {} edges", workflow.nodes.len(), workflow.edges.len());
    Ok(ExitCode::SUCCESS)
}

async fn schedule_command(file: &PathBuf) -> anyhow::Result<ExitCode> {
    let workflow = match load_file(file) {
        Ok(workflow) => workflow,
        Err(err) => {
            eprintln!("validation failed: {err}");
            return Ok(ExitCode::from(EXIT_VALIDATION));
        }
    };

    let engine = build_engine().await?;
    let store = Arc::new(WorkflowStore::with_workflow(workflow).map_err(|e| anyhow::anyhow!("{e}"))?);
    let scheduler = Arc::new(Scheduler::new(Arc::clone(&engine), store));

    let cancel = CancellationToken::new();
    let loop_handle = tokio::spawn(Arc::clone(&scheduler).run(cancel.clone()));

    tokio::signal::ctrl_c().await?;
    cancel.cancel();
    engine.abort();
    let _ = loop_handle.await;
    eprintln!("interrupted");
    Ok(ExitCode::from(EXIT_INTERRUPTED))
}

async fn build_engine() -> anyhow::Result<Arc<ExecutionEngine>> {
    let config = Config::default();
    let artifacts = Arc::new(
        ArtifactStore::in_memory()
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?,
    );
    let mut services = Services::with_artifacts(artifacts);
    if let Some(base_url) = &config.llm.base_url {
        services.llm = Some(Arc::new(HttpLlmService::new(
            base_url.clone(),
            config.llm.api_key.clone(),
            config.llm.model.clone(),
        )));
    }
    Ok(ExecutionEngine::new(
        Arc::new(ExecutorRegistry::with_builtins()),
        Arc::new(services),
    ))
}

async fn open_storage(data_dir: &str) -> anyhow::Result<WorkflowStorage> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = std::path::Path::new(data_dir).join("iosans.db");
    let pool = sqlx::sqlite::SqlitePool::connect_with(
        sqlx::sqlite::SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true),
    )
    .await?;
    WorkflowStorage::new(pool)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))
}
