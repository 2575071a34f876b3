/// Server setup and initialization
///
/// Wires together storage, the workflow store, the execution engine, the
/// scheduler, and the HTTP routes into a complete application.

use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Router};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::api::{create_artifact_routes, create_workflow_routes, AppState};
use crate::artifact::ArtifactStore;
use crate::config::Config;
use crate::runtime::engine::ExecutionEngine;
use crate::runtime::registry::ExecutorRegistry;
use crate::runtime::scheduler::Scheduler;
use crate::services::{HttpLlmService, Services};
use crate::workflow::storage::WorkflowStorage;
use crate::workflow::store::WorkflowStore;

/// Create the main Axum application with all routes and background services
pub async fn create_app(config: Config) -> Result<Router> {
    tracing::info!("📁 Ensuring data directory exists: {}", config.storage.data_dir);
    std::fs::create_dir_all(&config.storage.data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data directory: {}", e))?;

    let db_path = std::path::Path::new(&config.storage.data_dir).join("iosans.db");
    tracing::info!("🗄️ Opening database: {}", db_path.display());
    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true),
    )
    .await?;

    let artifacts = Arc::new(ArtifactStore::new(pool.clone()).await?);
    let storage = WorkflowStorage::new(pool).await?;

    tracing::info!("📋 Loading persisted workflow document");
    let store = match storage.load().await? {
        Some(workflow) => {
            tracing::info!(
                "📥 Restored workflow: {} nodes, {} edges",
                workflow.nodes.len(),
                workflow.edges.len()
            );
            Arc::new(WorkflowStore::with_workflow(workflow)?)
        }
        None => Arc::new(WorkflowStore::new()),
    };

    let mut services = Services::with_artifacts(Arc::clone(&artifacts));
    if let Some(base_url) = &config.llm.base_url {
        tracing::info!("🧠 LLM backend configured: {}", base_url);
        services.llm = Some(Arc::new(HttpLlmService::new(
            base_url.clone(),
            config.llm.api_key.clone(),
            config.llm.model.clone(),
        )));
    }

    tracing::info!("🚀 Initializing execution engine");
    let engine = ExecutionEngine::new(
        Arc::new(ExecutorRegistry::with_builtins()),
        Arc::new(services),
    );

    tracing::info!("⏰ Starting scheduler");
    let scheduler = Arc::new(Scheduler::new(Arc::clone(&engine), Arc::clone(&store)));
    tokio::spawn(scheduler.run(CancellationToken::new()));

    let app_state = AppState {
        store,
        storage: Some(storage),
        engine,
        artifacts,
    };

    let app = Router::new()
        .route("/healthz", get(health_check))
        .merge(create_workflow_routes())
        .merge(create_artifact_routes())
        .with_state(app_state);

    tracing::info!("✅ Application initialized");
    Ok(app)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
