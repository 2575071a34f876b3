/// Workflow document and run control endpoints
///
/// The document endpoints validate on write and persist when storage is
/// configured. Run control drives the single engine instance: trigger,
/// state snapshot, abort, pause, resume.

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};

use crate::api::AppState;
use crate::error::EngineError;
use crate::workflow::types::Workflow;

/// Create workflow and run control routes
pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflow", get(get_workflow))
        .route("/api/workflow", put(put_workflow))
        .route("/api/workflow/run", post(run_workflow))
        .route("/api/run/state", get(run_state))
        .route("/api/run/abort", post(abort_run))
        .route("/api/run/pause", post(pause_run))
        .route("/api/run/resume", post(resume_run))
}

/// GET /api/workflow — the current document
async fn get_workflow(State(state): State<AppState>) -> Json<Workflow> {
    Json((*state.store.snapshot()).clone())
}

/// PUT /api/workflow — replace the document (validated, persisted)
async fn put_workflow(
    State(state): State<AppState>,
    Json(workflow): Json<Workflow>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Err(err) = state.store.load_workflow(workflow.clone()) {
        return Err(error_response(StatusCode::BAD_REQUEST, &err));
    }

    if let Some(storage) = &state.storage {
        if let Err(err) = storage.save(&workflow).await {
            tracing::error!("❌ Failed to persist workflow document: {}", err);
            return Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, &err));
        }
    }

    tracing::info!(
        "📥 Workflow document replaced: {} nodes, {} edges",
        workflow.nodes.len(),
        workflow.edges.len()
    );
    Ok(Json(json!({ "message": "workflow updated" })))
}

/// POST /api/workflow/run — execute the current document
async fn run_workflow(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let workflow = state.store.snapshot();
    match state.engine.run(workflow).await {
        Ok(()) => Ok(Json(json!({
            "message": "run completed",
            "state": state.engine.state().snapshot(),
        }))),
        Err(err) => {
            tracing::error!("❌ Run failed: {}", err);
            Err(error_response(StatusCode::UNPROCESSABLE_ENTITY, &err))
        }
    }
}

/// GET /api/run/state — current execution state snapshot
async fn run_state(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.engine.state().snapshot()))
}

/// POST /api/run/abort
async fn abort_run(State(state): State<AppState>) -> Json<Value> {
    state.engine.abort();
    Json(json!({ "message": "abort signalled" }))
}

/// POST /api/run/pause
async fn pause_run(State(state): State<AppState>) -> Json<Value> {
    state.engine.pause();
    Json(json!({ "message": "paused" }))
}

/// POST /api/run/resume
async fn resume_run(State(state): State<AppState>) -> Json<Value> {
    state.engine.resume();
    Json(json!({ "message": "resumed" }))
}

fn error_response(status: StatusCode, err: &EngineError) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({
            "error": err.kind(),
            "message": err.to_string(),
        })),
    )
}
