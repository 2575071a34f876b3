/// Artifact store endpoints
///
/// Listings return metadata only; fetching an artifact streams the blob
/// with its stored MIME type.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{delete, get},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::AppState;

/// Create artifact routes
pub fn create_artifact_routes() -> Router<AppState> {
    Router::new()
        .route("/api/artifacts", get(list_artifacts))
        .route("/api/artifacts/stats", get(artifact_stats))
        .route("/api/artifacts/{id}", get(get_artifact))
        .route("/api/artifacts/{id}", delete(delete_artifact))
}

#[derive(Deserialize)]
struct ListQuery {
    category: Option<String>,
}

/// GET /api/artifacts?category=audio — metadata listing
async fn list_artifacts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, StatusCode> {
    match state.artifacts.list(query.category.as_deref()).await {
        Ok(items) => Ok(Json(json!({ "artifacts": items }))),
        Err(err) => {
            tracing::error!("❌ Failed to list artifacts: {}", err);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/artifacts/stats
async fn artifact_stats(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    match state.artifacts.stats().await {
        Ok(stats) => Ok(Json(json!(stats))),
        Err(err) => {
            tracing::error!("❌ Failed to read artifact stats: {}", err);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/artifacts/{id} — the blob with its MIME type
async fn get_artifact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    match state.artifacts.get(&id).await {
        Ok(Some(artifact)) => Ok((
            [(header::CONTENT_TYPE, artifact.metadata.mime_type)],
            artifact.blob,
        )),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(err) => {
            tracing::error!("❌ Failed to fetch artifact {}: {}", id, err);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// DELETE /api/artifacts/{id}
async fn delete_artifact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    match state.artifacts.delete(&id).await {
        Ok(true) => Ok(Json(json!({ "message": "deleted" }))),
        Ok(false) => Err(StatusCode::NOT_FOUND),
        Err(err) => {
            tracing::error!("❌ Failed to delete artifact {}: {}", id, err);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
