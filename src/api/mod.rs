/// HTTP API Layer
///
/// REST endpoints for the workflow document, run control, and the
/// artifact store. Everything operates on the shared application state.

// Workflow document and run control endpoints
pub mod workflows;

// Artifact store endpoints
pub mod artifacts;

use std::sync::Arc;

use crate::artifact::ArtifactStore;
use crate::runtime::engine::ExecutionEngine;
use crate::workflow::storage::WorkflowStorage;
use crate::workflow::store::WorkflowStore;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    /// In-memory workflow store (source of truth)
    pub store: Arc<WorkflowStore>,
    /// Optional sqlite persistence of the workflow document
    pub storage: Option<WorkflowStorage>,
    /// The execution engine
    pub engine: Arc<ExecutionEngine>,
    /// Artifact store
    pub artifacts: Arc<ArtifactStore>,
}

// Re-export router builders
pub use artifacts::create_artifact_routes;
pub use workflows::create_workflow_routes;
