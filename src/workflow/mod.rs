/// Workflow Management Layer
///
/// This module handles the workflow document and its persistence:
/// - Type definitions (Workflow, Node, NodeType, Edge, handles)
/// - In-memory store with lock-free snapshots and structural invariants
/// - Sqlite persistence of the canonical JSON document

// Core workflow type definitions
pub mod types;

// In-memory store with ArcSwap snapshots
pub mod store;

// Sqlite persistence of the canonical document
pub mod storage;

// Re-export commonly used types
pub use store::{export_json, import_json, WorkflowStore};
pub use storage::{WorkflowStorage, WORKFLOW_DOCUMENT_KEY};
pub use types::{is_resource_handle, Edge, Node, NodeType, Workflow};
