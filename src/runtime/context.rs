/// Execution context handed to every executor
///
/// Carries the gathered inputs, node configuration, the injected service
/// bundle, a snapshot of the workflow (the agent needs it for tool
/// discovery), the run's cancellation token, and log/progress hooks into
/// the shared execution state. Node data is a snapshot: executors read it,
/// never write it.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::runtime::engine::ExecutionEngine;
use crate::runtime::state::{ExecutionState, LogLevel};
use crate::services::Services;
use crate::workflow::types::{NodeType, Workflow};

/// Context for one executor invocation.
#[derive(Clone)]
pub struct ExecutionContext {
    pub node_id: String,
    pub node_type: NodeType,
    /// Gathered upstream data: the single unwrapped value, or a mapping
    /// keyed by source node id when several upstreams contributed.
    pub inputs: Value,
    /// The node's configuration object.
    pub node_data: Value,
    pub services: Arc<Services>,
    /// Snapshot of the workflow for the duration of the run.
    pub workflow: Arc<Workflow>,
    pub cancel: CancellationToken,
    pub state: Arc<ExecutionState>,
    /// Engine handle for re-entrant tool calls (set during runs, absent in
    /// bare unit-test contexts).
    pub engine: Option<Arc<ExecutionEngine>>,
}

impl ExecutionContext {
    /// Append a log line attributed to this node.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.state.add_log(Some(&self.node_id), level, message, None);
    }

    /// Append a log line with structured payload.
    pub fn log_data(&self, level: LogLevel, message: impl Into<String>, data: Value) {
        self.state
            .add_log(Some(&self.node_id), level, message, Some(data));
    }

    /// Report coarse progress for long-running executors.
    pub fn set_progress(&self, status: &str, pct: u8) {
        self.state.add_log(
            Some(&self.node_id),
            LogLevel::Info,
            status,
            Some(json!({ "progress": pct.min(100) })),
        );
    }

    /// Read a string config value.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.node_data.get(key).and_then(|v| v.as_str())
    }

    /// Read a numeric config value.
    pub fn data_f64(&self, key: &str) -> Option<f64> {
        self.node_data.get(key).and_then(|v| v.as_f64())
    }

    /// Read an integer config value.
    pub fn data_u64(&self, key: &str) -> Option<u64> {
        self.node_data.get(key).and_then(|v| v.as_u64())
    }

    /// Read a boolean config value.
    pub fn data_bool(&self, key: &str) -> Option<bool> {
        self.node_data.get(key).and_then(|v| v.as_bool())
    }
}

/// Result of a successful executor invocation.
#[derive(Debug, Clone)]
pub struct ExecutorOutput {
    /// The node's output value, written to state and onto edge snapshots.
    pub output: Value,
    /// When present, only outgoing edges whose source handle is listed
    /// stay active; everything else is routed out for the rest of the run.
    pub active_handles: Option<Vec<String>>,
}

impl ExecutorOutput {
    /// Plain output with all outgoing edges active.
    pub fn value(output: Value) -> Self {
        Self {
            output,
            active_handles: None,
        }
    }

    /// Output with selective edge routing.
    pub fn routed(output: Value, active_handles: Vec<String>) -> Self {
        Self {
            output,
            active_handles: Some(active_handles),
        }
    }
}
