/// Per-run execution state
///
/// Thread-safe store for node statuses, outputs, edge snapshots, and the
/// append-only run log. Observers (the HTTP API, a UI) subscribe to a
/// broadcast channel but never drive the engine. Status transitions are
/// monotonic: once a node is success or error it never re-enters running
/// within the same run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

/// Status of a single node within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Running,
    Success,
    Error,
}

/// Everything recorded about one node in the current run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRunRecord {
    pub status: NodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NodeRunRecord {
    fn pending() -> Self {
        Self {
            status: NodeStatus::Pending,
            start_time: None,
            end_time: None,
            output: None,
            error: None,
        }
    }
}

/// Value captured on an edge when its source node succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct EdgeSnapshot {
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

/// Log severity for run log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Action,
    Success,
    Error,
}

/// One append-only run log entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Event published to state observers.
#[derive(Debug, Clone)]
pub enum StateEvent {
    Status { node_id: String, status: NodeStatus },
    Log(LogEntry),
}

/// Serializable snapshot of the whole run for the API surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub running: bool,
    pub paused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_end: Option<DateTime<Utc>>,
    pub nodes: HashMap<String, NodeRunRecord>,
    pub log: Vec<LogEntry>,
}

#[derive(Debug, Default)]
struct StateInner {
    nodes: HashMap<String, NodeRunRecord>,
    edges: HashMap<String, EdgeSnapshot>,
    log: Vec<LogEntry>,
    run_start: Option<DateTime<Utc>>,
    run_end: Option<DateTime<Utc>>,
}

/// Thread-safe mutable run state.
#[derive(Debug)]
pub struct ExecutionState {
    inner: Mutex<StateInner>,
    running: AtomicBool,
    paused: AtomicBool,
    events: broadcast::Sender<StateEvent>,
}

impl ExecutionState {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Mutex::new(StateInner::default()),
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            events,
        }
    }

    /// Subscribe to state change events.
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.events.subscribe()
    }

    /// Reset the state for a new run: every node pending, log cleared.
    pub fn start_run(&self, node_ids: &[String]) {
        let mut inner = self.inner.lock().expect("state lock");
        inner.nodes = node_ids
            .iter()
            .map(|id| (id.clone(), NodeRunRecord::pending()))
            .collect();
        inner.edges.clear();
        inner.log.clear();
        inner.run_start = Some(Utc::now());
        inner.run_end = None;
        self.running.store(true, Ordering::SeqCst);
    }

    /// Mark the run finished.
    pub fn finish_run(&self) {
        let mut inner = self.inner.lock().expect("state lock");
        inner.run_end = Some(Utc::now());
        self.running.store(false, Ordering::SeqCst);
    }

    /// Drop all per-run results.
    pub fn clear_results(&self) {
        let mut inner = self.inner.lock().expect("state lock");
        inner.nodes.clear();
        inner.edges.clear();
        inner.log.clear();
        inner.run_start = None;
        inner.run_end = None;
        self.running.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Transition a node to running. Ignored unless the node is pending.
    pub fn set_running(&self, node_id: &str) {
        let mut inner = self.inner.lock().expect("state lock");
        if let Some(record) = inner.nodes.get_mut(node_id) {
            if record.status == NodeStatus::Pending {
                record.status = NodeStatus::Running;
                record.start_time = Some(Utc::now());
                drop(inner);
                let _ = self.events.send(StateEvent::Status {
                    node_id: node_id.to_string(),
                    status: NodeStatus::Running,
                });
            }
        }
    }

    /// Transition a node to success with its output. Ignored once the node
    /// already reached a terminal status.
    pub fn set_success(&self, node_id: &str, output: Value) {
        let mut inner = self.inner.lock().expect("state lock");
        if let Some(record) = inner.nodes.get_mut(node_id) {
            if record.status == NodeStatus::Running || record.status == NodeStatus::Pending {
                record.status = NodeStatus::Success;
                record.end_time = Some(Utc::now());
                record.output = Some(output);
                drop(inner);
                let _ = self.events.send(StateEvent::Status {
                    node_id: node_id.to_string(),
                    status: NodeStatus::Success,
                });
            }
        }
    }

    /// Transition a node to error. Ignored once the node already reached a
    /// terminal status.
    pub fn set_error(&self, node_id: &str, message: impl Into<String>) {
        let mut inner = self.inner.lock().expect("state lock");
        if let Some(record) = inner.nodes.get_mut(node_id) {
            if record.status == NodeStatus::Running || record.status == NodeStatus::Pending {
                record.status = NodeStatus::Error;
                record.end_time = Some(Utc::now());
                record.error = Some(message.into());
                drop(inner);
                let _ = self.events.send(StateEvent::Status {
                    node_id: node_id.to_string(),
                    status: NodeStatus::Error,
                });
            }
        }
    }

    /// Current record for a node.
    pub fn node_record(&self, node_id: &str) -> Option<NodeRunRecord> {
        self.inner
            .lock()
            .expect("state lock")
            .nodes
            .get(node_id)
            .cloned()
    }

    /// Output of a node if it succeeded.
    pub fn node_output(&self, node_id: &str) -> Option<Value> {
        let inner = self.inner.lock().expect("state lock");
        inner.nodes.get(node_id).and_then(|record| {
            (record.status == NodeStatus::Success)
                .then(|| record.output.clone())
                .flatten()
        })
    }

    /// Capture the value carried by an edge. Written at most once per run;
    /// later writes for the same edge are ignored.
    pub fn set_edge_snapshot(&self, edge_id: &str, data: Value) {
        let mut inner = self.inner.lock().expect("state lock");
        inner
            .edges
            .entry(edge_id.to_string())
            .or_insert_with(|| EdgeSnapshot {
                data,
                timestamp: Utc::now(),
            });
    }

    /// Read an edge snapshot.
    pub fn edge_snapshot(&self, edge_id: &str) -> Option<EdgeSnapshot> {
        self.inner
            .lock()
            .expect("state lock")
            .edges
            .get(edge_id)
            .cloned()
    }

    /// Append to the run log.
    pub fn add_log(
        &self,
        node_id: Option<&str>,
        level: LogLevel,
        message: impl Into<String>,
        data: Option<Value>,
    ) {
        let entry = LogEntry {
            node_id: node_id.map(str::to_string),
            timestamp: Utc::now(),
            level,
            message: message.into(),
            data,
        };
        self.inner
            .lock()
            .expect("state lock")
            .log
            .push(entry.clone());
        let _ = self.events.send(StateEvent::Log(entry));
    }

    /// Run start timestamp.
    pub fn run_start(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().expect("state lock").run_start
    }

    /// Run end timestamp.
    pub fn run_end(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().expect("state lock").run_end
    }

    /// Full serializable snapshot for the API.
    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.inner.lock().expect("state lock");
        StateSnapshot {
            running: self.is_running(),
            paused: self.is_paused(),
            run_start: inner.run_start,
            run_end: inner.run_end,
            nodes: inner.nodes.clone(),
            log: inner.log.clone(),
        }
    }
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_is_monotonic_after_success() {
        let state = ExecutionState::new();
        state.start_run(&["a".to_string()]);
        state.set_running("a");
        state.set_success("a", json!(1));
        state.set_error("a", "late failure");
        let record = state.node_record("a").unwrap();
        assert_eq!(record.status, NodeStatus::Success);
        assert_eq!(record.output, Some(json!(1)));
        assert!(record.error.is_none());
    }

    #[test]
    fn edge_snapshot_is_write_once() {
        let state = ExecutionState::new();
        state.start_run(&[]);
        state.set_edge_snapshot("e1", json!("first"));
        state.set_edge_snapshot("e1", json!("second"));
        assert_eq!(state.edge_snapshot("e1").unwrap().data, json!("first"));
    }

    #[test]
    fn start_run_resets_previous_results() {
        let state = ExecutionState::new();
        state.start_run(&["a".to_string()]);
        state.set_running("a");
        state.set_success("a", json!(1));
        state.add_log(Some("a"), LogLevel::Success, "done", None);
        state.finish_run();

        state.start_run(&["a".to_string()]);
        let record = state.node_record("a").unwrap();
        assert_eq!(record.status, NodeStatus::Pending);
        assert!(state.snapshot().log.is_empty());
    }
}
