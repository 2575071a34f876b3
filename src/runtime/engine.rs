/// Workflow execution engine
///
/// Walks the graph level by level: every node whose live dependencies are
/// satisfied runs concurrently with its level. Completions feed the next
/// level through conditional routing (activeHandles metadata), dead-branch
/// propagation, and merge synchronization. A single cancellation token per
/// run tears everything down promptly; node errors fail the run fast.
///
/// The engine is re-entrant: `execute_node` runs a single node imperatively
/// for agent tool calls without touching the run's status map.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, Result};
use crate::graph::GraphModel;
use crate::runtime::context::{ExecutionContext, ExecutorOutput};
use crate::runtime::registry::ExecutorRegistry;
use crate::runtime::state::{ExecutionState, LogLevel};
use crate::services::Services;
use crate::workflow::types::{Node, NodeType, Workflow};

/// Poll interval for the cooperative pause gate.
const PAUSE_BACKOFF: Duration = Duration::from_millis(50);

/// Per-run routing and scheduling bookkeeping.
#[derive(Debug, Default)]
struct RunTracker {
    /// Nodes already handed to a level (at most once per run).
    scheduled: HashSet<String>,
    /// Merge nodes that already fired this run.
    merge_fired: HashSet<String>,
    /// Edges routed out by activeHandles or terminal nodes.
    dead_edges: HashSet<String>,
    /// Nodes all of whose incoming edges died; they stay pending forever.
    dead_nodes: HashSet<String>,
}

/// The workflow execution engine.
pub struct ExecutionEngine {
    registry: Arc<ExecutorRegistry>,
    services: Arc<Services>,
    state: Arc<ExecutionState>,
    current_cancel: Mutex<Option<CancellationToken>>,
    /// Self-handle passed into execution contexts for re-entry.
    weak: Weak<ExecutionEngine>,
}

impl ExecutionEngine {
    pub fn new(registry: Arc<ExecutorRegistry>, services: Arc<Services>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            registry,
            services,
            state: Arc::new(ExecutionState::new()),
            current_cancel: Mutex::new(None),
            weak: weak.clone(),
        })
    }

    /// Shared run state (for the API surface and observers).
    pub fn state(&self) -> Arc<ExecutionState> {
        Arc::clone(&self.state)
    }

    /// Signal cancellation of the current run, if one is in flight.
    pub fn abort(&self) {
        if let Some(cancel) = self.current_cancel.lock().expect("cancel lock").as_ref() {
            tracing::info!("🛑 Aborting current run");
            cancel.cancel();
        }
    }

    /// Pause execution at the next node boundary.
    pub fn pause(&self) {
        self.state.pause();
    }

    /// Resume a paused run.
    pub fn resume(&self) {
        self.state.resume();
    }

    /// Execute a workflow from its entry nodes to quiescence.
    pub async fn run(&self, workflow: Arc<Workflow>) -> Result<()> {
        if self.state.is_running() {
            return Err(EngineError::InvalidInput(
                "a run is already in progress".to_string(),
            ));
        }

        let graph = Arc::new(GraphModel::build(&workflow)?);
        self.state.start_run(&graph.node_ids());

        let cancel = CancellationToken::new();
        *self.current_cancel.lock().expect("cancel lock") = Some(cancel.clone());

        let result = self.run_inner(&graph, &workflow, &cancel).await;

        self.state.finish_run();
        *self.current_cancel.lock().expect("cancel lock") = None;

        match &result {
            Ok(()) => self
                .state
                .add_log(None, LogLevel::Success, "Run completed", None),
            Err(err) => self.state.add_log(
                None,
                LogLevel::Error,
                format!("Run failed: [{}] {}", err.kind(), err),
                None,
            ),
        }
        result
    }

    async fn run_inner(
        &self,
        graph: &Arc<GraphModel>,
        workflow: &Arc<Workflow>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut tracker = RunTracker::default();
        let mut level = graph.start_nodes();
        if level.is_empty() {
            return Err(EngineError::NoEntry);
        }

        self.state.add_log(
            None,
            LogLevel::Info,
            format!("Run started with {} entry node(s)", level.len()),
            None,
        );

        loop {
            tracing::debug!("🔄 Executing level: {:?}", level);
            for id in &level {
                tracker.scheduled.insert(id.clone());
            }

            let mut in_flight = FuturesUnordered::new();
            for id in &level {
                let inputs = gather_inputs(graph, &self.state, &tracker.dead_edges, id);
                in_flight.push(self.run_level_node(graph, workflow, cancel, id.clone(), inputs));
            }

            let mut failure: Option<EngineError> = None;
            let mut completions: Vec<(String, ExecutorOutput)> = Vec::new();
            while let Some((id, result)) = in_flight.next().await {
                match result {
                    Ok(output) => completions.push((id, output)),
                    Err(EngineError::Cancelled) => {}
                    Err(err) => {
                        if failure.is_none() {
                            // Fail fast: stop scheduling and signal the rest
                            // of the level to wind down.
                            failure = Some(err);
                            cancel.cancel();
                        }
                    }
                }
            }

            if let Some(err) = failure {
                return Err(err);
            }
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let candidates = self.apply_completions(graph, &mut tracker, &completions);
            let next = self.collect_ready(graph, &mut tracker, candidates);
            if next.is_empty() {
                return Ok(());
            }
            level = next;
        }
    }

    /// Write edge snapshots, apply conditional routing, and propagate dead
    /// branches. Returns the downstream candidates to consider next.
    fn apply_completions(
        &self,
        graph: &GraphModel,
        tracker: &mut RunTracker,
        completions: &[(String, ExecutorOutput)],
    ) -> Vec<String> {
        let mut candidates = Vec::new();
        for (id, output) in completions {
            let node = graph.node(id).expect("completed node exists");
            for edge in graph.outgoing_edges(id) {
                self.state.set_edge_snapshot(&edge.id, output.output.clone());

                let keep = if node.node_type.is_terminal() {
                    // end/output nodes fire no outgoing edges
                    false
                } else {
                    match &output.active_handles {
                        None => true,
                        Some(handles) => edge
                            .source_handle
                            .as_deref()
                            .is_some_and(|handle| handles.iter().any(|h| h == handle)),
                    }
                };

                if keep {
                    candidates.push(edge.target.clone());
                } else {
                    tracker.dead_edges.insert(edge.id.clone());
                }
            }
        }
        propagate_dead(graph, tracker);
        candidates
    }

    /// Filter downstream candidates to the ones whose dependencies are now
    /// satisfied, enforcing merge readiness and once-only scheduling.
    fn collect_ready(
        &self,
        graph: &GraphModel,
        tracker: &mut RunTracker,
        candidates: Vec<String>,
    ) -> Vec<String> {
        let mut next = Vec::new();
        let mut seen = HashSet::new();
        for target in candidates {
            if !seen.insert(target.clone()) {
                continue;
            }
            if tracker.scheduled.contains(&target) || tracker.dead_nodes.contains(&target) {
                continue;
            }
            let Some(node) = graph.node(&target) else {
                continue;
            };

            let ready = if node.node_type == NodeType::Merge {
                merge_ready(graph, &self.state, node)
                    && tracker.merge_fired.insert(target.clone())
            } else {
                graph.incoming_edges(&target).iter().all(|edge| {
                    tracker.dead_edges.contains(&edge.id)
                        || self.state.edge_snapshot(&edge.id).is_some()
                })
            };

            if ready {
                next.push(target);
            }
        }
        next
    }

    /// Run one node of a level: pause gate, validation, execution, state
    /// bookkeeping. Never panics the level; every outcome is a result.
    async fn run_level_node(
        &self,
        graph: &Arc<GraphModel>,
        workflow: &Arc<Workflow>,
        cancel: &CancellationToken,
        node_id: String,
        inputs: Value,
    ) -> (String, Result<ExecutorOutput>) {
        let result = self
            .run_node_checked(graph, workflow, cancel, &node_id, inputs)
            .await;
        (node_id, result)
    }

    async fn run_node_checked(
        &self,
        graph: &Arc<GraphModel>,
        workflow: &Arc<Workflow>,
        cancel: &CancellationToken,
        node_id: &str,
        inputs: Value,
    ) -> Result<ExecutorOutput> {
        // Cooperative pause: wait at the node boundary, still honoring abort.
        loop {
            if cancel.is_cancelled() {
                self.state.set_error(node_id, "Execution aborted");
                return Err(EngineError::Cancelled);
            }
            if !self.state.is_paused() {
                break;
            }
            tokio::time::sleep(PAUSE_BACKOFF).await;
        }

        let node = graph.node(node_id).expect("scheduled node exists").clone();
        self.state.set_running(node_id);
        self.state.add_log(
            Some(node_id),
            LogLevel::Info,
            format!("Executing {} node", node.node_type.tag()),
            None,
        );

        let Some(runner) = self.registry.get(node.node_type) else {
            let err = EngineError::UnknownType(node.node_type.tag().to_string());
            self.state.set_error(node_id, err.to_string());
            self.state
                .add_log(Some(node_id), LogLevel::Error, err.to_string(), None);
            return Err(err);
        };

        let ctx = self.make_context(&node, inputs, workflow, cancel);

        if let Err(err) = runner.validate(&ctx) {
            let message = err.to_string();
            self.state.set_error(node_id, &message);
            self.state.add_log(
                Some(node_id),
                LogLevel::Error,
                format!("[ValidationFailed] {message}"),
                None,
            );
            return Err(EngineError::ValidationFailed(message));
        }

        let result = tokio::select! {
            result = runner.execute(ctx) => result,
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
        };

        match result {
            Ok(output) => {
                self.state.set_success(node_id, output.output.clone());
                self.state.add_log(
                    Some(node_id),
                    LogLevel::Success,
                    format!("{} node completed", node.node_type.tag()),
                    None,
                );
                Ok(output)
            }
            Err(EngineError::Cancelled) => {
                self.state.set_error(node_id, "Execution aborted");
                self.state.add_log(
                    Some(node_id),
                    LogLevel::Error,
                    "Execution aborted",
                    None,
                );
                Err(EngineError::Cancelled)
            }
            Err(err) => {
                self.state.set_error(node_id, err.to_string());
                self.state.add_log(
                    Some(node_id),
                    LogLevel::Error,
                    format!("[{}] Failed: {}", err.kind(), err),
                    None,
                );
                Err(err)
            }
        }
    }

    /// Imperative re-entry for agent tool calls.
    ///
    /// Resolves the node against the run's workflow snapshot, validates and
    /// executes it with the current services and cancellation, and returns
    /// the raw output. The run's status map is deliberately left untouched;
    /// only the log stream records the invocation.
    pub async fn execute_node(
        &self,
        workflow: &Arc<Workflow>,
        node_id: &str,
        inputs: Value,
        cancel: CancellationToken,
    ) -> Result<Value> {
        let node = workflow
            .node(node_id)
            .ok_or_else(|| EngineError::InvalidInput(format!("unknown node: {node_id}")))?
            .clone();
        let runner = self
            .registry
            .get(node.node_type)
            .ok_or_else(|| EngineError::UnknownType(node.node_type.tag().to_string()))?;

        self.state.add_log(
            Some(node_id),
            LogLevel::Action,
            format!("Tool call: {} node", node.node_type.tag()),
            None,
        );

        let ctx = self.make_context(&node, inputs, workflow, &cancel);
        runner.validate(&ctx)?;

        let output = tokio::select! {
            result = runner.execute(ctx) => result,
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
        }?;

        self.state.add_log(
            Some(node_id),
            LogLevel::Action,
            format!("Tool call completed: {} node", node.node_type.tag()),
            None,
        );
        Ok(output.output)
    }

    /// Run a built-in executor by type tag with no backing node. Used by
    /// the agent for tools that are not wired into the workflow.
    pub async fn execute_builtin(
        &self,
        workflow: &Arc<Workflow>,
        type_tag: &str,
        inputs: Value,
        cancel: CancellationToken,
    ) -> Result<Value> {
        let node_type = NodeType::from_tag(type_tag)
            .ok_or_else(|| EngineError::UnknownType(type_tag.to_string()))?;
        let runner = self
            .registry
            .get(node_type)
            .ok_or_else(|| EngineError::UnknownType(type_tag.to_string()))?;

        let node = Node {
            id: format!("builtin:{type_tag}"),
            node_type,
            data: Value::Object(serde_json::Map::new()),
            position: None,
            extra: serde_json::Map::new(),
        };
        let ctx = self.make_context(&node, inputs, workflow, &cancel);
        runner.validate(&ctx)?;
        let output = tokio::select! {
            result = runner.execute(ctx) => result,
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
        }?;
        Ok(output.output)
    }

    fn make_context(
        &self,
        node: &Node,
        inputs: Value,
        workflow: &Arc<Workflow>,
        cancel: &CancellationToken,
    ) -> ExecutionContext {
        ExecutionContext {
            node_id: node.id.clone(),
            node_type: node.node_type,
            inputs,
            node_data: node.data.clone(),
            services: Arc::clone(&self.services),
            workflow: Arc::clone(workflow),
            cancel: cancel.clone(),
            state: Arc::clone(&self.state),
            engine: self.weak.upgrade(),
        }
    }
}

/// Gather `{sourceId -> output}` over live incoming edges with successful
/// sources; a single contribution is unwrapped to the bare value.
fn gather_inputs(
    graph: &GraphModel,
    state: &ExecutionState,
    dead_edges: &HashSet<String>,
    node_id: &str,
) -> Value {
    let mut map = serde_json::Map::new();
    for edge in graph.incoming_edges(node_id) {
        if dead_edges.contains(&edge.id) || map.contains_key(&edge.source) {
            continue;
        }
        if let Some(output) = state.node_output(&edge.source) {
            map.insert(edge.source.clone(), output);
        }
    }
    match map.len() {
        0 => Value::Null,
        1 => map.into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null),
        _ => Value::Object(map),
    }
}

/// A merge is ready when its upstream sources satisfy the strategy:
/// wait-all for object/array/concat, any-one for first.
fn merge_ready(graph: &GraphModel, state: &ExecutionState, node: &Node) -> bool {
    let strategy = node.data_str("mergeStrategy").unwrap_or("object");
    let sources = graph.upstream(&node.id);
    if sources.is_empty() {
        return false;
    }
    let succeeded = |id: &&str| state.node_output(id).is_some();
    match strategy {
        "first" => sources.iter().any(succeeded),
        _ => sources.iter().all(succeeded),
    }
}

/// Mark nodes dead when every incoming dataflow edge died, then kill their
/// outgoing edges and repeat until the frontier stops moving.
fn propagate_dead(graph: &GraphModel, tracker: &mut RunTracker) {
    loop {
        let mut changed = false;
        let node_ids: Vec<String> = graph.node_ids();
        for id in node_ids {
            if tracker.dead_nodes.contains(&id) {
                continue;
            }
            let incoming = graph.incoming_edges(&id);
            if incoming.is_empty() {
                continue;
            }
            if incoming.iter().all(|e| tracker.dead_edges.contains(&e.id)) {
                tracker.dead_nodes.insert(id.clone());
                for edge in graph.outgoing_edges(&id) {
                    tracker.dead_edges.insert(edge.id.clone());
                }
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

/// Map of run-facing helpers used by the scheduler and CLI.
impl ExecutionEngine {
    /// Convenience wrapper: run and report the terminal outputs.
    pub async fn run_to_outputs(
        &self,
        workflow: Arc<Workflow>,
    ) -> Result<HashMap<String, Value>> {
        self.run(Arc::clone(&workflow)).await?;
        let mut outputs = HashMap::new();
        for node in &workflow.nodes {
            if node.node_type.is_terminal() {
                if let Some(output) = self.state.node_output(&node.id) {
                    outputs.insert(node.id.clone(), output);
                }
            }
        }
        Ok(outputs)
    }
}
