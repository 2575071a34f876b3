/// In-memory workflow store with lock-free snapshots
///
/// The store is the single source of truth for the active workflow. Reads
/// take an atomic snapshot via ArcSwap, so a run keeps executing against
/// the graph it started with even while the document is being replaced.
/// All mutations re-validate the structural invariants before swapping.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;

use crate::error::{EngineError, Result};
use crate::workflow::types::{Edge, Node, Workflow};

/// Lock-free store for the active workflow document
#[derive(Debug)]
pub struct WorkflowStore {
    current: ArcSwap<Workflow>,
}

impl WorkflowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::new(Arc::new(Workflow::default())),
        }
    }

    /// Create a store seeded with a validated workflow.
    pub fn with_workflow(workflow: Workflow) -> Result<Self> {
        workflow.validate()?;
        Ok(Self {
            current: ArcSwap::new(Arc::new(workflow)),
        })
    }

    /// Atomic snapshot of the current workflow (cheap, pointer clone).
    pub fn snapshot(&self) -> Arc<Workflow> {
        self.current.load_full()
    }

    /// Replace the whole document atomically. Rejects structural violations.
    pub fn load_workflow(&self, workflow: Workflow) -> Result<()> {
        workflow.validate()?;
        self.current.store(Arc::new(workflow));
        Ok(())
    }

    /// Replace the node list atomically, keeping edges.
    pub fn set_nodes(&self, nodes: Vec<Node>) -> Result<()> {
        let next = Workflow {
            nodes,
            edges: self.snapshot().edges.clone(),
        };
        self.load_workflow(next)
    }

    /// Replace the edge list atomically, keeping nodes.
    pub fn set_edges(&self, edges: Vec<Edge>) -> Result<()> {
        let next = Workflow {
            nodes: self.snapshot().nodes.clone(),
            edges,
        };
        self.load_workflow(next)
    }

    /// Add a single node. Fails on duplicate id.
    pub fn add_node(&self, node: Node) -> Result<()> {
        let mut next = (*self.snapshot()).clone();
        next.nodes.push(node);
        self.load_workflow(next)
    }

    /// Update the configuration object of an existing node.
    pub fn update_node_data(&self, node_id: &str, data: Value) -> Result<()> {
        let mut next = (*self.snapshot()).clone();
        let node = next
            .nodes
            .iter_mut()
            .find(|n| n.id == node_id)
            .ok_or_else(|| EngineError::InvalidInput(format!("unknown node: {node_id}")))?;
        node.data = data;
        self.load_workflow(next)
    }

    /// Remove a node and every edge attached to it.
    pub fn remove_node(&self, node_id: &str) -> Result<bool> {
        let mut next = (*self.snapshot()).clone();
        let before = next.nodes.len();
        next.nodes.retain(|n| n.id != node_id);
        if next.nodes.len() == before {
            return Ok(false);
        }
        next.edges
            .retain(|e| e.source != node_id && e.target != node_id);
        self.load_workflow(next)?;
        Ok(true)
    }

    /// Add a single edge. Fails on duplicate quadruple key, self-loop,
    /// or unknown endpoints.
    pub fn add_edge(&self, edge: Edge) -> Result<()> {
        let mut next = (*self.snapshot()).clone();
        next.edges.push(edge);
        self.load_workflow(next)
    }

    /// Remove an edge by id.
    pub fn remove_edge(&self, edge_id: &str) -> Result<bool> {
        let mut next = (*self.snapshot()).clone();
        let before = next.edges.len();
        next.edges.retain(|e| e.id != edge_id);
        if next.edges.len() == before {
            return Ok(false);
        }
        self.load_workflow(next)?;
        Ok(true)
    }

    /// Edges pointing at the given node.
    pub fn get_incoming_edges(&self, node_id: &str) -> Vec<Edge> {
        self.snapshot()
            .edges
            .iter()
            .filter(|e| e.target == node_id)
            .cloned()
            .collect()
    }

    /// Edges leaving the given node.
    pub fn get_outgoing_edges(&self, node_id: &str) -> Vec<Edge> {
        self.snapshot()
            .edges
            .iter()
            .filter(|e| e.source == node_id)
            .cloned()
            .collect()
    }

    /// Ids of nodes immediately upstream of the given node.
    pub fn get_upstream_nodes(&self, node_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .get_incoming_edges(node_id)
            .into_iter()
            .map(|e| e.source)
            .collect();
        ids.dedup();
        ids
    }

    /// Ids of nodes immediately downstream of the given node.
    pub fn get_downstream_nodes(&self, node_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .get_outgoing_edges(node_id)
            .into_iter()
            .map(|e| e.target)
            .collect();
        ids.dedup();
        ids
    }
}

impl Default for WorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse and validate a workflow JSON document.
pub fn import_json(document: &str) -> Result<Workflow> {
    let workflow: Workflow = serde_json::from_str(document)
        .map_err(|e| EngineError::InvalidInput(format!("workflow parse error: {e}")))?;
    workflow.validate()?;
    Ok(workflow)
}

/// Serialize a workflow back to its canonical JSON document.
pub fn export_json(workflow: &Workflow) -> Result<String> {
    serde_json::to_string_pretty(workflow)
        .map_err(|e| EngineError::InvalidInput(format!("workflow serialize error: {e}")))
}
