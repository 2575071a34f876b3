/// Graph model built once per run
///
/// Splits the workflow's edges into dataflow edges and resource edges.
/// Dataflow edges drive scheduling and input gathering; resource edges are
/// consumed by aiAgent tool discovery and never gate execution. Cycle
/// detection runs at build time via petgraph so traversal can assume a DAG.

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{EngineError, Result};
use crate::workflow::types::{Edge, Node, Workflow};

/// Per-run adjacency view of a workflow
#[derive(Debug)]
pub struct GraphModel {
    nodes: HashMap<String, Node>,
    /// Full incoming dataflow edge records, keyed by target node id
    incoming: HashMap<String, Vec<Edge>>,
    /// Full outgoing dataflow edge records, keyed by source node id
    outgoing: HashMap<String, Vec<Edge>>,
    /// Node ids that only supply resource slots (agent tools)
    resource_only: HashSet<String>,
    /// Topological order over dataflow edges
    topo: Vec<String>,
}

impl GraphModel {
    /// Build the adjacency view and validate the workflow for execution.
    ///
    /// Rejects empty graphs (NoEntry), structural violations, and cycles.
    pub fn build(workflow: &Workflow) -> Result<Self> {
        if workflow.nodes.is_empty() {
            return Err(EngineError::NoEntry);
        }
        workflow.validate()?;

        let mut nodes = HashMap::new();
        let mut incoming: HashMap<String, Vec<Edge>> = HashMap::new();
        let mut outgoing: HashMap<String, Vec<Edge>> = HashMap::new();
        for node in &workflow.nodes {
            nodes.insert(node.id.clone(), node.clone());
            incoming.insert(node.id.clone(), Vec::new());
            outgoing.insert(node.id.clone(), Vec::new());
        }

        // Resource edges are kept out of the adjacency maps entirely; the
        // agent reads them straight off the workflow snapshot.
        let mut resource_sources: HashSet<String> = HashSet::new();
        let mut dataflow_touched: HashSet<String> = HashSet::new();
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut index_of: HashMap<&str, NodeIndex> = HashMap::new();
        for node in &workflow.nodes {
            let idx = graph.add_node(node.id.as_str());
            index_of.insert(node.id.as_str(), idx);
        }

        for edge in &workflow.edges {
            if edge.is_resource() {
                resource_sources.insert(edge.source.clone());
                continue;
            }
            dataflow_touched.insert(edge.source.clone());
            dataflow_touched.insert(edge.target.clone());
            incoming
                .get_mut(&edge.target)
                .expect("validated target")
                .push(edge.clone());
            outgoing
                .get_mut(&edge.source)
                .expect("validated source")
                .push(edge.clone());
            graph.add_edge(index_of[edge.source.as_str()], index_of[edge.target.as_str()], ());
        }

        let topo_indices =
            toposort(&graph, None).map_err(|_| EngineError::CycleDetected)?;
        let topo = topo_indices
            .into_iter()
            .map(|idx| graph[idx].to_string())
            .collect();

        let resource_only = resource_sources
            .into_iter()
            .filter(|id| !dataflow_touched.contains(id))
            .collect();

        Ok(Self {
            nodes,
            incoming,
            outgoing,
            resource_only,
            topo,
        })
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// All node ids in the graph.
    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    /// Incoming dataflow edge records for a node.
    pub fn incoming_edges(&self, id: &str) -> &[Edge] {
        self.incoming.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Outgoing dataflow edge records for a node.
    pub fn outgoing_edges(&self, id: &str) -> &[Edge] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct upstream node ids for a node.
    pub fn upstream(&self, id: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.incoming_edges(id)
            .iter()
            .filter(|e| seen.insert(e.source.as_str()))
            .map(|e| e.source.as_str())
            .collect()
    }

    /// Entry nodes: no incoming dataflow edges, and not a pure resource
    /// provider. Tool nodes hanging off an agent's resource slot only run
    /// through engine re-entry.
    pub fn start_nodes(&self) -> Vec<String> {
        self.topo
            .iter()
            .filter(|id| self.incoming_edges(id).is_empty() && !self.resource_only.contains(*id))
            .cloned()
            .collect()
    }

    /// Whether a node participates in traversal at all.
    pub fn is_resource_only(&self, id: &str) -> bool {
        self.resource_only.contains(id)
    }

    /// Topological order over dataflow edges.
    pub fn topo_order(&self) -> &[String] {
        &self.topo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workflow(doc: serde_json::Value) -> Workflow {
        serde_json::from_value(doc).unwrap()
    }

    #[test]
    fn cycle_is_rejected() {
        let wf = workflow(json!({
            "nodes": [
                {"id": "a", "type": "start"},
                {"id": "b", "type": "delay"}
            ],
            "edges": [
                {"id": "e1", "source": "a", "target": "b"},
                {"id": "e2", "source": "b", "target": "a"}
            ]
        }));
        assert!(matches!(
            GraphModel::build(&wf),
            Err(EngineError::CycleDetected)
        ));
    }

    #[test]
    fn tool_nodes_are_not_start_nodes() {
        let wf = workflow(json!({
            "nodes": [
                {"id": "t", "type": "manualTrigger"},
                {"id": "agent", "type": "aiAgent"},
                {"id": "tool", "type": "python"}
            ],
            "edges": [
                {"id": "e1", "source": "t", "target": "agent"},
                {"id": "e2", "source": "tool", "target": "agent", "targetHandle": "resource-tools"}
            ]
        }));
        let graph = GraphModel::build(&wf).unwrap();
        assert_eq!(graph.start_nodes(), vec!["t".to_string()]);
        assert!(graph.is_resource_only("tool"));
        // The resource edge does not gate the agent either.
        assert_eq!(graph.upstream("agent"), vec!["t"]);
    }

    #[test]
    fn empty_graph_has_no_entry() {
        let wf = Workflow::default();
        assert!(matches!(GraphModel::build(&wf), Err(EngineError::NoEntry)));
    }
}
