/// Core workflow type definitions
///
/// Defines the fundamental structures for workflows, nodes, and edges.
/// These types round-trip through JSON: unknown keys on nodes and edges
/// are preserved so a document exported after import is byte-equivalent
/// in content to what the editor produced.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EngineError;

/// A complete workflow definition containing nodes and their connections
///
/// Workflows are held in memory as the single source of truth and compiled
/// into a GraphModel per run. The engine ignores node positions entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workflow {
    /// List of nodes in this workflow
    pub nodes: Vec<Node>,
    /// List of edges connecting nodes
    pub edges: Vec<Edge>,
}

/// A single node in the workflow graph
///
/// Nodes represent discrete processing units. The `data` object holds
/// type-specific configuration; executors read it, never write it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique node identifier within the workflow
    pub id: String,
    /// The type of node which determines execution behavior
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Node-specific configuration as flexible JSON
    #[serde(default)]
    pub data: Value,
    /// Editor canvas position; carried through import/export, ignored here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Value>,
    /// Unknown keys preserved for round-trip fidelity
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Available node types for the Iosans engine
///
/// This is a closed set: documents with any other type tag are rejected
/// at import rather than deferred to run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    #[serde(rename = "manualTrigger")]
    ManualTrigger,
    #[serde(rename = "scheduleTrigger")]
    ScheduleTrigger,
    #[serde(rename = "aiAgent")]
    AiAgent,
    #[serde(rename = "llm")]
    Llm,
    #[serde(rename = "codeExecutor")]
    CodeExecutor,
    #[serde(rename = "httpRequest")]
    HttpRequest,
    #[serde(rename = "ifElse")]
    IfElse,
    #[serde(rename = "switch")]
    Switch,
    #[serde(rename = "merge")]
    Merge,
    #[serde(rename = "delay")]
    Delay,
    #[serde(rename = "transform")]
    Transform,
    #[serde(rename = "python")]
    Python,
    #[serde(rename = "textToSpeech")]
    TextToSpeech,
    #[serde(rename = "imageGeneration")]
    ImageGeneration,
    #[serde(rename = "output")]
    Output,
    #[serde(rename = "start")]
    Start,
    #[serde(rename = "end")]
    End,
}

impl NodeType {
    /// The JSON tag for this type, e.g. "codeExecutor".
    pub fn tag(&self) -> &'static str {
        match self {
            NodeType::ManualTrigger => "manualTrigger",
            NodeType::ScheduleTrigger => "scheduleTrigger",
            NodeType::AiAgent => "aiAgent",
            NodeType::Llm => "llm",
            NodeType::CodeExecutor => "codeExecutor",
            NodeType::HttpRequest => "httpRequest",
            NodeType::IfElse => "ifElse",
            NodeType::Switch => "switch",
            NodeType::Merge => "merge",
            NodeType::Delay => "delay",
            NodeType::Transform => "transform",
            NodeType::Python => "python",
            NodeType::TextToSpeech => "textToSpeech",
            NodeType::ImageGeneration => "imageGeneration",
            NodeType::Output => "output",
            NodeType::Start => "start",
            NodeType::End => "end",
        }
    }

    /// Parse a JSON tag back into a node type.
    pub fn from_tag(tag: &str) -> Option<Self> {
        serde_json::from_value(Value::String(tag.to_string())).ok()
    }

    /// Trigger types produce `{triggered, timestamp}` with no inputs.
    pub fn is_trigger(&self) -> bool {
        matches!(
            self,
            NodeType::Start | NodeType::ManualTrigger | NodeType::ScheduleTrigger
        )
    }

    /// Terminal types pass inputs through and fire no outgoing edges.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeType::End | NodeType::Output)
    }
}

impl Node {
    /// Read a string config value from node data.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Read a numeric config value from node data.
    pub fn data_f64(&self, key: &str) -> Option<f64> {
        self.data.get(key).and_then(|v| v.as_f64())
    }

    /// Read an integer config value from node data.
    pub fn data_u64(&self, key: &str) -> Option<u64> {
        self.data.get(key).and_then(|v| v.as_u64())
    }

    /// Read a boolean config value from node data.
    pub fn data_bool(&self, key: &str) -> Option<bool> {
        self.data.get(key).and_then(|v| v.as_bool())
    }
}

/// Connection between two nodes in the workflow graph
///
/// Handles identify the port on either end. Routing nodes (ifElse/switch)
/// use distinct source handles to encode the chosen branch; agents use
/// resource target handles to discover tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Unique edge identifier
    pub id: String,
    /// Source node ID
    pub source: String,
    /// Target node ID
    pub target: String,
    /// Named port on the source node
    #[serde(
        default,
        rename = "sourceHandle",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_handle: Option<String>,
    /// Named port on the target node
    #[serde(
        default,
        rename = "targetHandle",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_handle: Option<String>,
    /// Unknown keys (editor styling etc.) preserved for round-trip fidelity
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Edge {
    /// The uniqueness key for an edge within a workflow.
    pub fn routing_key(&self) -> (&str, Option<&str>, &str, Option<&str>) {
        (
            self.source.as_str(),
            self.source_handle.as_deref(),
            self.target.as_str(),
            self.target_handle.as_deref(),
        )
    }

    /// Whether this edge plugs into a resource slot (tool/model/memory)
    /// instead of carrying dataflow.
    pub fn is_resource(&self) -> bool {
        self.target_handle
            .as_deref()
            .is_some_and(is_resource_handle)
    }
}

/// A handle names a resource slot when it contains the "resource" marker,
/// e.g. "resource-tools" or "agent-resource".
pub fn is_resource_handle(handle: &str) -> bool {
    handle.contains("resource")
}

impl Workflow {
    /// Validate structural invariants: unique node ids, unique edge
    /// quadruple keys, no self-loops, and no edges to unknown nodes.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut node_ids = std::collections::HashSet::new();
        for node in &self.nodes {
            if node.id.is_empty() {
                return Err(EngineError::InvalidInput("node with empty id".to_string()));
            }
            if !node_ids.insert(node.id.as_str()) {
                return Err(EngineError::InvalidInput(format!(
                    "duplicate node id: {}",
                    node.id
                )));
            }
        }

        let mut edge_keys = std::collections::HashSet::new();
        for edge in &self.edges {
            if edge.source == edge.target {
                return Err(EngineError::InvalidInput(format!(
                    "edge {} is a self-loop on node {}",
                    edge.id, edge.source
                )));
            }
            if !node_ids.contains(edge.source.as_str()) {
                return Err(EngineError::InvalidInput(format!(
                    "edge {} references unknown source node: {}",
                    edge.id, edge.source
                )));
            }
            if !node_ids.contains(edge.target.as_str()) {
                return Err(EngineError::InvalidInput(format!(
                    "edge {} references unknown target node: {}",
                    edge.id, edge.target
                )));
            }
            if !edge_keys.insert(edge.routing_key()) {
                return Err(EngineError::InvalidInput(format!(
                    "duplicate edge {} -> {} on the same handles",
                    edge.source, edge.target
                )));
            }
        }

        Ok(())
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_type_round_trips_through_tag() {
        for tag in ["aiAgent", "ifElse", "scheduleTrigger", "codeExecutor"] {
            let parsed = NodeType::from_tag(tag).unwrap();
            assert_eq!(parsed.tag(), tag);
        }
        assert!(NodeType::from_tag("teleport").is_none());
    }

    #[test]
    fn resource_handles_are_detected_by_marker() {
        assert!(is_resource_handle("resource-tools"));
        assert!(is_resource_handle("agent-resource"));
        assert!(!is_resource_handle("out-true"));
    }

    #[test]
    fn validate_rejects_self_loop() {
        let workflow: Workflow = serde_json::from_value(json!({
            "nodes": [{"id": "a", "type": "start"}],
            "edges": [{"id": "e1", "source": "a", "target": "a"}]
        }))
        .unwrap();
        assert!(workflow.validate().is_err());
    }
}
