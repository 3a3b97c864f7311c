//! Flow graph domain types.
//!
//! A flow is a node list plus an edge list, exactly as the visual editor
//! saves it. The engine consumes a [`FlowGraph`] wholesale per run and never
//! mutates it; only the data object threaded between steps changes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Node type
// ---------------------------------------------------------------------------

/// The kind of a flow node.
///
/// Serialized with the editor names (`startNode`, `scriptNode`, ...). The
/// short names (`start`, `script`, ...) are accepted on input. Any other
/// string is kept verbatim in [`NodeType::Other`] so progress events can
/// report it back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Start,
    Script,
    Conditional,
    Ai,
    Output,
    /// Editor-only placeholder; never meaningful at run time.
    Plus,
    Other(String),
}

impl NodeType {
    /// The canonical wire name of this node type.
    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Start => "startNode",
            NodeType::Script => "scriptNode",
            NodeType::Conditional => "conditionalNode",
            NodeType::Ai => "aiNode",
            NodeType::Output => "outputNode",
            NodeType::Plus => "plusNode",
            NodeType::Other(name) => name,
        }
    }
}

impl From<String> for NodeType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "startNode" | "start" => NodeType::Start,
            "scriptNode" | "script" => NodeType::Script,
            "conditionalNode" | "conditional" => NodeType::Conditional,
            "aiNode" | "ai" => NodeType::Ai,
            "outputNode" | "output" => NodeType::Output,
            "plusNode" | "plus" => NodeType::Plus,
            _ => NodeType::Other(value),
        }
    }
}

impl From<&str> for NodeType {
    fn from(value: &str) -> Self {
        NodeType::from(value.to_string())
    }
}

impl From<NodeType> for String {
    fn from(value: NodeType) -> Self {
        match value {
            NodeType::Other(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Nodes and edges
// ---------------------------------------------------------------------------

/// Canvas position of a node. Carried through for round-tripping only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    pub x: f64,
    pub y: f64,
}

/// One step of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    /// Owning flow, if the editor supplied it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "nodeType", alias = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<NodePosition>,
    /// Free-form payload. For script/conditional nodes it carries `script`;
    /// for AI nodes `script` (the prompt template) and `result_field`.
    #[serde(default)]
    pub data: Value,
}

impl FlowNode {
    /// Create a node with an empty object payload.
    pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            flow_id: None,
            label: None,
            node_type,
            position: None,
            data: Value::Object(Map::new()),
        }
    }

    /// Replace the node payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Set the owning flow id.
    pub fn with_flow_id(mut self, flow_id: impl Into<String>) -> Self {
        self.flow_id = Some(flow_id.into());
        self
    }

    /// Read a string field from the payload, if present.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// The `script` field of the payload.
    pub fn script(&self) -> Option<&str> {
        self.data_str("script")
    }
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEdge {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
    #[serde(alias = "source")]
    pub source_node_id: String,
    #[serde(alias = "target")]
    pub target_node_id: String,
    /// Optional payload; `data.branch` tags a conditional's outgoing path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl FlowEdge {
    /// Create an untagged ("normal") edge.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{source}->{target}"),
            flow_id: None,
            source_node_id: source,
            target_node_id: target,
            data: None,
        }
    }

    /// Create an edge tagged with a conditional branch (`"true"`/`"false"`).
    pub fn branch(source: impl Into<String>, target: impl Into<String>, branch: bool) -> Self {
        let mut edge = Self::new(source, target);
        edge.data = Some(serde_json::json!({ "branch": branch.to_string() }));
        edge
    }

    /// The branch tag, if any. An empty string counts as untagged.
    pub fn branch_tag(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.get("branch"))
            .and_then(Value::as_str)
            .filter(|b| !b.is_empty())
    }
}

/// A complete flow: nodes plus edges, supplied wholesale per run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    #[serde(default)]
    pub nodes: Vec<FlowNode>,
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    pub fn new(nodes: Vec<FlowNode>, edges: Vec<FlowEdge>) -> Self {
        Self { nodes, edges }
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The flow id carried by the first node, if any.
    pub fn flow_id(&self) -> Option<&str> {
        self.nodes.first().and_then(|n| n.flow_id.as_deref())
    }
}
