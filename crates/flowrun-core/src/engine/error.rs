//! Engine error taxonomy.
//!
//! [`NodeError`] covers faults raised while one node executes; its display
//! form is the raw message carried by `node:failed`. [`FlowError`] is the
//! single value a run returns to its caller; node faults are wrapped with
//! the failing node's type and id.

use flowrun_types::graph::NodeType;
use serde_json::Value;

/// A fault raised while executing a single node.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NodeError {
    #[error("[InputError] {0}")]
    Input(String),

    #[error("[CompileError] {0}")]
    Compile(String),

    #[error("[RuntimeError] {0}")]
    Runtime(String),

    #[error("[OutputTypeError] {node} must return {expected}, got {got}")]
    OutputType {
        node: &'static str,
        expected: &'static str,
        got: &'static str,
    },

    #[error("[AIBridgeError] {0}")]
    AiBridge(String),

    #[error("Can not get next node - current id: {node_id}{}", branch_suffix(.branch))]
    DeadEnd {
        node_id: String,
        branch: Option<bool>,
    },

    #[error("[MissingNode] node '{0}' not found")]
    MissingNode(String),

    #[error("[Cancelled] run cancelled")]
    Cancelled,

    #[error("[NodeTimeout] node did not finish within {secs}s")]
    Timeout { secs: u64 },
}

fn branch_suffix(branch: &Option<bool>) -> String {
    match branch {
        Some(b) => format!(" (no \"{b}\" branch)"),
        None => String::new(),
    }
}

/// The failure of a whole run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlowError {
    #[error("No start node found")]
    NoStartNode,

    #[error("start node data must be an object, got {got}")]
    InvalidStartData { got: &'static str },

    #[error("Exceeded stepLimit={limit}")]
    StepLimitExceeded { limit: u32 },

    /// The start node's outgoing edge points at an unknown node.
    #[error("[MissingNode] node '{0}' not found")]
    MissingNode(String),

    #[error("[FlowError][{node_type}][{node_id}] {source}")]
    Node {
        node_type: NodeType,
        node_id: String,
        #[source]
        source: NodeError,
    },

    #[error("[Cancelled] run cancelled")]
    Cancelled,

    #[error("engine task failed: {0}")]
    Internal(String),
}

impl FlowError {
    /// The underlying node fault, if this run failed inside a node.
    pub fn node_error(&self) -> Option<&NodeError> {
        match self {
            FlowError::Node { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// JSON runtime type name used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_type_message() {
        let err = NodeError::OutputType {
            node: "scriptNode",
            expected: "an object",
            got: type_name(&json!(123)),
        };
        assert_eq!(
            err.to_string(),
            "[OutputTypeError] scriptNode must return an object, got number"
        );
    }

    #[test]
    fn test_dead_end_names_branch() {
        let plain = NodeError::DeadEnd {
            node_id: "s1".into(),
            branch: None,
        };
        assert_eq!(plain.to_string(), "Can not get next node - current id: s1");

        let branch = NodeError::DeadEnd {
            node_id: "c1".into(),
            branch: Some(false),
        };
        assert_eq!(
            branch.to_string(),
            "Can not get next node - current id: c1 (no \"false\" branch)"
        );
    }

    #[test]
    fn test_node_failure_is_annotated() {
        let err = FlowError::Node {
            node_type: NodeType::Script,
            node_id: "n2".into(),
            source: NodeError::Runtime("boom".into()),
        };
        assert_eq!(err.to_string(), "[FlowError][scriptNode][n2] [RuntimeError] boom");
        assert_eq!(err.node_error(), Some(&NodeError::Runtime("boom".into())));
    }

    #[test]
    fn test_step_limit_message() {
        let err = FlowError::StepLimitExceeded { limit: 50 };
        assert_eq!(err.to_string(), "Exceeded stepLimit=50");
        assert!(err.node_error().is_none());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(type_name(&json!(null)), "null");
        assert_eq!(type_name(&json!([1])), "array");
        assert_eq!(type_name(&json!({})), "object");
        assert_eq!(type_name(&json!("x")), "string");
        assert_eq!(type_name(&json!(true)), "boolean");
    }
}
