//! Progress events emitted during a flow run.
//!
//! A run emits, in strict order: one `run:started` (unless start validation
//! fails), `node:*` events for each step, and exactly one `run:finished`.
//! The JSON form is internally tagged by `type` with camelCase keys so it
//! can be forwarded to the editor unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::graph::NodeType;

/// Terminal status reported by `run:finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishStatus {
    Success,
    Failed,
}

/// One entry of the progress stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    #[serde(rename = "run:started", rename_all = "camelCase")]
    RunStarted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        flow_id: Option<String>,
        start_data: Map<String, Value>,
    },

    #[serde(rename = "node:started", rename_all = "camelCase")]
    NodeStarted {
        node_id: String,
        node_type: NodeType,
        step: u32,
    },

    #[serde(rename = "node:succeeded", rename_all = "camelCase")]
    NodeSucceeded {
        node_id: String,
        node_type: NodeType,
        step: u32,
        data: Map<String, Value>,
    },

    #[serde(rename = "node:failed", rename_all = "camelCase")]
    NodeFailed {
        node_id: String,
        node_type: NodeType,
        step: u32,
        error: String,
    },

    #[serde(rename = "run:finished", rename_all = "camelCase")]
    RunFinished {
        status: FinishStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Map<String, Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl ProgressEvent {
    /// Build a successful `run:finished`.
    pub fn finished_ok(result: Map<String, Value>) -> Self {
        ProgressEvent::RunFinished {
            status: FinishStatus::Success,
            result: Some(result),
            error: None,
        }
    }

    /// Build a failed `run:finished`.
    pub fn finished_err(error: impl Into<String>) -> Self {
        ProgressEvent::RunFinished {
            status: FinishStatus::Failed,
            result: None,
            error: Some(error.into()),
        }
    }

    /// The wire tag of this event (e.g. `"node:started"`).
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::RunStarted { .. } => "run:started",
            ProgressEvent::NodeStarted { .. } => "node:started",
            ProgressEvent::NodeSucceeded { .. } => "node:succeeded",
            ProgressEvent::NodeFailed { .. } => "node:failed",
            ProgressEvent::RunFinished { .. } => "run:finished",
        }
    }

    /// Whether this is the terminal event of a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::RunFinished { .. })
    }

    /// The node this event refers to, for `node:*` events.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            ProgressEvent::NodeStarted { node_id, .. }
            | ProgressEvent::NodeSucceeded { node_id, .. }
            | ProgressEvent::NodeFailed { node_id, .. } => Some(node_id),
            _ => None,
        }
    }
}
