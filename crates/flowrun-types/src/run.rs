//! Run records.
//!
//! The engine itself never persists anything. These types describe the row
//! the run service writes around each engine invocation, and the summary it
//! hands back to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::event::FinishStatus;

/// Lifecycle status of a persisted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowRunStatus {
    Running,
    Success,
    Failed,
}

impl FlowRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowRunStatus::Running => "running",
            FlowRunStatus::Success => "success",
            FlowRunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for FlowRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FlowRunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(FlowRunStatus::Running),
            "success" => Ok(FlowRunStatus::Success),
            "failed" => Ok(FlowRunStatus::Failed),
            other => Err(format!("invalid run status: {other}")),
        }
    }
}

impl From<FinishStatus> for FlowRunStatus {
    fn from(value: FinishStatus) -> Self {
        match value {
            FinishStatus::Success => FlowRunStatus::Success,
            FinishStatus::Failed => FlowRunStatus::Failed,
        }
    }
}

/// One persisted execution of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRun {
    /// UUIDv7 run ID.
    pub id: Uuid,
    /// Flow the run belongs to, taken from the first node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
    /// The first node's data payload as submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_data: Option<Value>,
    /// Final data object. Empty for failed runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_data: Option<Value>,
    pub status: FlowRunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlowRun {
    /// A fresh `running` record.
    pub fn started(flow_id: Option<String>, start_data: Option<Value>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            flow_id,
            start_data,
            end_data: None,
            status: FlowRunStatus::Running,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of one run as returned by the run service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub status: FlowRunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
