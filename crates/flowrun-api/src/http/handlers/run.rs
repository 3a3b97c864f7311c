//! Run endpoints: execute a graph synchronously and inspect stored runs.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use flowrun_types::event::ProgressEvent;
use flowrun_types::graph::FlowGraph;
use flowrun_types::run::{FlowRun, RunSummary};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

const MAX_LIST_LIMIT: u32 = 200;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

/// Body of `POST /runs` and of the WebSocket `run:start` command.
#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    #[serde(flatten)]
    pub graph: FlowGraph,
    /// Use the preview engine profile.
    #[serde(default)]
    pub preview: bool,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    #[serde(flatten)]
    pub summary: RunSummary,
    pub events: Vec<ProgressEvent>,
}

#[derive(Debug, Deserialize)]
pub struct ListRunsQuery {
    #[serde(default = "default_run_limit")]
    pub limit: u32,
    /// Restrict to one flow.
    pub flow: Option<String>,
}

fn default_run_limit() -> u32 {
    20
}

fn checked_limit(limit: u32) -> Result<u32, AppError> {
    if limit == 0 {
        return Err(AppError::Validation("limit must be at least 1".to_string()));
    }
    Ok(limit.min(MAX_LIST_LIMIT))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/runs - Execute a graph and wait for the outcome.
///
/// A failed flow is still a 200: the summary carries `status: "failed"`.
pub async fn create_run(
    State(state): State<AppState>,
    Json(body): Json<RunRequest>,
) -> Result<Json<ApiResponse<RunResponse>>, AppError> {
    let started = Instant::now();
    let mut events: Vec<ProgressEvent> = Vec::new();

    let summary = state
        .service(body.preview)
        .run(&body.graph, &mut events, &CancellationToken::new())
        .await?;

    Ok(Json(ApiResponse::timed(RunResponse { summary, events }, started)))
}

/// GET /api/v1/runs - Most recent runs, optionally filtered by `?flow=`.
pub async fn list_runs(
    State(state): State<AppState>,
    Query(query): Query<ListRunsQuery>,
) -> Result<Json<ApiResponse<Vec<FlowRun>>>, AppError> {
    let started = Instant::now();
    let limit = checked_limit(query.limit)?;
    let runs = state
        .run_service
        .list_runs(query.flow.as_deref(), limit)
        .await?;
    Ok(Json(ApiResponse::timed(runs, started)))
}

/// GET /api/v1/runs/{id}
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FlowRun>>, AppError> {
    let started = Instant::now();
    let run = state.run_service.get_run(&id).await?;
    Ok(Json(ApiResponse::timed(run, started)))
}

/// GET /api/v1/flows/{flow_id}/runs
pub async fn list_flow_runs(
    State(state): State<AppState>,
    Path(flow_id): Path<String>,
    Query(query): Query<ListRunsQuery>,
) -> Result<Json<ApiResponse<Vec<FlowRun>>>, AppError> {
    let started = Instant::now();
    let limit = checked_limit(query.limit)?;
    let runs = state.run_service.list_runs(Some(&flow_id), limit).await?;
    Ok(Json(ApiResponse::timed(runs, started)))
}

#[cfg(test)]
mod tests {
    use flowrun_core::llm::box_generator::BoxTextGenerator;
    use flowrun_core::llm::disabled::DisabledGenerator;
    use flowrun_types::config::GlobalConfig;
    use flowrun_types::run::FlowRunStatus;
    use serde_json::json;

    use super::*;

    async fn test_state() -> AppState {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        std::mem::forget(dir);
        AppState::open(&path, GlobalConfig::default(), BoxTextGenerator::new(DisabledGenerator))
            .await
            .unwrap()
    }

    fn request(value: serde_json::Value) -> RunRequest {
        serde_json::from_value(value).unwrap()
    }

    fn merge_flow() -> serde_json::Value {
        json!({
            "nodes": [
                { "id": "s", "type": "startNode", "flow_id": "f1", "data": { "name": "Ada" } },
                { "id": "x", "type": "scriptNode", "data": { "script": "data|merge({fromScript: true})" } },
                { "id": "o", "type": "outputNode", "data": {} }
            ],
            "edges": [
                { "source": "s", "target": "x" },
                { "source": "x", "target": "o" }
            ]
        })
    }

    #[tokio::test]
    async fn test_create_run_returns_summary_and_events() {
        let state = test_state().await;
        let Json(resp) = create_run(State(state.clone()), Json(request(merge_flow())))
            .await
            .unwrap();
        let body = resp.data.unwrap();

        assert_eq!(body.summary.status, FlowRunStatus::Success);
        assert_eq!(
            body.summary.result.clone().map(serde_json::Value::Object),
            Some(json!({ "name": "Ada", "fromScript": true }))
        );
        assert_eq!(body.events.first().map(ProgressEvent::kind), Some("run:started"));
        assert!(body.events.last().is_some_and(ProgressEvent::is_terminal));

        let Json(stored) = get_run(State(state), Path(body.summary.run_id)).await.unwrap();
        assert_eq!(stored.data.unwrap().status, FlowRunStatus::Success);
    }

    #[tokio::test]
    async fn test_failed_flow_is_still_ok() {
        let state = test_state().await;
        let Json(resp) = create_run(State(state), Json(request(json!({ "nodes": [], "edges": [] }))))
            .await
            .unwrap();
        let body = resp.data.unwrap();
        assert_eq!(body.summary.status, FlowRunStatus::Failed);
        assert_eq!(body.summary.error.as_deref(), Some("No start node found"));
    }

    #[tokio::test]
    async fn test_list_runs_and_filter_by_flow() {
        let state = test_state().await;
        for _ in 0..2 {
            create_run(State(state.clone()), Json(request(merge_flow()))).await.unwrap();
        }

        let query = || ListRunsQuery { limit: 20, flow: None };
        let Json(all) = list_runs(State(state.clone()), Query(query())).await.unwrap();
        assert_eq!(all.data.unwrap().len(), 2);

        let Json(by_flow) = list_flow_runs(State(state.clone()), Path("f1".to_string()), Query(query()))
            .await
            .unwrap();
        assert_eq!(by_flow.data.unwrap().len(), 2);

        let Json(none) = list_flow_runs(State(state), Path("other".to_string()), Query(query()))
            .await
            .unwrap();
        assert!(none.data.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_run_and_zero_limit() {
        let state = test_state().await;
        let missing = get_run(State(state.clone()), Path(Uuid::now_v7())).await;
        assert!(matches!(missing, Err(AppError::Service(_))));

        let zero = list_runs(State(state), Query(ListRunsQuery { limit: 0, flow: None })).await;
        assert!(matches!(zero, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_preview_flag_defaults_off() {
        assert!(!request(json!({ "nodes": [], "edges": [] })).preview);
        assert!(request(json!({ "nodes": [], "edges": [], "preview": true })).preview);
    }
}
