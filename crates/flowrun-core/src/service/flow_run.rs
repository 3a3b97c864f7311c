//! Flow run service.
//!
//! Wraps each engine invocation with a persisted run record: the row is
//! created as `running`, then finished as `success` with the result or
//! `failed` with an empty end object and the error message.

use flowrun_types::error::RepositoryError;
use flowrun_types::graph::FlowGraph;
use flowrun_types::run::{FlowRun, FlowRunStatus, RunSummary};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::engine::events::EventSink;
use crate::engine::orchestrator::FlowEngine;
use crate::repository::flow_run::FlowRunRepository;

/// Errors from the run service. A failed flow is not an error here; it is a
/// `RunSummary` with status `failed`.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("storage error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("run {0} not found")]
    NotFound(Uuid),
}

/// Runs flows and records them.
pub struct FlowRunService<R: FlowRunRepository> {
    repo: R,
    engine: FlowEngine,
}

impl<R: FlowRunRepository> FlowRunService<R> {
    pub fn new(repo: R, engine: FlowEngine) -> Self {
        Self { repo, engine }
    }

    pub fn engine(&self) -> &FlowEngine {
        &self.engine
    }

    /// Create the `running` record for `graph`.
    ///
    /// `start_data` is the first node's payload and `flow_id` the first
    /// node's flow id, whatever their types.
    pub async fn start_run(&self, graph: &FlowGraph) -> Result<FlowRun, ServiceError> {
        let start_data = graph.nodes.first().map(|n| n.data.clone());
        let run = FlowRun::started(graph.flow_id().map(str::to_string), start_data);
        self.repo.create_run(&run).await?;
        tracing::info!(run_id = %run.id, flow_id = run.flow_id.as_deref(), "run recorded");
        Ok(run)
    }

    /// Execute `graph` for an already created `run` and record the outcome.
    pub async fn execute<S: EventSink>(
        &self,
        run: &FlowRun,
        graph: &FlowGraph,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, ServiceError> {
        let span = info_span!("flow_run", run_id = %run.id);
        let outcome = self.engine.run(graph, sink, cancel).instrument(span).await;

        let summary = match outcome {
            Ok(result) => {
                self.repo
                    .finish_run(&run.id, FlowRunStatus::Success, &Value::Object(result.clone()), None)
                    .await?;
                RunSummary {
                    run_id: run.id,
                    status: FlowRunStatus::Success,
                    result: Some(result),
                    error: None,
                }
            }
            Err(err) => {
                let message = err.to_string();
                self.repo
                    .finish_run(
                        &run.id,
                        FlowRunStatus::Failed,
                        &Value::Object(Map::new()),
                        Some(&message),
                    )
                    .await?;
                RunSummary {
                    run_id: run.id,
                    status: FlowRunStatus::Failed,
                    result: None,
                    error: Some(message),
                }
            }
        };
        Ok(summary)
    }

    /// Record and execute `graph` in one call.
    pub async fn run<S: EventSink>(
        &self,
        graph: &FlowGraph,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, ServiceError> {
        let run = self.start_run(graph).await?;
        self.execute(&run, graph, sink, cancel).await
    }

    pub async fn get_run(&self, id: &Uuid) -> Result<FlowRun, ServiceError> {
        self.repo
            .get_run(id)
            .await?
            .ok_or(ServiceError::NotFound(*id))
    }

    /// Newest runs first, optionally restricted to one flow.
    pub async fn list_runs(
        &self,
        flow_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<FlowRun>, ServiceError> {
        let runs = match flow_id {
            Some(flow_id) => self.repo.list_runs_by_flow(flow_id, limit).await?,
            None => self.repo.list_recent_runs(limit).await?,
        };
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use flowrun_types::config::EngineConfig;
    use flowrun_types::event::ProgressEvent;
    use flowrun_types::graph::{FlowEdge, FlowNode, NodeType};
    use serde_json::json;

    use super::*;
    use crate::llm::box_generator::BoxTextGenerator;
    use crate::llm::disabled::DisabledGenerator;

    #[derive(Clone, Default)]
    struct MemoryRepo {
        runs: Arc<Mutex<Vec<FlowRun>>>,
    }

    impl FlowRunRepository for MemoryRepo {
        async fn create_run(&self, run: &FlowRun) -> Result<(), RepositoryError> {
            self.runs.lock().unwrap().push(run.clone());
            Ok(())
        }

        async fn finish_run(
            &self,
            id: &Uuid,
            status: FlowRunStatus,
            end_data: &Value,
            error: Option<&str>,
        ) -> Result<(), RepositoryError> {
            let mut runs = self.runs.lock().unwrap();
            let run = runs
                .iter_mut()
                .find(|r| r.id == *id)
                .ok_or(RepositoryError::NotFound)?;
            run.status = status;
            run.end_data = Some(end_data.clone());
            run.error = error.map(str::to_string);
            Ok(())
        }

        async fn get_run(&self, id: &Uuid) -> Result<Option<FlowRun>, RepositoryError> {
            Ok(self.runs.lock().unwrap().iter().find(|r| r.id == *id).cloned())
        }

        async fn list_runs_by_flow(
            &self,
            flow_id: &str,
            limit: u32,
        ) -> Result<Vec<FlowRun>, RepositoryError> {
            Ok(self
                .runs
                .lock()
                .unwrap()
                .iter()
                .rev()
                .filter(|r| r.flow_id.as_deref() == Some(flow_id))
                .take(limit as usize)
                .cloned()
                .collect())
        }

        async fn list_recent_runs(&self, limit: u32) -> Result<Vec<FlowRun>, RepositoryError> {
            Ok(self
                .runs
                .lock()
                .unwrap()
                .iter()
                .rev()
                .take(limit as usize)
                .cloned()
                .collect())
        }
    }

    fn service(repo: MemoryRepo) -> FlowRunService<MemoryRepo> {
        let engine = FlowEngine::new(
            EngineConfig::default(),
            Arc::new(BoxTextGenerator::new(DisabledGenerator)),
        );
        FlowRunService::new(repo, engine)
    }

    fn graph(script: &str) -> FlowGraph {
        FlowGraph::new(
            vec![
                FlowNode::new("start", NodeType::Start)
                    .with_flow_id("flow-1")
                    .with_data(json!({ "n": 1 })),
                FlowNode::new("s", NodeType::Script).with_data(json!({ "script": script })),
                FlowNode::new("out", NodeType::Output),
            ],
            vec![FlowEdge::new("start", "s"), FlowEdge::new("s", "out")],
        )
    }

    #[tokio::test]
    async fn test_successful_run_is_recorded() {
        let repo = MemoryRepo::default();
        let service = service(repo.clone());
        let mut events: Vec<ProgressEvent> = Vec::new();

        let summary = service
            .run(&graph("{ n: data.n * 10 }"), &mut events, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.status, FlowRunStatus::Success);
        assert_eq!(summary.result.clone().map(Value::Object), Some(json!({ "n": 10 })));

        let stored = service.get_run(&summary.run_id).await.unwrap();
        assert_eq!(stored.status, FlowRunStatus::Success);
        assert_eq!(stored.flow_id.as_deref(), Some("flow-1"));
        assert_eq!(stored.start_data, Some(json!({ "n": 1 })));
        assert_eq!(stored.end_data, Some(json!({ "n": 10 })));
        assert!(stored.error.is_none());
        assert!(events.last().is_some_and(ProgressEvent::is_terminal));
    }

    #[tokio::test]
    async fn test_failed_run_stores_empty_end_data() {
        let repo = MemoryRepo::default();
        let service = service(repo.clone());

        let summary = service
            .run(&graph("123"), &mut Vec::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.status, FlowRunStatus::Failed);
        let error = summary.error.clone().unwrap();
        assert!(error.starts_with("[FlowError][scriptNode][s] [OutputTypeError]"));

        let stored = service.get_run(&summary.run_id).await.unwrap();
        assert_eq!(stored.status, FlowRunStatus::Failed);
        assert_eq!(stored.end_data, Some(json!({})));
        assert_eq!(stored.error.as_deref(), Some(error.as_str()));
    }

    #[tokio::test]
    async fn test_list_and_missing_run() {
        let service = service(MemoryRepo::default());
        let cancel = CancellationToken::new();
        service.run(&graph("data"), &mut Vec::new(), &cancel).await.unwrap();
        service.run(&graph("data"), &mut Vec::new(), &cancel).await.unwrap();

        assert_eq!(service.list_runs(Some("flow-1"), 10).await.unwrap().len(), 2);
        assert_eq!(service.list_runs(Some("other"), 10).await.unwrap().len(), 0);
        assert_eq!(service.list_runs(None, 1).await.unwrap().len(), 1);

        let missing = Uuid::now_v7();
        assert!(matches!(
            service.get_run(&missing).await,
            Err(ServiceError::NotFound(id)) if id == missing
        ));
    }
}
