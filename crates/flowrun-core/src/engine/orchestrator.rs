//! Run orchestration.
//!
//! [`FlowEngine::run`] drives one run from the start node to a terminal
//! event: `Init -> Started -> step loop -> Finished(success | failed)`.
//! Exactly one `run:finished` is emitted per run and nothing after it. A
//! `node:failed` is always followed directly by `run:finished{failed}`.
//!
//! Execution is strictly sequential; each node is awaited before the next
//! one is chosen.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use flowrun_types::config::EngineConfig;
use flowrun_types::event::ProgressEvent;
use flowrun_types::graph::{FlowGraph, FlowNode, NodeType};
use futures_util::Stream;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::llm::box_generator::BoxTextGenerator;

use super::ai::run_ai_node;
use super::error::{FlowError, NodeError, type_name};
use super::events::{self, EventReceiver, EventSink};
use super::script::{run_predicate, run_transform};
use super::start::expand_fields;
use super::walker::{GraphWalker, StepCounter};

type Data = Map<String, Value>;

/// What a node's evaluation produced, before the next node is chosen.
enum Outcome {
    /// Replace the threaded data.
    Data(Data),
    /// Follow the matching branch edge.
    Branch(bool),
    /// End the run successfully.
    Terminal,
    /// Continue without touching the data.
    PassThrough,
}

enum Transition<'g> {
    Next(&'g FlowNode),
    Finish,
}

// ---------------------------------------------------------------------------
// FlowEngine
// ---------------------------------------------------------------------------

/// Executes flow graphs. Cheap to clone; runs share nothing mutable.
#[derive(Debug, Clone)]
pub struct FlowEngine {
    config: EngineConfig,
    generator: Arc<BoxTextGenerator>,
}

impl FlowEngine {
    pub fn new(config: EngineConfig, generator: Arc<BoxTextGenerator>) -> Self {
        Self { config, generator }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `graph` to completion, writing progress into `sink`.
    ///
    /// The returned error is the same failure reported by the terminal
    /// `run:finished` event.
    pub async fn run<S: EventSink>(
        &self,
        graph: &FlowGraph,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<Data, FlowError> {
        let walker = GraphWalker::new(graph);

        let Some(start) = walker.start() else {
            return fail(sink, FlowError::NoStartNode).await;
        };
        let mut data = match &start.data {
            Value::Object(map) => map.clone(),
            other => {
                let got = type_name(other);
                return fail(sink, FlowError::InvalidStartData { got }).await;
            }
        };
        if self.config.expand_start_fields {
            data = expand_fields(data, self.config.parse_json_values);
        }

        info!(
            flow_id = start.flow_id.as_deref(),
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            step_limit = self.config.step_limit,
            "flow run started"
        );
        sink.emit(ProgressEvent::RunStarted {
            flow_id: start.flow_id.clone(),
            start_data: data.clone(),
        })
        .await;

        let mut current = match walker.follow_normal(&start.id) {
            Ok(next) => next,
            Err(NodeError::MissingNode(id)) => return fail(sink, FlowError::MissingNode(id)).await,
            Err(other) => return fail(sink, node_failure(start, other)).await,
        };

        let mut steps = StepCounter::new(self.config.step_limit);
        while let Some(node) = current {
            if cancel.is_cancelled() {
                return fail(sink, FlowError::Cancelled).await;
            }
            let step = match steps.advance() {
                Ok(step) => step,
                Err(err) => {
                    warn!(limit = steps.limit(), "step limit exceeded");
                    return fail(sink, err).await;
                }
            };

            debug!(node_id = %node.id, node_type = %node.node_type, step, "node started");
            sink.emit(ProgressEvent::NodeStarted {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
                step,
            })
            .await;

            match self.step(&walker, node, step, &mut data, sink, cancel).await {
                Ok(Transition::Next(next)) => current = Some(next),
                Ok(Transition::Finish) => return finish(sink, data).await,
                Err(err) => {
                    warn!(node_id = %node.id, node_type = %node.node_type, step, error = %err, "node failed");
                    sink.emit(ProgressEvent::NodeFailed {
                        node_id: node.id.clone(),
                        node_type: node.node_type.clone(),
                        step,
                        error: err.to_string(),
                    })
                    .await;
                    return fail(sink, node_failure(node, err)).await;
                }
            }
        }

        finish(sink, data).await
    }

    /// Run `graph` on a new task, exposing its events through a [`RunHandle`].
    ///
    /// Must be called from within a Tokio runtime. The task inherits the
    /// caller's tracing span.
    pub fn spawn(&self, graph: FlowGraph, cancel: CancellationToken) -> RunHandle {
        let (mut tx, rx) = events::channel(self.config.event_buffer);
        let engine = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(
            async move { engine.run(&graph, &mut tx, &token).await }.in_current_span(),
        );
        RunHandle {
            events: rx,
            task,
            cancel,
        }
    }

    /// Execute one node, emit its `node:succeeded`, and pick the next node.
    ///
    /// An output node ends the run without a `node:succeeded` of its own.
    async fn step<'g, S: EventSink>(
        &self,
        walker: &GraphWalker<'g>,
        node: &'g FlowNode,
        step: u32,
        data: &mut Data,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<Transition<'g>, NodeError> {
        let outcome = self.with_deadline(self.evaluate(node, data, cancel)).await?;

        let dead_end = |branch| NodeError::DeadEnd {
            node_id: node.id.clone(),
            branch,
        };

        match outcome {
            Outcome::Data(next_data) => {
                *data = next_data;
                succeeded(sink, node, step, data.clone()).await;
                walker.follow_normal(&node.id)?.map(Transition::Next).ok_or_else(|| dead_end(None))
            }
            Outcome::Branch(branch) => {
                let mut shown = data.clone();
                shown.insert("__branch".to_string(), Value::Bool(branch));
                succeeded(sink, node, step, shown).await;
                debug!(node_id = %node.id, branch, "branch selected");
                walker
                    .follow_branch(&node.id, branch)?
                    .map(Transition::Next)
                    .ok_or_else(|| dead_end(Some(branch)))
            }
            Outcome::Terminal => Ok(Transition::Finish),
            Outcome::PassThrough => {
                debug!(node_id = %node.id, node_type = %node.node_type, "passing through node");
                succeeded(sink, node, step, data.clone()).await;
                walker.follow_normal(&node.id)?.map(Transition::Next).ok_or_else(|| dead_end(None))
            }
        }
    }

    async fn evaluate(
        &self,
        node: &FlowNode,
        data: &Data,
        cancel: &CancellationToken,
    ) -> Result<Outcome, NodeError> {
        match node.node_type {
            NodeType::Script => {
                let input = Value::Object(data.clone());
                run_transform(node.script(), &input, cancel).await.map(Outcome::Data)
            }
            NodeType::Conditional => {
                let input = Value::Object(data.clone());
                run_predicate(node.script(), &input, cancel).await.map(Outcome::Branch)
            }
            NodeType::Ai => run_ai_node(
                &self.generator,
                node.script(),
                node.data_str("result_field"),
                data.clone(),
                cancel,
            )
            .await
            .map(Outcome::Data),
            NodeType::Output => Ok(Outcome::Terminal),
            NodeType::Start | NodeType::Plus | NodeType::Other(_) => Ok(Outcome::PassThrough),
        }
    }

    async fn with_deadline<T>(
        &self,
        fut: impl Future<Output = Result<T, NodeError>>,
    ) -> Result<T, NodeError> {
        match self.config.node_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), fut)
                .await
                .map_err(|_| NodeError::Timeout { secs })?,
            None => fut.await,
        }
    }
}

async fn succeeded<S: EventSink>(sink: &mut S, node: &FlowNode, step: u32, data: Data) {
    sink.emit(ProgressEvent::NodeSucceeded {
        node_id: node.id.clone(),
        node_type: node.node_type.clone(),
        step,
        data,
    })
    .await;
}

async fn finish<S: EventSink>(sink: &mut S, data: Data) -> Result<Data, FlowError> {
    info!(keys = data.len(), "flow run succeeded");
    sink.emit(ProgressEvent::finished_ok(data.clone())).await;
    Ok(data)
}

async fn fail<S: EventSink>(sink: &mut S, err: FlowError) -> Result<Data, FlowError> {
    info!(error = %err, "flow run failed");
    sink.emit(ProgressEvent::finished_err(err.to_string())).await;
    Err(err)
}

fn node_failure(node: &FlowNode, source: NodeError) -> FlowError {
    FlowError::Node {
        node_type: node.node_type.clone(),
        node_id: node.id.clone(),
        source,
    }
}

// ---------------------------------------------------------------------------
// RunHandle
// ---------------------------------------------------------------------------

/// A run executing on its own task.
#[derive(Debug)]
pub struct RunHandle {
    events: EventReceiver,
    task: JoinHandle<Result<Data, FlowError>>,
    cancel: CancellationToken,
}

impl RunHandle {
    /// Request cancellation. The run fails with `Cancelled` at its next
    /// checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    /// The run's events as a stream. The run keeps going in the background.
    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        self.events.into_stream()
    }

    /// Drain the remaining events and wait for the result.
    pub async fn finish(self) -> (Vec<ProgressEvent>, Result<Data, FlowError>) {
        let events = self.events.collect().await;
        let result = match self.task.await {
            Ok(result) => result,
            Err(err) => Err(FlowError::Internal(err.to_string())),
        };
        (events, result)
    }
}
