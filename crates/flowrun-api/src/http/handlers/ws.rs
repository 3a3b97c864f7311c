//! WebSocket handler for live flow runs.
//!
//! The `/ws/flow-run` endpoint greets the client with `{"type":"hello"}` and
//! then accepts JSON commands:
//!
//! - `run:start { nodes, edges, preview? }` records a run and streams its
//!   progress events, each tagged with `runId`, ending with `run:finished`.
//! - `run:cancel { runId }` cancels one of this connection's runs.
//! - `ping` is answered with `pong`.
//!
//! Several runs may be in flight on one connection; their events interleave
//! but each run's own order is preserved. Disconnecting cancels every run
//! the connection started.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use dashmap::DashMap;
use flowrun_core::engine::events;
use flowrun_types::event::ProgressEvent;
use flowrun_types::graph::FlowGraph;
use flowrun_types::run::FlowRun;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::run::RunRequest;
use crate::state::{AppState, ConcreteRunService};

const OUTBOUND_BUFFER: usize = 256;

type ActiveRuns = Arc<DashMap<Uuid, CancellationToken>>;

/// Incoming command from a WebSocket client.
///
/// Unknown or malformed messages are answered with an `error` frame.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WsCommand {
    #[serde(rename = "run:start")]
    RunStart(RunRequest),
    #[serde(rename = "run:cancel")]
    RunCancel {
        #[serde(rename = "runId")]
        run_id: Uuid,
    },
    #[serde(rename = "ping")]
    Ping,
}

/// Upgrade to a WebSocket. Mounted at `/ws/flow-run`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
    let active: ActiveRuns = Arc::new(DashMap::new());

    tracing::debug!("WebSocket connected");
    let hello = json!({ "type": "hello", "msg": "Welcome!" }).to_string();
    if ws_sender.send(Message::Text(hello.into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            // Frames produced by commands and run tasks.
            Some(frame) = out_rx.recv() => {
                if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }

            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        process_command(&text, &state, &out_tx, &active).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!("WebSocket receive error: {err}");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    for entry in active.iter() {
        entry.value().cancel();
    }
    tracing::debug!(cancelled = active.len(), "WebSocket connection closed");
}

/// Parse and act on one client frame. Replies go through `out`.
async fn process_command(
    text: &str,
    state: &AppState,
    out: &mpsc::Sender<String>,
    active: &ActiveRuns,
) {
    let cmd: WsCommand = match serde_json::from_str(text) {
        Ok(cmd) => cmd,
        Err(err) => {
            tracing::warn!(error = %err, "Ignoring malformed WebSocket command");
            reply(out, error_frame(None, &format!("invalid command: {err}")));
            return;
        }
    };

    match cmd {
        WsCommand::RunStart(request) => {
            let service = state.service(request.preview).clone();
            let run = match service.start_run(&request.graph).await {
                Ok(run) => run,
                Err(err) => {
                    tracing::error!(error = %err, "failed to record run");
                    reply(out, error_frame(None, &err.to_string()));
                    return;
                }
            };

            let token = CancellationToken::new();
            active.insert(run.id, token.clone());

            let out = out.clone();
            let active = active.clone();
            tokio::spawn(async move {
                let run_id = run.id;
                stream_run(service, run, request.graph, token, out).await;
                active.remove(&run_id);
            });
        }
        WsCommand::RunCancel { run_id } => match active.get(&run_id) {
            Some(token) => {
                token.cancel();
                tracing::info!(%run_id, "Run cancellation requested via WebSocket");
            }
            None => {
                reply(out, error_frame(Some(&run_id), "no active run with this id"));
            }
        },
        WsCommand::Ping => reply(out, json!({ "type": "pong" }).to_string()),
    }
}

/// Execute a recorded run, forwarding its events to the connection.
async fn stream_run(
    service: Arc<ConcreteRunService>,
    run: FlowRun,
    graph: FlowGraph,
    cancel: CancellationToken,
    out: mpsc::Sender<String>,
) {
    let run_id = run.id;
    let (mut tx, mut rx) = events::channel(service.engine().config().event_buffer);

    let forward = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if out.send(tag_event(&run_id, &event)).await.is_err() {
                break;
            }
        }
    });

    match service.execute(&run, &graph, &mut tx, &cancel).await {
        Ok(summary) => tracing::info!(%run_id, status = %summary.status, "WebSocket run finished"),
        Err(err) => tracing::error!(%run_id, error = %err, "failed to record run outcome"),
    }

    drop(tx);
    if let Err(err) = forward.await {
        tracing::debug!(%run_id, "event forwarder ended abnormally: {err}");
    }
}

/// Serialize `event` with the owning run's id added as `runId`.
fn tag_event(run_id: &Uuid, event: &ProgressEvent) -> String {
    let mut value = serde_json::to_value(event).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("runId".to_string(), Value::String(run_id.to_string()));
    }
    value.to_string()
}

fn error_frame(run_id: Option<&Uuid>, message: &str) -> String {
    let mut frame = json!({ "type": "error", "message": message });
    if let Some(id) = run_id {
        frame["runId"] = Value::String(id.to_string());
    }
    frame.to_string()
}

/// Queue a command reply without waiting.
///
/// Replies are queued from the connection loop, which is also the only
/// reader of the outbound queue, so they must never wait for capacity.
/// When run events have filled the queue the reply is dropped.
fn reply(out: &mpsc::Sender<String>, frame: String) {
    match out.try_send(frame) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!("Outbound queue full, dropping WebSocket reply");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            tracing::debug!("Failed to queue frame (client disconnecting)");
        }
    }
}
