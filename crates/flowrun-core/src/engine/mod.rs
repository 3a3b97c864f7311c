//! The flow execution engine.
//!
//! - `walker`: edge selection, start node lookup, step bound
//! - `sandbox` / `script`: the JEXL evaluator behind script and conditional nodes
//! - `prompt` / `ai`: placeholder expansion and the text generator bridge
//! - `orchestrator`: the run state machine and its event protocol

pub mod ai;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod prompt;
pub mod sandbox;
pub mod script;
pub mod start;
pub mod walker;

pub use error::{FlowError, NodeError};
pub use events::{EventReceiver, EventSender, EventSink, channel};
pub use orchestrator::{FlowEngine, RunHandle};
