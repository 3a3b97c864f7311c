//! REST and WebSocket handlers.

pub mod run;
pub mod ws;
