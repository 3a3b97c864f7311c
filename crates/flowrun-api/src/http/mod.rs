//! HTTP and WebSocket layer.
//!
//! REST endpoints live under `/api/v1/` and answer with the JSON envelope
//! from [`response`]. Live runs stream over `/ws/flow-run`.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
