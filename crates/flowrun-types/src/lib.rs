//! Shared domain types for flowrun.
//!
//! This crate contains the types exchanged between the engine, the
//! infrastructure adapters and the API layer: the flow graph, progress
//! events, run records, configuration and the repository and text generation
//! errors.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod run;
