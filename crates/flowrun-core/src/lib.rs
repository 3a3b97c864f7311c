//! Flow execution engine and collaborator trait definitions for flowrun.
//!
//! This crate defines the engine that walks a flow graph and the "ports"
//! (repository and text generator traits) that the infrastructure layer
//! implements. It depends only on `flowrun-types` -- never on
//! `flowrun-infra` or any database/IO crate.

pub mod engine;
pub mod llm;
pub mod repository;
pub mod service;
