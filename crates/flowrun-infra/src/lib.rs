//! Infrastructure layer for flowrun.
//!
//! Contains implementations of the traits defined in `flowrun-core`:
//! SQLite run storage, the Gemini text generator, and the filesystem
//! adapters for the data directory and `config.toml`.

pub mod config;
pub mod filesystem;
pub mod llm;
pub mod sqlite;
