//! Text generation abstractions.
//!
//! - `TextGenerator`: RPITIT trait for concrete backends
//! - `BoxTextGenerator`: object-safe wrapper for dynamic dispatch
//! - `DisabledGenerator`: stand-in used when no backend is configured

pub mod box_generator;
pub mod disabled;
pub mod generator;
