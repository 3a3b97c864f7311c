//! Business logic services (use cases).
//!
//! Services orchestrate repository calls and the engine. They depend on
//! traits (ports) -- never on concrete infrastructure implementations.

pub mod flow_run;
