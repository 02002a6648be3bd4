//! Configuration models for the engine, its limits, and its monitor.

pub mod engine;

pub use engine::{DependencyFailurePolicy, EngineConfig};
