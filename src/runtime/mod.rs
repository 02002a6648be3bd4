//! Runtime adapter and API surface.

pub mod api;
pub mod tokio_spawner;

pub use api::{EngineStatus, RunOptions};
pub use tokio_spawner::TokioSpawner;
