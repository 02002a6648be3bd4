//! Infrastructure adapters backing the run loop.

pub mod queue;

pub use queue::PendingQueue;
