//! The partial update engine.
//!
//! Every write to a managed entity goes through [`PartialUpdateEngine`]: it
//! applies the field policy, builds a minimal mutation, runs it against the
//! [`EntityStore`](vitrine_core::store::EntityStore) and orchestrates the
//! artifact side effects (compensation on failure, detached cleanup of
//! superseded files on success).

mod detached;
mod engine;

pub use detached::{CleanupHandle, CleanupOutcome, spawn_cleanup};
pub use engine::{Created, Deleted, PartialUpdateEngine, Updated, Upload};
