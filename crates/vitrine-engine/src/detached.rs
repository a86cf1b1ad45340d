//! Fire-and-forget artifact cleanup.
//!
//! A cleanup runs on its own task, so it outlives the request that scheduled
//! it. It is attempted once: failures are logged and dropped, and never touch
//! the database row that was already committed.

use std::sync::Arc;

use tokio::task::JoinHandle;
use vitrine_core::{store::ArtifactStore, value::ArtifactRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
  Deleted,
  Failed,
}

/// Handle to a scheduled cleanup. Dropping it detaches the task; awaiting
/// [`finished`](Self::finished) is only useful in tests and diagnostics.
#[derive(Debug)]
pub struct CleanupHandle {
  reference: ArtifactRef,
  task:      JoinHandle<CleanupOutcome>,
}

impl CleanupHandle {
  pub fn reference(&self) -> &ArtifactRef { &self.reference }

  pub async fn finished(self) -> CleanupOutcome {
    self.task.await.unwrap_or(CleanupOutcome::Failed)
  }
}

/// Delete `reference` in the background. `cause` names the operation that
/// orphaned it, for the logs.
pub fn spawn_cleanup<A>(
  artifacts: Arc<A>,
  reference: ArtifactRef,
  cause: &'static str,
) -> CleanupHandle
where
  A: ArtifactStore + 'static,
{
  let target = reference.clone();
  let task = tokio::spawn(async move {
    match artifacts.delete(target.clone()).await {
      Ok(()) => {
        tracing::debug!(reference = %target, cause, "artifact cleaned up");
        CleanupOutcome::Deleted
      }
      Err(e) => {
        tracing::warn!(reference = %target, cause, error = %e, "artifact cleanup failed");
        CleanupOutcome::Failed
      }
    }
  });
  CleanupHandle { reference, task }
}
