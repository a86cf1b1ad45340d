//! Background garbage collection of the revocation registry.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{
  task::JoinHandle,
  time::{MissedTickBehavior, interval},
};
use vitrine_core::store::RevocationRegistry;

/// Spawn a task that purges expired registry entries every `every`.
///
/// Expired tokens already fail verification, so the sweep only bounds the
/// registry's size. The task runs until the returned handle is aborted.
pub fn spawn_revocation_sweeper<R>(registry: Arc<R>, every: Duration) -> JoinHandle<()>
where
  R: RevocationRegistry + 'static,
{
  tokio::spawn(async move {
    let mut ticker = interval(every.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      match registry.purge_expired(Utc::now()).await {
        Ok(0) => {}
        Ok(removed) => tracing::info!(removed, "purged expired revocation entries"),
        Err(e) => tracing::warn!(error = %e, "revocation purge failed"),
      }
    }
  })
}
