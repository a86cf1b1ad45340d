//! [`PartialUpdateEngine`]: policy-filtered writes with artifact supersession.

use std::{future::Future, sync::Arc, time::Duration};

use bytes::Bytes;
use chrono::{TimeDelta, Utc};
use vitrine_core::{
  Error, Result,
  change::ChangeSet,
  entity::Record,
  policy::FieldPolicy,
  principal::Principal,
  schema::EntityKind,
  store::{
    ArtifactStore, EntityStore, ListQuery, Mutation, NewRecord, Page, StoreError, StoreErrorKind,
  },
  value::ArtifactRef,
};

use crate::detached::{CleanupHandle, spawn_cleanup};

/// An uploaded file waiting to be staged in the artifact store.
#[derive(Debug, Clone)]
pub struct Upload {
  pub bytes:     Bytes,
  pub file_name: String,
}

/// Result of a successful insert.
#[derive(Debug)]
pub struct Created {
  pub record:  Record,
  /// Fields removed by the policy.
  pub dropped: Vec<String>,
}

/// Result of a successful update.
#[derive(Debug)]
pub struct Updated {
  pub record:  Record,
  /// Fields removed by the policy.
  pub dropped: Vec<String>,
  /// Deletion of the superseded artifact, if one was replaced.
  pub cleanup: Option<CleanupHandle>,
}

/// Result of a successful soft delete.
#[derive(Debug)]
pub struct Deleted {
  pub record:  Record,
  pub cleanup: Option<CleanupHandle>,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Applies sparse change sets to entities.
///
/// Store calls are bounded by `store_timeout` and never retried. Ownership
/// and endpoint-level role checks are the caller's job; the engine only
/// enforces the per-field policy it is handed.
pub struct PartialUpdateEngine<S, A> {
  store:         Arc<S>,
  artifacts:     Arc<A>,
  store_timeout: Duration,
}

impl<S, A> Clone for PartialUpdateEngine<S, A> {
  fn clone(&self) -> Self {
    Self {
      store:         self.store.clone(),
      artifacts:     self.artifacts.clone(),
      store_timeout: self.store_timeout,
    }
  }
}

impl<S, A> PartialUpdateEngine<S, A>
where
  S: EntityStore,
  A: ArtifactStore + 'static,
{
  pub fn new(store: Arc<S>, artifacts: Arc<A>, store_timeout: Duration) -> Self {
    Self { store, artifacts, store_timeout }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn artifacts(&self) -> &Arc<A> { &self.artifacts }

  // ── Artifacts ─────────────────────────────────────────────────────────────

  /// Write an upload to the artifact store under the entity's table name.
  /// The returned reference must be handed to [`insert`](Self::insert) or
  /// [`apply`](Self::apply), which take over responsibility for it.
  pub async fn stage(&self, kind: EntityKind, upload: Upload) -> Result<ArtifactRef> {
    let suggested = format!("{}/{}", kind.schema().table, upload.file_name);
    match tokio::time::timeout(self.store_timeout, self.artifacts.store(upload.bytes, suggested))
      .await
    {
      Ok(Ok(reference)) => Ok(reference),
      Ok(Err(e)) => {
        tracing::error!(%kind, error = %e, "artifact store failed");
        Err(Error::Internal(format!("artifact store failed: {e}")))
      }
      Err(_) => Err(Error::Internal("artifact store timed out".to_owned())),
    }
  }

  /// Synchronously delete an artifact whose write is being abandoned.
  async fn compensate(&self, reference: Option<ArtifactRef>) {
    let Some(reference) = reference else {
      return;
    };
    let delete = self.artifacts.delete(reference.clone());
    match tokio::time::timeout(self.store_timeout, delete).await {
      Ok(Ok(())) => tracing::debug!(%reference, "compensating delete done"),
      Ok(Err(e)) => tracing::error!(%reference, error = %e, "compensating delete failed"),
      Err(_) => tracing::error!(%reference, "compensating delete timed out"),
    }
  }

  /// Run `op` and, if it fails, compensate for `artifact` before returning
  /// the error. A write whose outcome is unknown may still commit and point
  /// at `artifact`, so that artifact is left in place.
  async fn or_compensate<T>(
    &self,
    artifact: &Option<ArtifactRef>,
    op: impl Future<Output = Result<T, WriteFailure>>,
  ) -> Result<T> {
    match op.await {
      Ok(v) => Ok(v),
      Err(WriteFailure::Rejected(e)) => {
        self.compensate(artifact.clone()).await;
        Err(e)
      }
      Err(WriteFailure::Unknown(e)) => {
        if let Some(reference) = artifact {
          tracing::warn!(%reference, "write outcome unknown, keeping staged artifact");
        }
        Err(e)
      }
    }
  }

  // ── Store calls ───────────────────────────────────────────────────────────

  async fn bounded<T>(
    &self,
    kind: EntityKind,
    op: &'static str,
    call: impl Future<Output = std::result::Result<T, S::Error>>,
  ) -> Result<T> {
    self.bounded_write(kind, op, call).await.map_err(WriteFailure::into_error)
  }

  /// Like [`bounded`](Self::bounded), but keeps apart a store that answered
  /// with an error from one that did not answer in time. Dropping the call
  /// does not cancel a statement the store has already queued.
  async fn bounded_write<T>(
    &self,
    kind: EntityKind,
    op: &'static str,
    call: impl Future<Output = std::result::Result<T, S::Error>>,
  ) -> Result<T, WriteFailure> {
    match tokio::time::timeout(self.store_timeout, call).await {
      Ok(Ok(v)) => Ok(v),
      Ok(Err(e)) => Err(WriteFailure::Rejected(match e.kind() {
        StoreErrorKind::Conflict => {
          tracing::info!(%kind, op, error = %e, "unique constraint rejected write");
          Error::Conflict(format!("{kind} conflicts with an existing record"))
        }
        StoreErrorKind::Other => {
          tracing::error!(%kind, op, error = %e, "entity store failed");
          Error::Internal(format!("{op} {kind}: {e}"))
        }
      })),
      Err(_) => {
        tracing::error!(%kind, op, timeout = ?self.store_timeout, "entity store timed out");
        Err(WriteFailure::Unknown(Error::Internal(format!("{op} {kind} timed out"))))
      }
    }
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  pub async fn get(&self, kind: EntityKind, id: i64) -> Result<Record> {
    self
      .bounded(kind, "get", self.store.get(kind, id))
      .await?
      .ok_or(Error::NotFound { kind, id })
  }

  pub async fn list(&self, kind: EntityKind, query: ListQuery) -> Result<Page<Record>> {
    self.bounded(kind, "list", self.store.list(kind, query)).await
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  /// Create a row. `actor` is `None` for self-registration, in which case no
  /// restricted field survives the policy.
  ///
  /// If `artifact` was staged and anything fails, it is deleted before the
  /// error is returned, unless the store timed out: the row may then still
  /// be written, and it would point at the artifact.
  pub async fn insert(
    &self,
    actor: Option<&Principal>,
    kind: EntityKind,
    changes: ChangeSet,
    policy: &FieldPolicy,
    artifact: Option<ArtifactRef>,
  ) -> Result<Created> {
    self
      .or_compensate(&artifact, self.try_insert(actor, kind, changes, policy, artifact.clone()))
      .await
  }

  async fn try_insert(
    &self,
    actor: Option<&Principal>,
    kind: EntityKind,
    changes: ChangeSet,
    policy: &FieldPolicy,
    artifact: Option<ArtifactRef>,
  ) -> Result<Created, WriteFailure> {
    let schema = kind.schema();
    let (mut fields, dropped) = policy.partition(actor.map(|p| p.role), changes);
    attach_artifact(kind, &mut fields, artifact)?;

    if let Some(column) = schema.artifact_field()
      && schema.needs_artifact
      && !fields.contains(column)
    {
      return Err(Error::invalid_field(column, "a file upload is required").into());
    }
    fields.require_fields(schema)?;

    let new = NewRecord {
      fields,
      created_by: actor.map(|p| p.subject_id),
      created_at: Utc::now(),
    };
    let record = self
      .bounded_write(kind, "insert", self.store.insert(kind, new))
      .await?;

    tracing::info!(%kind, id = record.id, created_by = ?record.audit.created_by, "created");
    Ok(Created { record, dropped })
  }

  /// Apply a sparse change set to a live entity.
  ///
  /// Restricted fields the principal may not set are dropped, not rejected.
  /// `edited_by` is always the principal and `edited_at` always moves
  /// strictly forward. If `new_artifact` replaces an existing reference, the
  /// old one is deleted on a detached task once the row is committed; if the
  /// write fails, `new_artifact` itself is deleted before returning. A
  /// timed-out write deletes neither, since it may still commit.
  pub async fn apply(
    &self,
    principal: &Principal,
    kind: EntityKind,
    id: i64,
    changes: ChangeSet,
    policy: &FieldPolicy,
    new_artifact: Option<ArtifactRef>,
  ) -> Result<Updated> {
    let (record, dropped, superseded) = self
      .or_compensate(
        &new_artifact,
        self.try_apply(principal, kind, id, changes, policy, new_artifact.clone()),
      )
      .await?;

    if !dropped.is_empty() {
      tracing::info!(%kind, id, subject_id = principal.subject_id, ?dropped, "ignored restricted fields");
    }

    let cleanup = superseded
      .filter(|old| Some(old) != new_artifact.as_ref())
      .map(|old| spawn_cleanup(self.artifacts.clone(), old, "superseded"));

    Ok(Updated { record, dropped, cleanup })
  }

  async fn try_apply(
    &self,
    principal: &Principal,
    kind: EntityKind,
    id: i64,
    changes: ChangeSet,
    policy: &FieldPolicy,
    new_artifact: Option<ArtifactRef>,
  ) -> Result<(Record, Vec<String>, Option<ArtifactRef>), WriteFailure> {
    let replacing = new_artifact.is_some();
    let (mut set, dropped) = policy.partition(Some(principal.role), changes);
    attach_artifact(kind, &mut set, new_artifact)?;

    let prior = self.get(kind, id).await?;

    // The store keeps microseconds, so a one-microsecond floor keeps
    // `edited_at` strictly increasing even when the clock has not moved.
    let floor = prior.audit.last_modified() + TimeDelta::microseconds(1);
    let mutation = Mutation {
      set,
      edited_by: principal.subject_id,
      edited_at: Utc::now().max(floor),
    };

    let record = self
      .bounded_write(kind, "update", self.store.update(kind, id, mutation))
      .await?
      .ok_or(Error::NotFound { kind, id })?;

    tracing::info!(%kind, id, edited_by = principal.subject_id, "updated");
    let superseded = if replacing { prior.artifact() } else { None };
    Ok((record, dropped, superseded))
  }

  /// Soft-delete a live entity. Deleting twice is `NotFound` the second
  /// time. The entity's artifact, if any, is cleaned up in the background.
  pub async fn soft_delete(
    &self,
    principal: &Principal,
    kind: EntityKind,
    id: i64,
  ) -> Result<Deleted> {
    let record = self
      .bounded(
        kind,
        "delete",
        self.store.soft_delete(kind, id, principal.subject_id, Utc::now()),
      )
      .await?
      .ok_or(Error::NotFound { kind, id })?;

    tracing::info!(%kind, id, deleted_by = principal.subject_id, "soft-deleted");
    let cleanup = record
      .artifact()
      .map(|r| spawn_cleanup(self.artifacts.clone(), r, "soft delete"));

    Ok(Deleted { record, cleanup })
  }
}

/// Why a write did not succeed.
enum WriteFailure {
  /// Nothing was committed.
  Rejected(Error),
  /// The store did not answer in time; the write may still commit.
  Unknown(Error),
}

impl WriteFailure {
  fn into_error(self) -> Error {
    match self {
      WriteFailure::Rejected(e) | WriteFailure::Unknown(e) => e,
    }
  }
}

impl From<Error> for WriteFailure {
  fn from(e: Error) -> Self { WriteFailure::Rejected(e) }
}

/// Put a staged artifact into its entity's artifact column.
fn attach_artifact(
  kind: EntityKind,
  fields: &mut ChangeSet,
  artifact: Option<ArtifactRef>,
) -> Result<()> {
  let Some(artifact) = artifact else {
    return Ok(());
  };
  let column = kind
    .schema()
    .artifact_field()
    .ok_or_else(|| Error::invalid_field("image", format!("a {kind} has no file attachment")))?;
  fields.insert(column, artifact);
  Ok(())
}
