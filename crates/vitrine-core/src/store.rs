//! Storage traits and supporting query types.
//!
//! The traits are implemented by backends (`vitrine-store-sqlite`,
//! `vitrine-artifacts`). The update engine and the HTTP layer depend on these
//! abstractions, not on any concrete backend.
//!
//! All methods take owned arguments and return `Send` futures so the traits
//! can be used from multi-threaded runtimes (tokio with `axum`).

use std::future::Future;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
  change::ChangeSet,
  entity::Record,
  principal::Role,
  schema::EntityKind,
  value::ArtifactRef,
};

// ─── Error classification ────────────────────────────────────────────────────

/// What the engine needs to know about a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
  /// A unique constraint rejected the write.
  Conflict,
  /// Anything else; reported to clients as an internal failure.
  Other,
}

pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> StoreErrorKind;
}

// ─── Write and query types ───────────────────────────────────────────────────

/// A row to insert. `fields` has already passed the field policy.
#[derive(Debug, Clone)]
pub struct NewRecord {
  pub fields:     ChangeSet,
  pub created_by: Option<i64>,
  pub created_at: DateTime<Utc>,
}

/// A minimal update: only the fields in `set`, plus the edit bookkeeping.
#[derive(Debug, Clone)]
pub struct Mutation {
  pub set:       ChangeSet,
  pub edited_by: i64,
  pub edited_at: DateTime<Utc>,
}

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Parameters for [`EntityStore::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
  /// 1-based page number.
  pub page:   i64,
  pub limit:  i64,
  /// Restrict to rows with this status, for entities that have one.
  pub status: Option<bool>,
  /// Restrict to accounts with this role; ignored for other entities.
  pub role:   Option<Role>,
}

impl ListQuery {
  /// Normalise raw paging input: pages start at 1 and a limit outside
  /// `1..=100` falls back to the default.
  pub fn new(page: Option<i64>, limit: Option<i64>, status: Option<bool>) -> Self {
    let page = page.filter(|p| *p >= 1).unwrap_or(1);
    let limit = limit
      .filter(|l| (1..=MAX_PAGE_SIZE).contains(l))
      .unwrap_or(DEFAULT_PAGE_SIZE);
    Self { page, limit, status, role: None }
  }

  pub fn with_role(mut self, role: Option<Role>) -> Self {
    self.role = role;
    self
  }

  pub fn offset(&self) -> i64 { (self.page - 1).saturating_mul(self.limit) }
}

impl Default for ListQuery {
  fn default() -> Self { Self::new(None, None, None) }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
  pub data:  Vec<T>,
  pub total: i64,
  pub page:  i64,
  pub limit: i64,
}

impl<T> Page<T> {
  pub fn total_pages(&self) -> i64 {
    if self.limit <= 0 {
      return 0;
    }
    (self.total + self.limit - 1) / self.limit
  }
}

/// Login material for one live account.
#[derive(Debug, Clone)]
pub struct AccountCredentials {
  pub subject_id:    i64,
  pub password_hash: String,
  pub role:          Role,
}

// ─── Entity store ────────────────────────────────────────────────────────────

/// Row-level access to every managed entity.
///
/// Every method excludes soft-deleted rows: a row with `deleted_at` set is
/// invisible to reads and unaffected by writes.
pub trait EntityStore: Send + Sync {
  type Error: StoreError;

  /// Conditional point read. `None` if absent or soft-deleted.
  fn get(
    &self,
    kind: EntityKind,
    id: i64,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + '_;

  /// Paged listing in descending id order.
  fn list(
    &self,
    kind: EntityKind,
    query: ListQuery,
  ) -> impl Future<Output = Result<Page<Record>, Self::Error>> + Send + '_;

  fn insert(
    &self,
    kind: EntityKind,
    record: NewRecord,
  ) -> impl Future<Output = Result<Record, Self::Error>> + Send + '_;

  /// Conditional point update returning the changed row, or `None` if no
  /// live row matched.
  fn update(
    &self,
    kind: EntityKind,
    id: i64,
    mutation: Mutation,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + '_;

  /// Set `deleted_at`/`deleted_by` on a live row and return the deleted
  /// row, or `None` if no live row matched.
  fn soft_delete(
    &self,
    kind: EntityKind,
    id: i64,
    deleted_by: i64,
    deleted_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + '_;
}

/// Credential lookup used by login.
pub trait AccountStore: Send + Sync {
  type Error: StoreError;

  /// Find a live account by username.
  fn find_credentials(
    &self,
    username: String,
  ) -> impl Future<Output = Result<Option<AccountCredentials>, Self::Error>> + Send + '_;
}

// ─── Revocation registry ─────────────────────────────────────────────────────

/// Revoked-but-unexpired credentials.
pub trait RevocationRegistry: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Record `token` as revoked until `expires_at`. Revoking twice is not an
  /// error.
  fn revoke(
    &self,
    token: String,
    expires_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn is_revoked(
    &self,
    token: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete entries with `expires_at <= now`, returning how many went.
  fn purge_expired(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}

// ─── Artifact store ──────────────────────────────────────────────────────────

/// Path-addressable blob storage for uploaded files.
pub trait ArtifactStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn store(
    &self,
    bytes: Bytes,
    suggested_name: String,
  ) -> impl Future<Output = Result<ArtifactRef, Self::Error>> + Send + '_;

  /// Delete by reference. Deleting something already gone succeeds.
  fn delete(
    &self,
    reference: ArtifactRef,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
