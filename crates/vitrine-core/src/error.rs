//! Error taxonomy shared by every layer above the stores.
//!
//! Authentication failures never reach this type in detail: the gate collapses
//! them into [`Error::Unauthenticated`] before any domain logic runs.

use thiserror::Error;

use crate::schema::EntityKind;

#[derive(Debug, Error)]
pub enum Error {
  #[error("authentication required")]
  Unauthenticated,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("{kind} {id} not found")]
  NotFound { kind: EntityKind, id: i64 },

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("invalid value for field {field:?}: {reason}")]
  InvalidField { field: String, reason: String },

  #[error("unknown role: {0:?}")]
  UnknownRole(String),

  /// Store or artifact infrastructure failure. The message is for logs only.
  #[error("internal error: {0}")]
  Internal(String),
}

impl Error {
  pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::InvalidField { field: field.into(), reason: reason.into() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
