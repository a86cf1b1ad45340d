//! Error type for `vitrine-store-sqlite`.

use thiserror::Error;
use vitrine_core::store::{StoreError, StoreErrorKind};

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A change set named a column the entity schema does not declare.
  #[error("unknown column {column:?} for table {table}")]
  UnknownColumn { table: &'static str, column: String },

  #[error("invalid stored value in {column}: {reason}")]
  Decode { column: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  fn is_unique_violation(&self) -> bool {
    use rusqlite::ffi;

    match self {
      Error::Database(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _))) => {
        matches!(
          e.extended_code,
          ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        )
      }
      _ => false,
    }
  }
}

impl StoreError for Error {
  fn kind(&self) -> StoreErrorKind {
    if self.is_unique_violation() {
      StoreErrorKind::Conflict
    } else {
      StoreErrorKind::Other
    }
  }
}
