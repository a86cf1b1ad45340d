//! Error type for `vitrine-artifacts`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// A reference that would resolve outside the artifact root.
  #[error("invalid artifact reference: {0:?}")]
  InvalidReference(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
