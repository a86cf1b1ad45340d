//! Error type for `vitrine-auth`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("token encoding failed: {0}")]
  Encode(#[from] jsonwebtoken::errors::Error),

  #[error("password hashing failed: {0}")]
  Hash(argon2::password_hash::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
