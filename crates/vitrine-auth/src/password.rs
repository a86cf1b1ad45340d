//! Argon2 password hashing for stored accounts.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::{self, SaltString},
};
use rand_core::OsRng;

use crate::{Error, Result};

/// Hash `password` into a PHC string (`$argon2id$v=19$…`) with a fresh salt.
pub fn hash_password(password: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(
    Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(Error::Hash)?
      .to_string(),
  )
}

/// `Ok(false)` on a wrong password; `Err` only if `phc` is not a valid hash.
pub fn verify_password(password: &str, phc: &str) -> Result<bool> {
  let parsed = PasswordHash::new(phc).map_err(Error::Hash)?;
  match Argon2::default().verify_password(password.as_bytes(), &parsed) {
    Ok(()) => Ok(true),
    Err(password_hash::Error::Password) => Ok(false),
    Err(e) => Err(Error::Hash(e)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_then_verify() {
    let phc = hash_password("hunter2").unwrap();
    assert!(phc.starts_with("$argon2"));
    assert!(verify_password("hunter2", &phc).unwrap());
    assert!(!verify_password("hunter3", &phc).unwrap());
  }

  #[test]
  fn malformed_hash_is_an_error() {
    assert!(verify_password("x", "plaintext").is_err());
  }
}
