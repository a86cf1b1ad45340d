//! Bearer-token authentication for Vitrine.
//!
//! - [`CredentialIssuer`] signs and verifies HS256 tokens.
//! - [`AuthGate`] turns an `Authorization` header into a [`Session`],
//!   consulting a [`RevocationRegistry`](vitrine_core::store::RevocationRegistry)
//!   on every request.
//! - [`spawn_revocation_sweeper`] garbage-collects expired registry entries.
//! - [`hash_password`] / [`verify_password`] wrap argon2 for account storage.

pub mod error;
pub mod gate;
pub mod issuer;
pub mod password;
pub mod sweeper;

pub use error::{Error, Result};
pub use gate::{AuthGate, Rejection, Session, bearer_token};
pub use issuer::{Claims, Credential, CredentialIssuer, Invalid};
pub use password::{hash_password, verify_password};
pub use sweeper::spawn_revocation_sweeper;
