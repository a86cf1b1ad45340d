//! [`CredentialIssuer`]: signs and verifies time-bounded bearer tokens.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vitrine_core::principal::{Principal, Role};

use crate::Result;

/// Token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
  pub user_id: i64,
  pub role:    Role,
  /// Issued at (Unix timestamp)
  pub iat:     i64,
  /// Expiration time (Unix timestamp)
  pub exp:     i64,
  /// Unique per token, so two logins in the same second never share a token.
  pub jti:     String,
}

impl Claims {
  pub fn principal(&self) -> Principal { Principal::new(self.user_id, self.role) }

  pub fn expires_at(&self) -> DateTime<Utc> {
    DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
  }
}

/// A freshly signed token and the claims it carries.
#[derive(Debug, Clone)]
pub struct Credential {
  pub token:  String,
  pub claims: Claims,
}

/// Every verification failure, whatever its cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invalid;

impl fmt::Display for Invalid {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("invalid credential") }
}

impl std::error::Error for Invalid {}

/// HS256 signer over a process-wide secret.
///
/// Built once at startup and shared behind an `Arc`; it holds no mutable
/// state.
#[derive(Clone)]
pub struct CredentialIssuer {
  encoding:   EncodingKey,
  decoding:   DecodingKey,
  validation: Validation,
}

impl CredentialIssuer {
  pub fn new(secret: &[u8]) -> Self {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);

    Self {
      encoding: EncodingKey::from_secret(secret),
      decoding: DecodingKey::from_secret(secret),
      validation,
    }
  }

  pub fn issue(&self, subject_id: i64, role: Role, ttl: TimeDelta) -> Result<Credential> {
    self.issue_at(subject_id, role, Utc::now(), ttl)
  }

  /// Issue with an explicit issue time. A non-positive `ttl` yields a token
  /// that is already expired.
  pub fn issue_at(
    &self,
    subject_id: i64,
    role: Role,
    issued_at: DateTime<Utc>,
    ttl: TimeDelta,
  ) -> Result<Credential> {
    let claims = Claims {
      user_id: subject_id,
      role,
      iat: issued_at.timestamp(),
      exp: (issued_at + ttl).timestamp(),
      jti: Uuid::new_v4().to_string(),
    };
    let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
    Ok(Credential { token, claims })
  }

  /// Check signature and require `exp > now`.
  pub fn verify(&self, token: &str) -> Result<Claims, Invalid> {
    let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|_| Invalid)?;
    if data.claims.exp <= Utc::now().timestamp() {
      return Err(Invalid);
    }
    Ok(data.claims)
  }
}
