//! [`AuthGate`]: per-request authentication.
//!
//! Each request either ends in a [`Session`] or a [`Rejection`]. The four
//! rejection causes are logged separately, but callers are expected to map
//! all of them to the same denial; see [`Rejection`].

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use vitrine_core::{Error, Result, principal::Principal, store::RevocationRegistry};

use crate::issuer::CredentialIssuer;

/// Why a request was not authenticated. For logs only: every variant must
/// look identical to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
  MissingCredential,
  InvalidCredential,
  RevokedCredential,
  /// The registry could not be consulted in time. Fails closed.
  InfrastructureUnavailable,
}

impl Rejection {
  pub fn reason(self) -> &'static str {
    match self {
      Rejection::MissingCredential => "missing credential",
      Rejection::InvalidCredential => "invalid credential",
      Rejection::RevokedCredential => "revoked credential",
      Rejection::InfrastructureUnavailable => "auth infrastructure unavailable",
    }
  }
}

/// An authenticated request: the principal plus the raw token it presented,
/// kept so logout can revoke exactly that token.
#[derive(Debug, Clone)]
pub struct Session {
  pub principal:  Principal,
  pub token:      String,
  pub expires_at: DateTime<Utc>,
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
/// The scheme is matched case-insensitively; anything else is `None`.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
  let (scheme, token) = header?.trim().split_once(' ')?;
  let token = token.trim();
  if !scheme.eq_ignore_ascii_case("bearer")
    || token.is_empty()
    || token.contains(char::is_whitespace)
  {
    return None;
  }
  Some(token)
}

pub struct AuthGate<R> {
  issuer:         Arc<CredentialIssuer>,
  registry:       Arc<R>,
  lookup_timeout: Duration,
}

impl<R> Clone for AuthGate<R> {
  fn clone(&self) -> Self {
    Self {
      issuer:         self.issuer.clone(),
      registry:       self.registry.clone(),
      lookup_timeout: self.lookup_timeout,
    }
  }
}

impl<R: RevocationRegistry> AuthGate<R> {
  pub fn new(issuer: Arc<CredentialIssuer>, registry: Arc<R>, lookup_timeout: Duration) -> Self {
    Self { issuer, registry, lookup_timeout }
  }

  /// Run the gate over a raw `Authorization` header value. There are no
  /// retries: one failure is final for the request.
  pub async fn authenticate(&self, header: Option<&str>) -> Result<Session, Rejection> {
    let outcome = self.check(header).await;
    if let Err(rejection) = outcome {
      tracing::warn!(cause = rejection.reason(), "request rejected by auth gate");
    }
    outcome
  }

  async fn check(&self, header: Option<&str>) -> Result<Session, Rejection> {
    let token = bearer_token(header).ok_or(Rejection::MissingCredential)?;

    let claims = self
      .issuer
      .verify(token)
      .map_err(|_| Rejection::InvalidCredential)?;

    let lookup = self.registry.is_revoked(token.to_owned());
    match tokio::time::timeout(self.lookup_timeout, lookup).await {
      Ok(Ok(false)) => {}
      Ok(Ok(true)) => return Err(Rejection::RevokedCredential),
      Ok(Err(e)) => {
        tracing::error!(error = %e, "revocation lookup failed");
        return Err(Rejection::InfrastructureUnavailable);
      }
      Err(_) => {
        tracing::error!(timeout = ?self.lookup_timeout, "revocation lookup timed out");
        return Err(Rejection::InfrastructureUnavailable);
      }
    }

    Ok(Session {
      principal:  claims.principal(),
      token:      token.to_owned(),
      expires_at: claims.expires_at(),
    })
  }

  /// Revoke the session's token until its natural expiry.
  pub async fn revoke(&self, session: &Session) -> Result<()> {
    let write = self.registry.revoke(session.token.clone(), session.expires_at);
    match tokio::time::timeout(self.lookup_timeout, write).await {
      Ok(Ok(())) => {
        tracing::info!(subject_id = session.principal.subject_id, "credential revoked");
        Ok(())
      }
      Ok(Err(e)) => Err(Error::Internal(format!("revocation failed: {e}"))),
      Err(_) => Err(Error::Internal("revocation timed out".to_owned())),
    }
  }
}
