//! Bearer-token extractor.

use axum::{
  extract::FromRequestParts,
  http::{header, request::Parts},
};
use vitrine_auth::Session;
use vitrine_core::{principal::Principal, store::ArtifactStore};

use crate::{AppState, Backend, error::ApiError};

/// Present in a handler's arguments means the request passed the gate.
///
/// Missing, invalid, revoked and unverifiable credentials all reject with
/// the same [`ApiError::Unauthenticated`]; the gate logs the actual cause.
pub struct Authenticated(pub Session);

impl Authenticated {
  pub fn principal(&self) -> &Principal { &self.0.principal }
}

impl<S, A> FromRequestParts<AppState<S, A>> for Authenticated
where
  S: Backend,
  A: ArtifactStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, A>,
  ) -> Result<Self, Self::Rejection> {
    let authorization = parts
      .headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok());

    state
      .gate
      .authenticate(authorization)
      .await
      .map(Authenticated)
      .map_err(|_| ApiError::Unauthenticated)
  }
}
