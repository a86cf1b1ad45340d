//! Handlers for the session endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/register` | Public. Account fields; `role`/`status` are ignored |
//! | `POST` | `/login`    | Public. Body: `{"username":"…","password":"…"}` |
//! | `POST` | `/logout`   | Revokes the presented bearer token |

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use vitrine_auth::verify_password;
use vitrine_core::{
  change::ChangeSet,
  policy::FieldPolicy,
  principal::Role,
  schema::EntityKind,
  store::{AccountStore, ArtifactStore},
};

use super::hash_password_field;
use crate::{AppState, Backend, auth::Authenticated, error::ApiError, submission::Submission};

// ─── Register ─────────────────────────────────────────────────────────────────

/// `POST /register`
///
/// Creates an account with no acting principal, so admin-only fields never
/// survive the policy and the account gets the default role.
pub async fn register<S, A>(
  State(state): State<AppState<S, A>>,
  submission: Submission,
) -> Result<impl IntoResponse, ApiError>
where
  S: Backend,
  A: ArtifactStore + 'static,
{
  let kind = EntityKind::Account;
  if submission.upload.is_some() {
    return Err(ApiError::BadRequest("registration does not accept files".to_owned()));
  }

  let schema = kind.schema();
  let mut changes = ChangeSet::from_input(schema, submission.fields)?;
  hash_password_field(kind, &mut changes)?;

  let created = state
    .engine
    .insert(None, kind, changes, &FieldPolicy::from_schema(schema), None)
    .await?;
  Ok((StatusCode::CREATED, Json(created.record)))
}

// ─── Login ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginBody {
  pub username: String,
  pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
  pub token:   String,
  pub user_id: i64,
  pub role:    Role,
  pub expires: DateTime<Utc>,
}

/// `POST /login`
///
/// Unknown usernames and wrong passwords get the same answer.
pub async fn login<S, A>(
  State(state): State<AppState<S, A>>,
  body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError>
where
  S: Backend,
  A: ArtifactStore + 'static,
{
  let Json(body) = body?;
  let lookup = AccountStore::find_credentials(state.store.as_ref(), body.username.clone());
  let found = match tokio::time::timeout(state.config.store_timeout(), lookup).await {
    Ok(Ok(found)) => found,
    Ok(Err(e)) => {
      tracing::error!(error = %e, "credential lookup failed");
      return Err(ApiError::Internal);
    }
    Err(_) => {
      tracing::error!("credential lookup timed out");
      return Err(ApiError::Internal);
    }
  };

  let Some(creds) = found else {
    tracing::info!(username = %body.username, "login for unknown account");
    return Err(ApiError::InvalidLogin);
  };
  if !verify_password(&body.password, &creds.password_hash)? {
    tracing::info!(subject_id = creds.subject_id, "login with wrong password");
    return Err(ApiError::InvalidLogin);
  }

  let credential = state
    .issuer
    .issue(creds.subject_id, creds.role, state.config.token_ttl())?;
  tracing::info!(subject_id = creds.subject_id, role = %creds.role, "logged in");

  Ok(Json(LoginResponse {
    expires: credential.claims.expires_at(),
    token:   credential.token,
    user_id: creds.subject_id,
    role:    creds.role,
  }))
}

// ─── Logout ───────────────────────────────────────────────────────────────────

/// `POST /logout`
///
/// Revokes the token the request authenticated with until it would have
/// expired anyway.
pub async fn logout<S, A>(
  State(state): State<AppState<S, A>>,
  Authenticated(session): Authenticated,
) -> Result<impl IntoResponse, ApiError>
where
  S: Backend,
  A: ArtifactStore + 'static,
{
  state.gate.revoke(&session).await?;
  tracing::info!(subject_id = session.principal.subject_id, "logged out");
  Ok(Json(json!({ "message": "logged out" })))
}
