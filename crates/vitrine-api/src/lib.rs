//! HTTP layer for the Vitrine admin backend.
//!
//! Exposes an axum [`Router`] with bearer-token session endpoints and one
//! CRUD resource per [`EntityKind`], backed by any [`Backend`] and
//! [`ArtifactStore`].

pub mod auth;
pub mod error;
pub mod handlers;
pub mod submission;

#[cfg(test)]
mod tests;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Extension, Router,
  extract::DefaultBodyLimit,
  http::{HeaderValue, Method, header},
  routing::{get, post},
};
use chrono::TimeDelta;
use serde::Deserialize;
use tower_http::{
  cors::{AllowOrigin, CorsLayer},
  trace::TraceLayer,
};
use vitrine_auth::{AuthGate, CredentialIssuer};
use vitrine_core::{
  schema::EntityKind,
  store::{AccountStore, ArtifactStore, EntityStore, RevocationRegistry},
};
use vitrine_engine::PartialUpdateEngine;

use handlers::{resources, session};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `VITRINE_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "defaults::host")]
  pub host:                String,
  #[serde(default = "defaults::port")]
  pub port:                u16,
  #[serde(default = "defaults::database_path")]
  pub database_path:       PathBuf,
  #[serde(default = "defaults::artifact_root")]
  pub artifact_root:       PathBuf,
  /// HMAC key for signing credentials.
  pub jwt_secret:          String,
  #[serde(default = "defaults::token_ttl_secs")]
  pub token_ttl_secs:      i64,
  #[serde(default = "defaults::auth_timeout_ms")]
  pub auth_timeout_ms:     u64,
  #[serde(default = "defaults::store_timeout_ms")]
  pub store_timeout_ms:    u64,
  #[serde(default = "defaults::purge_interval_secs")]
  pub purge_interval_secs: u64,
  #[serde(default = "defaults::max_upload_bytes")]
  pub max_upload_bytes:    usize,
  /// Origins allowed to call the API from a browser. `*` allows any.
  #[serde(default = "defaults::cors_origins")]
  pub cors_origins:        Vec<String>,
}

impl ServerConfig {
  pub fn token_ttl(&self) -> TimeDelta { TimeDelta::seconds(self.token_ttl_secs) }

  pub fn auth_timeout(&self) -> Duration { Duration::from_millis(self.auth_timeout_ms) }

  pub fn store_timeout(&self) -> Duration { Duration::from_millis(self.store_timeout_ms) }

  pub fn purge_interval(&self) -> Duration { Duration::from_secs(self.purge_interval_secs) }

  /// A config with every default and the given secret.
  pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
    Self {
      host:                defaults::host(),
      port:                defaults::port(),
      database_path:       defaults::database_path(),
      artifact_root:       defaults::artifact_root(),
      jwt_secret:          jwt_secret.into(),
      token_ttl_secs:      defaults::token_ttl_secs(),
      auth_timeout_ms:     defaults::auth_timeout_ms(),
      store_timeout_ms:    defaults::store_timeout_ms(),
      purge_interval_secs: defaults::purge_interval_secs(),
      max_upload_bytes:    defaults::max_upload_bytes(),
      cors_origins:        defaults::cors_origins(),
    }
  }
}

mod defaults {
  use std::path::PathBuf;

  pub fn host() -> String { "127.0.0.1".to_owned() }
  pub fn port() -> u16 { 8080 }
  pub fn database_path() -> PathBuf { PathBuf::from("vitrine.db") }
  pub fn artifact_root() -> PathBuf { PathBuf::from("uploads") }
  pub fn token_ttl_secs() -> i64 { 24 * 60 * 60 }
  pub fn auth_timeout_ms() -> u64 { 2_000 }
  pub fn store_timeout_ms() -> u64 { 5_000 }
  pub fn purge_interval_secs() -> u64 { 60 * 60 }
  pub fn max_upload_bytes() -> usize { 8 * 1024 * 1024 }
  pub fn cors_origins() -> Vec<String> { vec!["*".to_owned()] }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Everything the HTTP layer needs from persistence: entity rows, login
/// lookups and the revocation registry, all from one backend.
pub trait Backend: EntityStore + AccountStore + RevocationRegistry + 'static {}

impl<T> Backend for T where T: EntityStore + AccountStore + RevocationRegistry + 'static {}

/// Shared state threaded through all axum handlers.
pub struct AppState<S, A> {
  pub store:  Arc<S>,
  pub engine: PartialUpdateEngine<S, A>,
  pub gate:   AuthGate<S>,
  pub issuer: Arc<CredentialIssuer>,
  pub config: Arc<ServerConfig>,
}

impl<S, A> Clone for AppState<S, A> {
  fn clone(&self) -> Self {
    Self {
      store:  self.store.clone(),
      engine: self.engine.clone(),
      gate:   self.gate.clone(),
      issuer: self.issuer.clone(),
      config: self.config.clone(),
    }
  }
}

impl<S, A> AppState<S, A>
where
  S: Backend,
  A: ArtifactStore + 'static,
{
  pub fn new(store: Arc<S>, artifacts: Arc<A>, config: ServerConfig) -> Self {
    let issuer = Arc::new(CredentialIssuer::new(config.jwt_secret.as_bytes()));
    let gate = AuthGate::new(issuer.clone(), store.clone(), config.auth_timeout());
    let engine = PartialUpdateEngine::new(store.clone(), artifacts, config.store_timeout());
    Self { store, engine, gate, issuer, config: Arc::new(config) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the admin API.
///
/// Every resource gets `GET`/`POST` on its collection path and
/// `GET`/`PUT`/`DELETE` on `{path}/{id}`; handlers learn which entity they
/// serve from an [`Extension<EntityKind>`] layered onto its routes.
pub fn router<S, A>(state: AppState<S, A>) -> Router
where
  S: Backend,
  A: ArtifactStore + 'static,
{
  let mut app = Router::new()
    .route("/register", post(session::register::<S, A>))
    .route("/login",    post(session::login::<S, A>))
    .route("/logout",   post(session::logout::<S, A>));

  for kind in EntityKind::ALL {
    let path = kind.schema().path;
    let resource = Router::new()
      .route(
        path,
        get(resources::list::<S, A>).post(resources::create::<S, A>),
      )
      .route(
        &format!("{path}/{{id}}"),
        get(resources::get_one::<S, A>)
          .put(resources::update::<S, A>)
          .delete(resources::delete_one::<S, A>),
      )
      .layer(Extension(kind));
    app = app.merge(resource);
  }

  let body_limit = state.config.max_upload_bytes;
  let cors = cors_layer(&state.config.cors_origins);
  app
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(TraceLayer::new_for_http())
    .layer(cors)
    .with_state(state)
}

/// Preflight requests are answered here, before authentication.
fn cors_layer(origins: &[String]) -> CorsLayer {
  let allow_origin = if origins.iter().any(|o| o == "*") {
    AllowOrigin::any()
  } else {
    AllowOrigin::list(origins.iter().filter_map(|origin| {
      HeaderValue::from_str(origin)
        .inspect_err(|_| tracing::warn!(%origin, "ignoring invalid CORS origin"))
        .ok()
    }))
  };

  CorsLayer::new()
    .allow_origin(allow_origin)
    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
    .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION])
}
