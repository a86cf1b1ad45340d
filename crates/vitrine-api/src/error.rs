//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
///
/// Every authentication failure becomes [`ApiError::Unauthenticated`] with
/// the same body, whatever the gate's reason was.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("authentication required")]
  Unauthenticated,

  #[error("invalid username or password")]
  InvalidLogin,

  #[error("{0}")]
  Forbidden(String),

  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  Conflict(String),

  #[error("{0}")]
  BadRequest(String),

  #[error("request body too large")]
  PayloadTooLarge,

  /// Details are logged where the failure happens and never sent.
  #[error("internal server error")]
  Internal,
}

impl From<vitrine_core::Error> for ApiError {
  fn from(e: vitrine_core::Error) -> Self {
    use vitrine_core::Error as E;

    match e {
      E::Unauthenticated => ApiError::Unauthenticated,
      E::Forbidden(m) => ApiError::Forbidden(m),
      e @ E::NotFound { .. } => ApiError::NotFound(e.to_string()),
      E::Conflict(m) => ApiError::Conflict(m),
      e @ (E::InvalidField { .. } | E::UnknownRole(_)) => ApiError::BadRequest(e.to_string()),
      E::Internal(detail) => {
        tracing::error!(%detail, "request failed");
        ApiError::Internal
      }
    }
  }
}

impl From<vitrine_auth::Error> for ApiError {
  fn from(e: vitrine_auth::Error) -> Self {
    tracing::error!(error = %e, "credential operation failed");
    ApiError::Internal
  }
}

impl From<JsonRejection> for ApiError {
  fn from(e: JsonRejection) -> Self {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
      ApiError::PayloadTooLarge
    } else {
      ApiError::BadRequest(e.body_text())
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::Unauthenticated | ApiError::InvalidLogin => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
      ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut res = (status, Json(json!({ "error": self.to_string() }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    res
  }
}
