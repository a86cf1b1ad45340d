//! Request bodies for create and update: a JSON object, or a multipart form
//! carrying an optional file.

use axum::{
  extract::{FromRequest, Multipart, Request},
  http::{StatusCode, header},
};
use bytes::Bytes;
use serde_json::{Map, Value};
use vitrine_engine::Upload;

use crate::error::ApiError;

/// Multipart part name that carries the uploaded file.
pub const UPLOAD_FIELD: &str = "image";

/// Decoded field values plus the uploaded file, if any.
///
/// Multipart text parts arrive as JSON strings; typed parsing happens later
/// when the values meet the entity schema.
#[derive(Debug, Default)]
pub struct Submission {
  pub fields: Map<String, Value>,
  pub upload: Option<Upload>,
}

impl<St> FromRequest<St> for Submission
where
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &St) -> Result<Self, Self::Rejection> {
    let is_multipart = req
      .headers()
      .get(header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if is_multipart {
      let multipart = Multipart::from_request(req, state)
        .await
        .map_err(|e| body_error(e.status(), e.body_text()))?;
      return from_multipart(multipart).await;
    }

    let body = Bytes::from_request(req, state)
      .await
      .map_err(|e| body_error(e.status(), e.body_text()))?;
    from_json(&body)
  }
}

async fn from_multipart(mut multipart: Multipart) -> Result<Submission, ApiError> {
  let mut submission = Submission::default();

  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| body_error(e.status(), e.body_text()))?
  {
    let Some(name) = field.name().map(str::to_owned) else {
      continue;
    };

    if name == UPLOAD_FIELD
      && let Some(file_name) = field.file_name().map(str::to_owned)
    {
      let bytes = field
        .bytes()
        .await
        .map_err(|e| body_error(e.status(), e.body_text()))?;
      if !bytes.is_empty() {
        submission.upload = Some(Upload { bytes, file_name });
      }
      continue;
    }

    let text = field
      .text()
      .await
      .map_err(|e| body_error(e.status(), e.body_text()))?;
    submission.fields.insert(name, Value::String(text));
  }

  Ok(submission)
}

fn from_json(body: &[u8]) -> Result<Submission, ApiError> {
  if body.iter().all(u8::is_ascii_whitespace) {
    return Ok(Submission::default());
  }
  match serde_json::from_slice(body) {
    Ok(Value::Object(fields)) => Ok(Submission { fields, upload: None }),
    Ok(_) => Err(ApiError::BadRequest("request body must be a JSON object".to_owned())),
    Err(e) => Err(ApiError::BadRequest(format!("invalid JSON body: {e}"))),
  }
}

fn body_error(status: StatusCode, text: String) -> ApiError {
  if status == StatusCode::PAYLOAD_TOO_LARGE {
    ApiError::PayloadTooLarge
  } else {
    ApiError::BadRequest(text)
  }
}
