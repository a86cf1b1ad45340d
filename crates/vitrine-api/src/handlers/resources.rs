//! Handlers shared by every managed resource. The entity is chosen by the
//! [`EntityKind`] extension layered onto each resource's routes.
//!
//! | Method   | Path          | Notes |
//! |----------|---------------|-------|
//! | `GET`    | `{path}`      | `?page=&limit=&status=`; `/users` also takes `?role=` and is admin-only |
//! | `POST`   | `{path}`      | JSON object or multipart form with an `image` file |
//! | `GET`    | `{path}/{id}` | 404 if absent or soft-deleted |
//! | `PUT`    | `{path}/{id}` | Partial update; omitted and blank fields are unchanged |
//! | `DELETE` | `{path}/{id}` | Soft delete |
//!
//! Non-admins may read and edit only their own account.

use axum::{
  Extension, Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use vitrine_core::{
  change::ChangeSet,
  entity::Record,
  policy::FieldPolicy,
  principal::{Principal, Role},
  schema::EntityKind,
  store::{ArtifactStore, ListQuery},
  value::ArtifactRef,
};
use vitrine_engine::Upload;

use super::hash_password_field;
use crate::{AppState, Backend, auth::Authenticated, error::ApiError, submission::Submission};

// ─── Guards ───────────────────────────────────────────────────────────────────

fn parse_id(raw: &str) -> Result<i64, ApiError> {
  raw
    .parse()
    .map_err(|_| ApiError::BadRequest(format!("invalid id: {raw:?}")))
}

/// Non-admins may only touch their own account.
fn guard_own_account(kind: EntityKind, principal: &Principal, id: i64) -> Result<(), ApiError> {
  if kind == EntityKind::Account && !principal.is_admin() && principal.subject_id != id {
    return Err(ApiError::Forbidden("you may only access your own account".to_owned()));
  }
  Ok(())
}

/// Upload types accepted, by file extension.
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

fn check_image_name(file_name: &str) -> Result<(), ApiError> {
  let accepted = std::path::Path::new(file_name)
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|ok| ext.eq_ignore_ascii_case(ok)));
  if !accepted {
    return Err(ApiError::BadRequest(
      "invalid file type: expected .jpg, .jpeg, .png or .webp".to_owned(),
    ));
  }
  Ok(())
}

/// Stage an upload if there is one. Entities without an artifact column and
/// files that are not images are refused before anything is written.
async fn stage_upload<S, A>(
  state: &AppState<S, A>,
  kind: EntityKind,
  upload: Option<Upload>,
) -> Result<Option<ArtifactRef>, ApiError>
where
  S: Backend,
  A: ArtifactStore + 'static,
{
  let Some(upload) = upload else {
    return Ok(None);
  };
  if kind.schema().artifact_field().is_none() {
    return Err(ApiError::BadRequest(format!("a {kind} does not accept file uploads")));
  }
  check_image_name(&upload.file_name)?;
  Ok(Some(state.engine.stage(kind, upload).await?))
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// Query parameters are taken as strings so a malformed page number falls
/// back to the default instead of failing the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub page:   Option<String>,
  pub limit:  Option<String>,
  pub status: Option<String>,
  pub role:   Option<String>,
}

impl ListParams {
  fn into_query(self, kind: EntityKind) -> Result<ListQuery, ApiError> {
    let number = |s: Option<String>| s.and_then(|s| s.trim().parse::<i64>().ok());

    let status = match self.status.as_deref().map(str::trim) {
      None | Some("") => None,
      Some("true" | "1") => Some(true),
      Some("false" | "0") => Some(false),
      Some(other) => return Err(ApiError::BadRequest(format!("invalid status filter: {other:?}"))),
    };
    let role = match self.role.as_deref().map(str::trim) {
      Some(r) if kind == EntityKind::Account && !r.is_empty() => Some(r.parse::<Role>()?),
      _ => None,
    };

    Ok(ListQuery::new(number(self.page), number(self.limit), status).with_role(role))
  }
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
  pub page:        i64,
  pub limit:       i64,
  pub total:       i64,
  pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
  pub data: Vec<Record>,
  pub meta: PageMeta,
}

/// `GET {path}`
pub async fn list<S, A>(
  State(state): State<AppState<S, A>>,
  Extension(kind): Extension<EntityKind>,
  auth: Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError>
where
  S: Backend,
  A: ArtifactStore + 'static,
{
  if kind == EntityKind::Account {
    auth.principal().require(Role::Admin)?;
  }

  let page = state.engine.list(kind, params.into_query(kind)?).await?;
  let meta = PageMeta {
    page:        page.page,
    limit:       page.limit,
    total:       page.total,
    total_pages: page.total_pages(),
  };
  Ok(Json(ListResponse { data: page.data, meta }))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET {path}/{id}`
pub async fn get_one<S, A>(
  State(state): State<AppState<S, A>>,
  Extension(kind): Extension<EntityKind>,
  auth: Authenticated,
  Path(id): Path<String>,
) -> Result<Json<Record>, ApiError>
where
  S: Backend,
  A: ArtifactStore + 'static,
{
  let id = parse_id(&id)?;
  guard_own_account(kind, auth.principal(), id)?;
  Ok(Json(state.engine.get(kind, id).await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST {path}`
pub async fn create<S, A>(
  State(state): State<AppState<S, A>>,
  Extension(kind): Extension<EntityKind>,
  auth: Authenticated,
  submission: Submission,
) -> Result<impl IntoResponse, ApiError>
where
  S: Backend,
  A: ArtifactStore + 'static,
{
  let schema = kind.schema();
  let mut changes = ChangeSet::from_input(schema, submission.fields)?;
  hash_password_field(kind, &mut changes)?;

  let artifact = stage_upload(&state, kind, submission.upload).await?;
  let created = state
    .engine
    .insert(
      Some(auth.principal()),
      kind,
      changes,
      &FieldPolicy::from_schema(schema),
      artifact,
    )
    .await?;
  Ok((StatusCode::CREATED, Json(created.record)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT {path}/{id}`
pub async fn update<S, A>(
  State(state): State<AppState<S, A>>,
  Extension(kind): Extension<EntityKind>,
  auth: Authenticated,
  Path(id): Path<String>,
  submission: Submission,
) -> Result<Json<Record>, ApiError>
where
  S: Backend,
  A: ArtifactStore + 'static,
{
  let id = parse_id(&id)?;
  let principal = *auth.principal();
  guard_own_account(kind, &principal, id)?;

  let schema = kind.schema();
  let mut changes = ChangeSet::from_input(schema, submission.fields)?;
  hash_password_field(kind, &mut changes)?;

  let artifact = stage_upload(&state, kind, submission.upload).await?;
  let updated = state
    .engine
    .apply(&principal, kind, id, changes, &FieldPolicy::from_schema(schema), artifact)
    .await?;
  Ok(Json(updated.record))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE {path}/{id}`
pub async fn delete_one<S, A>(
  State(state): State<AppState<S, A>>,
  Extension(kind): Extension<EntityKind>,
  auth: Authenticated,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Backend,
  A: ArtifactStore + 'static,
{
  let id = parse_id(&id)?;
  let principal = *auth.principal();
  if let Some(required) = kind.schema().delete_role {
    principal.require(required)?;
  }
  if kind == EntityKind::Account && principal.subject_id == id {
    return Err(ApiError::Forbidden("you cannot delete your own account".to_owned()));
  }

  state.engine.soft_delete(&principal, kind, id).await?;
  Ok(Json(json!({ "message": format!("{kind} {id} deleted") })))
}
