//! Persisted records and their audit trail.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
  schema::EntityKind,
  value::{ArtifactRef, FieldValue},
};

/// Who created, last edited and soft-deleted a row, and when.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Audit {
  pub created_at: DateTime<Utc>,
  pub created_by: Option<i64>,
  pub edited_at:  Option<DateTime<Utc>>,
  pub edited_by:  Option<i64>,
  pub deleted_at: Option<DateTime<Utc>>,
  pub deleted_by: Option<i64>,
}

impl Audit {
  /// The last moment the row changed: `edited_at`, or `created_at` if it was
  /// never edited.
  pub fn last_modified(&self) -> DateTime<Utc> { self.edited_at.unwrap_or(self.created_at) }

  pub fn is_deleted(&self) -> bool { self.deleted_at.is_some() }
}

/// A row of any managed entity, with its visible columns keyed by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
  pub id:     i64,
  #[serde(skip)]
  pub kind:   EntityKind,
  #[serde(flatten)]
  pub fields: BTreeMap<String, FieldValue>,
  #[serde(flatten)]
  pub audit:  Audit,
}

impl Record {
  pub fn get(&self, field: &str) -> Option<&FieldValue> { self.fields.get(field) }

  pub fn text(&self, field: &str) -> Option<&str> { self.get(field).and_then(FieldValue::as_text) }

  /// The artifact this record currently references, if its entity has an
  /// artifact column and the column is set.
  pub fn artifact(&self) -> Option<ArtifactRef> {
    let column = self.kind.schema().artifact_field()?;
    self
      .text(column)
      .filter(|s| !s.is_empty())
      .map(ArtifactRef::new)
  }
}
