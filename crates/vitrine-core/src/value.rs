//! Column values and artifact references.

use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, principal::Role, schema::FieldType};

// ─── FieldValue ──────────────────────────────────────────────────────────────

/// A single column value as it travels between requests, the engine and the
/// entity store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
  Null,
  Bool(bool),
  Integer(i64),
  Real(f64),
  Text(String),
}

impl FieldValue {
  pub fn as_text(&self) -> Option<&str> {
    match self {
      FieldValue::Text(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      FieldValue::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn is_null(&self) -> bool { matches!(self, FieldValue::Null) }
}

impl From<&str> for FieldValue {
  fn from(s: &str) -> Self { FieldValue::Text(s.to_owned()) }
}

impl From<String> for FieldValue {
  fn from(s: String) -> Self { FieldValue::Text(s) }
}

impl From<bool> for FieldValue {
  fn from(b: bool) -> Self { FieldValue::Bool(b) }
}

impl From<i64> for FieldValue {
  fn from(i: i64) -> Self { FieldValue::Integer(i) }
}

impl From<f64> for FieldValue {
  fn from(f: f64) -> Self { FieldValue::Real(f) }
}

impl From<Role> for FieldValue {
  fn from(r: Role) -> Self { FieldValue::Text(r.as_str().to_owned()) }
}

// ─── Coercion ────────────────────────────────────────────────────────────────

/// Convert a raw request value into a typed column value.
///
/// Returns `Ok(None)` for null and blank strings: both mean "leave the field
/// unchanged", since a request cannot tell an omitted field from a cleared one.
/// Strings are accepted for every type so form-encoded submissions work.
pub fn coerce(
  field: &str,
  ty: FieldType,
  raw: serde_json::Value,
) -> Result<Option<FieldValue>> {
  use serde_json::Value as J;

  let invalid = |reason: &str| Error::invalid_field(field, reason);

  let value = match (ty, raw) {
    (_, J::Null) => return Ok(None),
    (_, J::String(s)) if s.trim().is_empty() => return Ok(None),

    (FieldType::Text, J::String(s)) => FieldValue::Text(s),

    (FieldType::Integer, J::String(s)) => s
      .trim()
      .parse::<i64>()
      .map(FieldValue::Integer)
      .map_err(|_| invalid("expected an integer"))?,
    (FieldType::Integer, J::Number(n)) => {
      FieldValue::Integer(n.as_i64().ok_or_else(|| invalid("expected an integer"))?)
    }

    (FieldType::Real, J::String(s)) => s
      .trim()
      .parse::<f64>()
      .ok()
      .filter(|f| f.is_finite())
      .map(FieldValue::Real)
      .ok_or_else(|| invalid("expected a number"))?,
    (FieldType::Real, J::Number(n)) => {
      FieldValue::Real(n.as_f64().ok_or_else(|| invalid("expected a number"))?)
    }

    (FieldType::Bool, J::Bool(b)) => FieldValue::Bool(b),
    (FieldType::Bool, J::String(s)) => match s.trim() {
      "true" | "1" => FieldValue::Bool(true),
      "false" | "0" => FieldValue::Bool(false),
      _ => return Err(invalid("expected true or false")),
    },

    (FieldType::Timestamp, J::String(s)) => {
      FieldValue::Text(normalize_timestamp(s.trim()).ok_or_else(|| {
        invalid("expected an RFC 3339 timestamp or YYYY-MM-DD date")
      })?)
    }

    (FieldType::Role, J::String(s)) => FieldValue::from(s.trim().parse::<Role>()?),

    (FieldType::Artifact, _) => {
      return Err(invalid("artifact fields are set by uploading a file"));
    }

    (_, _) => return Err(invalid("unexpected value type")),
  };

  Ok(Some(value))
}

fn normalize_timestamp(s: &str) -> Option<String> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(
      dt.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true),
    );
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .map(|d| d.format("%Y-%m-%d").to_string())
}

// ─── ArtifactRef ─────────────────────────────────────────────────────────────

/// Opaque key returned by an artifact store and held in an entity's
/// artifact column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
  pub fn new(key: impl Into<String>) -> Self { Self(key.into()) }

  pub fn as_str(&self) -> &str { &self.0 }

  pub fn into_inner(self) -> String { self.0 }
}

impl fmt::Display for ArtifactRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<ArtifactRef> for FieldValue {
  fn from(r: ArtifactRef) -> Self { FieldValue::Text(r.0) }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn null_and_blank_mean_unchanged() {
    assert_eq!(coerce("name", FieldType::Text, json!(null)).unwrap(), None);
    assert_eq!(coerce("name", FieldType::Text, json!("")).unwrap(), None);
    assert_eq!(coerce("name", FieldType::Text, json!("   ")).unwrap(), None);
    assert_eq!(coerce("status", FieldType::Bool, json!("")).unwrap(), None);
  }

  #[test]
  fn form_strings_coerce_to_column_types() {
    assert_eq!(
      coerce("status", FieldType::Bool, json!("false")).unwrap(),
      Some(FieldValue::Bool(false)),
    );
    assert_eq!(
      coerce("price", FieldType::Real, json!("12.50")).unwrap(),
      Some(FieldValue::Real(12.5)),
    );
    assert_eq!(
      coerce("product_id", FieldType::Integer, json!("3")).unwrap(),
      Some(FieldValue::Integer(3)),
    );
  }

  #[test]
  fn bad_values_name_the_field() {
    let err = coerce("price", FieldType::Real, json!("cheap")).unwrap_err();
    assert!(matches!(err, Error::InvalidField { ref field, .. } if field == "price"));
    assert!(coerce("price", FieldType::Real, json!("NaN")).is_err());
  }

  #[test]
  fn roles_are_validated() {
    assert_eq!(
      coerce("role", FieldType::Role, json!("staff")).unwrap(),
      Some(FieldValue::Text("staff".into())),
    );
    assert!(matches!(
      coerce("role", FieldType::Role, json!("root")),
      Err(Error::UnknownRole(_))
    ));
  }

  #[test]
  fn timestamps_are_normalized() {
    assert_eq!(
      coerce("date", FieldType::Timestamp, json!("2024-03-01")).unwrap(),
      Some(FieldValue::Text("2024-03-01".into())),
    );
    assert_eq!(
      coerce("date", FieldType::Timestamp, json!("2024-03-01T10:00:00+02:00")).unwrap(),
      Some(FieldValue::Text("2024-03-01T08:00:00Z".into())),
    );
    assert!(coerce("date", FieldType::Timestamp, json!("yesterday")).is_err());
  }

  #[test]
  fn artifact_fields_cannot_be_set_directly() {
    assert!(coerce("image", FieldType::Artifact, json!("../../etc/passwd")).is_err());
  }
}
