//! Encoding and decoding helpers between domain values and SQLite columns.
//!
//! Audit timestamps are stored as RFC 3339 strings with microsecond precision
//! so successive edits within one second still order correctly. Booleans are
//! stored as 0/1 integers.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use sha2::{Digest as _, Sha256};
use vitrine_core::{
  entity::{Audit, Record},
  schema::{EntityKind, EntitySchema, FieldType},
  value::FieldValue,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Field values ────────────────────────────────────────────────────────────

pub fn encode_value(v: FieldValue) -> Value {
  match v {
    FieldValue::Null => Value::Null,
    FieldValue::Bool(b) => Value::Integer(i64::from(b)),
    FieldValue::Integer(i) => Value::Integer(i),
    FieldValue::Real(f) => Value::Real(f),
    FieldValue::Text(s) => Value::Text(s),
  }
}

fn decode_value(column: &str, ty: FieldType, v: Value) -> Result<FieldValue> {
  let mismatch = |found: &str| Error::Decode {
    column: column.to_owned(),
    reason: format!("expected {ty:?}, found {found}"),
  };
  Ok(match (ty, v) {
    (_, Value::Null) => FieldValue::Null,
    (FieldType::Bool, Value::Integer(i)) => FieldValue::Bool(i != 0),
    (FieldType::Integer, Value::Integer(i)) => FieldValue::Integer(i),
    (FieldType::Real, Value::Real(f)) => FieldValue::Real(f),
    (FieldType::Real, Value::Integer(i)) => FieldValue::Real(i as f64),
    (
      FieldType::Text | FieldType::Timestamp | FieldType::Role | FieldType::Artifact,
      Value::Text(s),
    ) => FieldValue::Text(s),
    (_, Value::Integer(_)) => return Err(mismatch("integer")),
    (_, Value::Real(_)) => return Err(mismatch("real")),
    (_, Value::Text(_)) => return Err(mismatch("text")),
    (_, Value::Blob(_)) => return Err(mismatch("blob")),
  })
}

// ─── Revocation digests ──────────────────────────────────────────────────────

/// Hex SHA-256 of a bearer token; the registry never stores raw tokens.
pub fn token_digest(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

// ─── Column lists ────────────────────────────────────────────────────────────

const AUDIT_COLUMNS: &str = "created_at, created_by, edited_at, edited_by, deleted_at, deleted_by";

/// `id`, the visible schema columns in declaration order, then the audit
/// columns. [`RawRecord::from_row`] reads rows in exactly this order.
pub fn select_columns(schema: &EntitySchema) -> String {
  let mut cols = vec!["id"];
  cols.extend(schema.visible_fields().map(|f| f.name));
  format!("{}, {AUDIT_COLUMNS}", cols.join(", "))
}

/// Resolve a change-set key to a declared column, rejecting anything else so
/// only schema names are ever interpolated into SQL.
pub fn checked_column(schema: &EntitySchema, name: &str) -> Result<&'static str> {
  schema
    .field(name)
    .map(|f| f.name)
    .ok_or_else(|| Error::UnknownColumn { table: schema.table, column: name.to_owned() })
}

// ─── Raw row ─────────────────────────────────────────────────────────────────

/// A row as read inside the connection thread; timestamps are still text.
pub struct RawRecord {
  pub id:         i64,
  pub fields:     Vec<(&'static str, FieldType, Value)>,
  pub created_at: String,
  pub created_by: Option<i64>,
  pub edited_at:  Option<String>,
  pub edited_by:  Option<i64>,
  pub deleted_at: Option<String>,
  pub deleted_by: Option<i64>,
}

impl RawRecord {
  pub fn from_row(schema: &EntitySchema, row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    let mut fields = Vec::with_capacity(schema.fields.len());
    let mut idx = 1;
    for f in schema.visible_fields() {
      fields.push((f.name, f.ty, row.get::<_, Value>(idx)?));
      idx += 1;
    }
    Ok(Self {
      id: row.get(0)?,
      fields,
      created_at: row.get(idx)?,
      created_by: row.get(idx + 1)?,
      edited_at: row.get(idx + 2)?,
      edited_by: row.get(idx + 3)?,
      deleted_at: row.get(idx + 4)?,
      deleted_by: row.get(idx + 5)?,
    })
  }

  pub fn into_record(self, kind: EntityKind) -> Result<Record> {
    let fields = self
      .fields
      .into_iter()
      .map(|(name, ty, v)| Ok((name.to_owned(), decode_value(name, ty, v)?)))
      .collect::<Result<BTreeMap<_, _>>>()?;

    Ok(Record {
      id: self.id,
      kind,
      fields,
      audit: Audit {
        created_at: decode_dt(&self.created_at)?,
        created_by: self.created_by,
        edited_at:  self.edited_at.as_deref().map(decode_dt).transpose()?,
        edited_by:  self.edited_by,
        deleted_at: self.deleted_at.as_deref().map(decode_dt).transpose()?,
        deleted_by: self.deleted_by,
      },
    })
  }
}
