//! [`ChangeSet`]: the sparse set of field updates carried by one request.

use std::collections::{BTreeMap, btree_map};

use crate::{
  Error, Result,
  schema::EntitySchema,
  value::{FieldValue, coerce},
};

/// Field name → new value. Absent keys mean "unchanged".
///
/// Null and blank text values are never stored: inserting one is the same as
/// leaving the field out, so a change set only ever holds real updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
  values: BTreeMap<String, FieldValue>,
}

impl ChangeSet {
  pub fn new() -> Self { Self::default() }

  /// Build a change set from a decoded request body.
  ///
  /// Keys the schema does not know are ignored, as are audit columns and
  /// `id`, which callers can never set. Artifact columns are rejected with
  /// [`Error::InvalidField`] because they can only change through an upload.
  pub fn from_input(
    schema: &EntitySchema,
    input: serde_json::Map<String, serde_json::Value>,
  ) -> Result<Self> {
    let mut changes = Self::new();
    for (name, raw) in input {
      let Some(spec) = schema.field(&name) else {
        continue;
      };
      if let Some(value) = coerce(spec.name, spec.ty, raw)? {
        changes.insert(spec.name, value);
      }
    }
    Ok(changes)
  }

  /// Record a change. Null and blank text are dropped.
  pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
    let value = value.into();
    let blank = match &value {
      FieldValue::Null => true,
      FieldValue::Text(s) => s.trim().is_empty(),
      _ => false,
    };
    if !blank {
      self.values.insert(field.into(), value);
    }
  }

  /// Builder form of [`insert`](Self::insert).
  pub fn set(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
    self.insert(field, value);
    self
  }

  pub fn get(&self, field: &str) -> Option<&FieldValue> { self.values.get(field) }

  pub fn contains(&self, field: &str) -> bool { self.values.contains_key(field) }

  pub fn remove(&mut self, field: &str) -> Option<FieldValue> { self.values.remove(field) }

  pub fn iter(&self) -> btree_map::Iter<'_, String, FieldValue> { self.values.iter() }

  pub fn len(&self) -> usize { self.values.len() }

  pub fn is_empty(&self) -> bool { self.values.is_empty() }

  /// Fail with [`Error::InvalidField`] for the first required field of
  /// `schema` missing from this set.
  pub fn require_fields(&self, schema: &EntitySchema) -> Result<()> {
    let missing = schema
      .fields
      .iter()
      .find(|f| f.required && !self.contains(f.name));
    match missing {
      Some(f) => Err(Error::invalid_field(f.name, "is required")),
      None => Ok(()),
    }
  }
}

impl IntoIterator for ChangeSet {
  type IntoIter = btree_map::IntoIter<String, FieldValue>;
  type Item = (String, FieldValue);

  fn into_iter(self) -> Self::IntoIter { self.values.into_iter() }
}

impl<'a> IntoIterator for &'a ChangeSet {
  type IntoIter = btree_map::Iter<'a, String, FieldValue>;
  type Item = (&'a String, &'a FieldValue);

  fn into_iter(self) -> Self::IntoIter { self.values.iter() }
}
