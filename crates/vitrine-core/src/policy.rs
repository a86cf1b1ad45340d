//! Field-level authorization for partial updates.

use std::collections::BTreeMap;

use crate::{change::ChangeSet, principal::Role, schema::EntitySchema};

/// Per-entity mapping from field name to the minimum role allowed to set it.
/// Fields not listed are settable by anyone who may write the entity at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPolicy {
  restricted: BTreeMap<String, Role>,
}

impl FieldPolicy {
  pub fn new() -> Self { Self::default() }

  /// Collect the role restrictions declared on a schema's fields.
  pub fn from_schema(schema: &EntitySchema) -> Self {
    schema
      .fields
      .iter()
      .filter_map(|f| f.required_role.map(|r| (f.name, r)))
      .fold(Self::new(), |p, (name, role)| p.restrict(name, role))
  }

  pub fn restrict(mut self, field: impl Into<String>, role: Role) -> Self {
    self.restricted.insert(field.into(), role);
    self
  }

  pub fn required_role(&self, field: &str) -> Option<Role> {
    self.restricted.get(field).copied()
  }

  /// Whether an actor with `role` may set `field`. An anonymous actor
  /// (`None`) satisfies no restriction.
  pub fn permits(&self, role: Option<Role>, field: &str) -> bool {
    match (self.required_role(field), role) {
      (None, _) => true,
      (Some(required), Some(actual)) => actual.satisfies(required),
      (Some(_), None) => false,
    }
  }

  /// Split `changes` into the part the actor may apply and the names of the
  /// fields that were silently dropped.
  pub fn partition(&self, role: Option<Role>, changes: ChangeSet) -> (ChangeSet, Vec<String>) {
    let mut allowed = ChangeSet::new();
    let mut dropped = Vec::new();
    for (field, value) in changes {
      if self.permits(role, &field) {
        allowed.insert(field, value);
      } else {
        dropped.push(field);
      }
    }
    (allowed, dropped)
  }
}
