pub mod resources;
pub mod session;

use vitrine_core::{change::ChangeSet, schema::EntityKind, value::FieldValue};

use crate::error::ApiError;

/// Replace a plaintext `password` in an account change set with its hash.
/// Other entities and change sets without a password pass through.
pub(super) fn hash_password_field(kind: EntityKind, changes: &mut ChangeSet) -> Result<(), ApiError> {
  if kind != EntityKind::Account {
    return Ok(());
  }
  if let Some(FieldValue::Text(plain)) = changes.remove("password") {
    changes.insert("password", vitrine_auth::hash_password(&plain)?);
  }
  Ok(())
}
