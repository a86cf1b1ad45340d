//! Static descriptions of every managed resource.
//!
//! A schema names the table, the mutable columns with their types and the
//! minimum role allowed to change each one. Stores build their SQL from these
//! tables and the update engine derives its field policy from them, so adding
//! a resource means adding one schema here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::principal::Role;

// ─── Kinds ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
  Account,
  Product,
  Carousel,
  PortfolioImage,
  PortfolioReview,
  Message,
}

impl EntityKind {
  pub const ALL: [EntityKind; 6] = [
    EntityKind::Account,
    EntityKind::Product,
    EntityKind::Carousel,
    EntityKind::PortfolioImage,
    EntityKind::PortfolioReview,
    EntityKind::Message,
  ];

  pub fn schema(self) -> &'static EntitySchema {
    match self {
      EntityKind::Account => &ACCOUNT,
      EntityKind::Product => &PRODUCT,
      EntityKind::Carousel => &CAROUSEL,
      EntityKind::PortfolioImage => &PORTFOLIO_IMAGE,
      EntityKind::PortfolioReview => &PORTFOLIO_REVIEW,
      EntityKind::Message => &MESSAGE,
    }
  }
}

impl fmt::Display for EntityKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.schema().label)
  }
}

// ─── Field and entity descriptions ───────────────────────────────────────────

/// Storage type of a mutable column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
  Text,
  Integer,
  Real,
  Bool,
  /// RFC 3339 instant or calendar date, stored as text.
  Timestamp,
  /// One of the [`Role`] names, stored as text.
  Role,
  /// Reference into the artifact store; only settable through an upload.
  Artifact,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
  pub name:          &'static str,
  pub ty:            FieldType,
  /// Minimum role allowed to set this field. `None` means any caller.
  pub required_role: Option<Role>,
  /// Must be present when a row is created.
  pub required:      bool,
  /// Written but never read back into a record (e.g. password hashes).
  pub hidden:        bool,
}

const fn field(name: &'static str, ty: FieldType) -> FieldSpec {
  FieldSpec { name, ty, required_role: None, required: false, hidden: false }
}

const fn required(name: &'static str, ty: FieldType) -> FieldSpec {
  FieldSpec { name, ty, required_role: None, required: true, hidden: false }
}

const fn admin_only(name: &'static str, ty: FieldType) -> FieldSpec {
  FieldSpec { name, ty, required_role: Some(Role::Admin), required: false, hidden: false }
}

#[derive(Debug)]
pub struct EntitySchema {
  pub kind:           EntityKind,
  pub table:          &'static str,
  /// Human-readable singular name used in messages.
  pub label:          &'static str,
  /// Route prefix, e.g. `/portfolio/images`.
  pub path:           &'static str,
  pub fields:         &'static [FieldSpec],
  /// Minimum role for soft deletion. `None` means any authenticated caller.
  pub delete_role:    Option<Role>,
  /// Creation requires an uploaded artifact.
  pub needs_artifact: bool,
}

impl EntitySchema {
  pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
    self.fields.iter().find(|f| f.name == name)
  }

  /// Columns returned in records; hidden columns are skipped.
  pub fn visible_fields(&self) -> impl Iterator<Item = &'static FieldSpec> + use<> {
    self.fields.iter().filter(|f| !f.hidden)
  }

  /// The column holding this entity's artifact reference, if any.
  pub fn artifact_field(&self) -> Option<&'static str> {
    self
      .fields
      .iter()
      .find(|f| f.ty == FieldType::Artifact)
      .map(|f| f.name)
  }

  pub fn has_status(&self) -> bool { self.field("status").is_some() }
}

// ─── Resource tables ─────────────────────────────────────────────────────────

static ACCOUNT: EntitySchema = EntitySchema {
  kind:           EntityKind::Account,
  table:          "users",
  label:          "account",
  path:           "/users",
  fields:         &[
    required("name", FieldType::Text),
    field("phone", FieldType::Text),
    required("username", FieldType::Text),
    FieldSpec {
      name:          "password",
      ty:            FieldType::Text,
      required_role: None,
      required:      true,
      hidden:        true,
    },
    admin_only("role", FieldType::Role),
    admin_only("status", FieldType::Bool),
  ],
  delete_role:    Some(Role::Admin),
  needs_artifact: false,
};

static PRODUCT: EntitySchema = EntitySchema {
  kind:           EntityKind::Product,
  table:          "products",
  label:          "product",
  path:           "/products",
  fields:         &[
    field("image", FieldType::Artifact),
    required("title", FieldType::Text),
    field("description", FieldType::Text),
    field("type_product", FieldType::Text),
    field("price", FieldType::Real),
    field("status", FieldType::Bool),
  ],
  delete_role:    Some(Role::Admin),
  needs_artifact: true,
};

static CAROUSEL: EntitySchema = EntitySchema {
  kind:           EntityKind::Carousel,
  table:          "carousel",
  label:          "carousel",
  path:           "/carousel",
  fields:         &[
    field("image", FieldType::Artifact),
    required("title", FieldType::Text),
    field("description", FieldType::Text),
    field("status", FieldType::Bool),
  ],
  delete_role:    Some(Role::Admin),
  needs_artifact: true,
};

static PORTFOLIO_IMAGE: EntitySchema = EntitySchema {
  kind:           EntityKind::PortfolioImage,
  table:          "portfolio_images",
  label:          "portfolio image",
  path:           "/portfolio/images",
  fields:         &[field("image", FieldType::Artifact)],
  delete_role:    Some(Role::Admin),
  needs_artifact: true,
};

static PORTFOLIO_REVIEW: EntitySchema = EntitySchema {
  kind:           EntityKind::PortfolioReview,
  table:          "portfolio_reviews",
  label:          "portfolio review",
  path:           "/portfolio/reviews",
  fields:         &[
    field("product_id", FieldType::Integer),
    required("title", FieldType::Text),
    field("description", FieldType::Text),
    field("image", FieldType::Artifact),
    field("date", FieldType::Timestamp),
  ],
  delete_role:    None,
  needs_artifact: false,
};

static MESSAGE: EntitySchema = EntitySchema {
  kind:           EntityKind::Message,
  table:          "messages",
  label:          "message",
  path:           "/messages",
  fields:         &[
    required("name", FieldType::Text),
    field("company", FieldType::Text),
    field("address", FieldType::Text),
    field("description", FieldType::Text),
    field("product_id", FieldType::Integer),
    field("date_schedule", FieldType::Timestamp),
    field("phone", FieldType::Text),
  ],
  delete_role:    None,
  needs_artifact: false,
};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_kind_resolves_to_its_own_schema() {
    for kind in EntityKind::ALL {
      assert_eq!(kind.schema().kind, kind);
    }
  }

  #[test]
  fn password_is_hidden_from_records() {
    let visible: Vec<_> = EntityKind::Account
      .schema()
      .visible_fields()
      .map(|f| f.name)
      .collect();
    assert!(visible.contains(&"username"));
    assert!(!visible.contains(&"password"));
  }

  #[test]
  fn artifact_columns() {
    assert_eq!(EntityKind::Carousel.schema().artifact_field(), Some("image"));
    assert_eq!(EntityKind::Message.schema().artifact_field(), None);
  }

  #[test]
  fn paths_are_unique() {
    let mut paths: Vec<_> = EntityKind::ALL.iter().map(|k| k.schema().path).collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), EntityKind::ALL.len());
  }
}
