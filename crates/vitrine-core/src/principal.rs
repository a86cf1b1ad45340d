//! The authenticated identity attached to one request.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Account role. Variants are declared in ascending privilege order, so the
/// derived `Ord` doubles as the privilege ranking.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  User,
  Staff,
  Admin,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Role::User => "user",
      Role::Staff => "staff",
      Role::Admin => "admin",
    }
  }

  /// Whether this role meets a minimum requirement.
  pub fn satisfies(self, required: Role) -> bool { self >= required }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Role {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "user" => Ok(Role::User),
      "staff" => Ok(Role::Staff),
      "admin" => Ok(Role::Admin),
      other => Err(Error::UnknownRole(other.to_owned())),
    }
  }
}

/// Subject id and role, produced once per request by the authentication gate
/// and passed explicitly to everything downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
  pub subject_id: i64,
  pub role:       Role,
}

impl Principal {
  pub fn new(subject_id: i64, role: Role) -> Self { Self { subject_id, role } }

  pub fn is_admin(&self) -> bool { self.role == Role::Admin }

  /// Reject with [`Error::Forbidden`] unless the role meets `required`.
  pub fn require(&self, required: Role) -> Result<()> {
    if self.role.satisfies(required) {
      Ok(())
    } else {
      Err(Error::Forbidden(format!("{required} access required")))
    }
  }
}
