//! [`SqliteStore`]: the SQLite implementation of the Vitrine store traits.

use std::{path::Path, time::Duration};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, params_from_iter, types::Value};
use vitrine_core::{
  entity::Record,
  principal::Role,
  schema::EntityKind,
  store::{
    AccountCredentials, AccountStore, EntityStore, ListQuery, Mutation, NewRecord, Page,
    RevocationRegistry,
  },
};

use crate::{
  Error, Result,
  encode::{RawRecord, checked_column, encode_dt, encode_value, select_columns, token_digest},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Entity store, account lookup and revocation registry backed by a single
/// SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// How long a statement waits for a lock held by another connection
  /// before failing with `SQLITE_BUSY`. Keep it below any timeout the caller
  /// puts around store calls, so a contended write fails inside SQLite
  /// instead of committing after the caller has given up.
  pub async fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(timeout)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Set the role of a live account by username. Returns `false` if no live
  /// account has that username.
  ///
  /// Used by the server binary to promote the first administrator, since
  /// self-registration always yields a plain user.
  pub async fn assign_role(&self, username: String, role: Role) -> Result<bool> {
    let now = encode_dt(Utc::now());
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE users SET role = ?1, edited_at = ?2
           WHERE username = ?3 AND deleted_at IS NULL",
          rusqlite::params![role.as_str(), now, username],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }
}

// ─── EntityStore impl ────────────────────────────────────────────────────────

impl EntityStore for SqliteStore {
  type Error = Error;

  async fn get(&self, kind: EntityKind, id: i64) -> Result<Option<Record>> {
    let schema = kind.schema();
    let sql = format!(
      "SELECT {} FROM {} WHERE id = ?1 AND deleted_at IS NULL",
      select_columns(schema),
      schema.table,
    );

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, [id], |row| RawRecord::from_row(schema, row))
            .optional()?,
        )
      })
      .await?;

    raw.map(|r| r.into_record(kind)).transpose()
  }

  async fn list(&self, kind: EntityKind, query: ListQuery) -> Result<Page<Record>> {
    let schema = kind.schema();

    let mut filter = String::from("deleted_at IS NULL");
    let mut params: Vec<Value> = Vec::new();
    if let Some(status) = query.status.filter(|_| schema.has_status()) {
      filter.push_str(" AND status = ?");
      params.push(Value::Integer(i64::from(status)));
    }
    if let Some(role) = query.role.filter(|_| schema.field("role").is_some()) {
      filter.push_str(" AND role = ?");
      params.push(Value::Text(role.as_str().to_owned()));
    }

    let count_sql = format!("SELECT COUNT(*) FROM {} WHERE {filter}", schema.table);
    let list_sql = format!(
      "SELECT {} FROM {} WHERE {filter} ORDER BY id DESC LIMIT ? OFFSET ?",
      select_columns(schema),
      schema.table,
    );
    let (limit, offset) = (query.limit, query.offset());

    let (total, raws) = self
      .conn
      .call(move |conn| {
        let total: i64 =
          conn.query_row(&count_sql, params_from_iter(params.iter()), |r| r.get(0))?;

        let mut page_params = params;
        page_params.push(Value::Integer(limit));
        page_params.push(Value::Integer(offset));

        let mut stmt = conn.prepare(&list_sql)?;
        let raws = stmt
          .query_map(params_from_iter(page_params), |row| {
            RawRecord::from_row(schema, row)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((total, raws))
      })
      .await?;

    let data = raws
      .into_iter()
      .map(|r| r.into_record(kind))
      .collect::<Result<Vec<_>>>()?;

    Ok(Page { data, total, page: query.page, limit: query.limit })
  }

  async fn insert(&self, kind: EntityKind, record: NewRecord) -> Result<Record> {
    let schema = kind.schema();

    let mut columns = Vec::with_capacity(record.fields.len() + 2);
    let mut values = Vec::with_capacity(record.fields.len() + 2);
    for (name, value) in record.fields {
      columns.push(checked_column(schema, &name)?);
      values.push(encode_value(value));
    }
    columns.extend(["created_at", "created_by"]);
    values.push(Value::Text(encode_dt(record.created_at)));
    values.push(record.created_by.map_or(Value::Null, Value::Integer));

    let placeholders = vec!["?"; values.len()].join(", ");
    let sql = format!(
      "INSERT INTO {} ({}) VALUES ({placeholders}) RETURNING {}",
      schema.table,
      columns.join(", "),
      select_columns(schema),
    );

    let raw = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&sql, params_from_iter(values), |row| {
          RawRecord::from_row(schema, row)
        })?)
      })
      .await?;

    raw.into_record(kind)
  }

  async fn update(&self, kind: EntityKind, id: i64, mutation: Mutation) -> Result<Option<Record>> {
    let schema = kind.schema();

    let mut assignments = Vec::with_capacity(mutation.set.len() + 2);
    let mut values = Vec::with_capacity(mutation.set.len() + 3);
    for (name, value) in mutation.set {
      assignments.push(format!("{} = ?", checked_column(schema, &name)?));
      values.push(encode_value(value));
    }
    assignments.push("edited_at = ?".to_owned());
    assignments.push("edited_by = ?".to_owned());
    values.push(Value::Text(encode_dt(mutation.edited_at)));
    values.push(Value::Integer(mutation.edited_by));
    values.push(Value::Integer(id));

    let sql = format!(
      "UPDATE {} SET {} WHERE id = ? AND deleted_at IS NULL RETURNING {}",
      schema.table,
      assignments.join(", "),
      select_columns(schema),
    );

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, params_from_iter(values), |row| {
              RawRecord::from_row(schema, row)
            })
            .optional()?,
        )
      })
      .await?;

    raw.map(|r| r.into_record(kind)).transpose()
  }

  async fn soft_delete(
    &self,
    kind: EntityKind,
    id: i64,
    deleted_by: i64,
    deleted_at: DateTime<Utc>,
  ) -> Result<Option<Record>> {
    let schema = kind.schema();
    let sql = format!(
      "UPDATE {} SET deleted_at = ?1, deleted_by = ?2
       WHERE id = ?3 AND deleted_at IS NULL RETURNING {}",
      schema.table,
      select_columns(schema),
    );
    let at = encode_dt(deleted_at);

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![at, deleted_by, id], |row| {
              RawRecord::from_row(schema, row)
            })
            .optional()?,
        )
      })
      .await?;

    raw.map(|r| r.into_record(kind)).transpose()
  }
}

// ─── AccountStore impl ───────────────────────────────────────────────────────

impl AccountStore for SqliteStore {
  type Error = Error;

  async fn find_credentials(&self, username: String) -> Result<Option<AccountCredentials>> {
    let row: Option<(i64, String, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, password, role FROM users
               WHERE username = ?1 AND deleted_at IS NULL",
              [username],
              |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()?,
        )
      })
      .await?;

    row
      .map(|(subject_id, password_hash, role)| {
        let role = role.parse::<Role>().map_err(|e| Error::Decode {
          column: "role".to_owned(),
          reason: e.to_string(),
        })?;
        Ok(AccountCredentials { subject_id, password_hash, role })
      })
      .transpose()
  }
}

// ─── RevocationRegistry impl ─────────────────────────────────────────────────

impl RevocationRegistry for SqliteStore {
  type Error = Error;

  async fn revoke(&self, token: String, expires_at: DateTime<Utc>) -> Result<()> {
    let digest = token_digest(&token);
    let expires = expires_at.timestamp();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO revoked_tokens (token_digest, expires_at) VALUES (?1, ?2)
           ON CONFLICT (token_digest)
           DO UPDATE SET expires_at = MAX(expires_at, excluded.expires_at)",
          rusqlite::params![digest, expires],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn is_revoked(&self, token: String) -> Result<bool> {
    let digest = token_digest(&token);
    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM revoked_tokens WHERE token_digest = ?1",
              [digest],
              |_| Ok(()),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(found.is_some())
  }

  async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
    let cutoff = now.timestamp();
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM revoked_tokens WHERE expires_at <= ?1",
          [cutoff],
        )?)
      })
      .await?;
    tracing::debug!(removed, "purged expired revocation entries");
    Ok(removed as u64)
  }
}
