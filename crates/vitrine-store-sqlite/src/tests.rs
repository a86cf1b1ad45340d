//! Integration tests for `SqliteStore`, mostly against an in-memory database.

use chrono::{Duration, Utc};
use vitrine_core::{
  change::ChangeSet,
  principal::Role,
  schema::EntityKind,
  store::{
    AccountStore, EntityStore, ListQuery, Mutation, NewRecord, RevocationRegistry, StoreError,
    StoreErrorKind,
  },
  value::FieldValue,
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_record(fields: ChangeSet) -> NewRecord {
  NewRecord { fields, created_by: Some(1), created_at: Utc::now() }
}

fn account(username: &str) -> ChangeSet {
  ChangeSet::new()
    .set("name", "Ada")
    .set("username", username)
    .set("password", "$argon2id$stub")
}

// ─── Entities ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_round_trip() {
  let s = store().await;
  let created = s
    .insert(
      EntityKind::Product,
      new_record(
        ChangeSet::new()
          .set("title", "Chair")
          .set("price", 12.5)
          .set("image", "products/a.png"),
      ),
    )
    .await
    .unwrap();

  assert_eq!(created.text("title"), Some("Chair"));
  assert_eq!(created.get("status"), Some(&FieldValue::Bool(true)));
  assert_eq!(created.audit.created_by, Some(1));

  let fetched = s.get(EntityKind::Product, created.id).await.unwrap().unwrap();
  assert_eq!(fetched, created);
}

#[tokio::test]
async fn get_missing_returns_none() {
  let s = store().await;
  assert!(s.get(EntityKind::Carousel, 404).await.unwrap().is_none());
}

#[tokio::test]
async fn passwords_never_come_back() {
  let s = store().await;
  let created = s.insert(EntityKind::Account, new_record(account("ada"))).await.unwrap();
  assert!(created.get("password").is_none());
  assert_eq!(created.text("role"), Some("user"));
}

#[tokio::test]
async fn update_touches_only_named_columns() {
  let s = store().await;
  let created = s
    .insert(
      EntityKind::Carousel,
      new_record(ChangeSet::new().set("title", "Spring").set("description", "Flowers")),
    )
    .await
    .unwrap();

  let at = Utc::now();
  let updated = s
    .update(
      EntityKind::Carousel,
      created.id,
      Mutation { set: ChangeSet::new().set("title", "Summer"), edited_by: 9, edited_at: at },
    )
    .await
    .unwrap()
    .unwrap();

  assert_eq!(updated.text("title"), Some("Summer"));
  assert_eq!(updated.text("description"), Some("Flowers"));
  assert_eq!(updated.audit.edited_by, Some(9));
  assert_eq!(updated.audit.edited_at.map(|t| t.timestamp_micros()), Some(at.timestamp_micros()));
}

#[tokio::test]
async fn soft_deleted_rows_are_invisible() {
  let s = store().await;
  let created = s
    .insert(EntityKind::Message, new_record(ChangeSet::new().set("name", "Bob")))
    .await
    .unwrap();

  let deleted = s
    .soft_delete(EntityKind::Message, created.id, 3, Utc::now())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(deleted.audit.deleted_by, Some(3));

  assert!(s.get(EntityKind::Message, created.id).await.unwrap().is_none());
  assert!(
    s.soft_delete(EntityKind::Message, created.id, 3, Utc::now())
      .await
      .unwrap()
      .is_none()
  );

  let mutation = Mutation { set: ChangeSet::new().set("name", "Eve"), edited_by: 3, edited_at: Utc::now() };
  assert!(s.update(EntityKind::Message, created.id, mutation).await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_columns_are_refused() {
  let s = store().await;
  let err = s
    .insert(EntityKind::Message, new_record(ChangeSet::new().set("name", "x").set("evil", "y")))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UnknownColumn { .. }));
  assert_eq!(err.kind(), StoreErrorKind::Other);
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
  let s = store().await;
  s.insert(EntityKind::Account, new_record(account("ada"))).await.unwrap();
  let err = s
    .insert(EntityKind::Account, new_record(account("ada")))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), StoreErrorKind::Conflict);
}

#[tokio::test]
async fn soft_deleted_username_can_be_reused() {
  let s = store().await;
  let first = s.insert(EntityKind::Account, new_record(account("ada"))).await.unwrap();
  s.soft_delete(EntityKind::Account, first.id, 1, Utc::now()).await.unwrap();
  assert!(s.insert(EntityKind::Account, new_record(account("ada"))).await.is_ok());
}

#[tokio::test]
async fn list_pages_newest_first_and_filters_status() {
  let s = store().await;
  for i in 0..5 {
    s.insert(
      EntityKind::Carousel,
      new_record(ChangeSet::new().set("title", format!("c{i}")).set("status", i % 2 == 0)),
    )
    .await
    .unwrap();
  }

  let page = s.list(EntityKind::Carousel, ListQuery::new(Some(1), Some(2), None)).await.unwrap();
  assert_eq!(page.total, 5);
  assert_eq!(page.total_pages(), 3);
  let titles: Vec<_> = page.data.iter().filter_map(|r| r.text("title")).collect();
  assert_eq!(titles, ["c4", "c3"]);

  let active = s
    .list(EntityKind::Carousel, ListQuery::new(None, None, Some(true)))
    .await
    .unwrap();
  assert_eq!(active.total, 3);
}

// ─── Accounts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn accounts_filter_by_role() {
  let s = store().await;
  s.insert(EntityKind::Account, new_record(account("ada"))).await.unwrap();
  s.insert(
    EntityKind::Account,
    new_record(account("root").set("role", Role::Admin)),
  )
  .await
  .unwrap();

  let admins = s
    .list(EntityKind::Account, ListQuery::default().with_role(Some(Role::Admin)))
    .await
    .unwrap();
  assert_eq!(admins.total, 1);
  assert_eq!(admins.data[0].text("username"), Some("root"));
}

#[tokio::test]
async fn credentials_are_found_for_live_accounts_only() {
  let s = store().await;
  let created = s.insert(EntityKind::Account, new_record(account("ada"))).await.unwrap();

  let creds = s.find_credentials("ada".into()).await.unwrap().unwrap();
  assert_eq!(creds.subject_id, created.id);
  assert_eq!(creds.role, Role::User);
  assert_eq!(creds.password_hash, "$argon2id$stub");

  s.soft_delete(EntityKind::Account, created.id, 1, Utc::now()).await.unwrap();
  assert!(s.find_credentials("ada".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn assign_role_promotes_by_username() {
  let s = store().await;
  s.insert(EntityKind::Account, new_record(account("ada"))).await.unwrap();
  assert!(s.assign_role("ada".into(), Role::Admin).await.unwrap());
  assert!(!s.assign_role("nobody".into(), Role::Admin).await.unwrap());
  let creds = s.find_credentials("ada".into()).await.unwrap().unwrap();
  assert_eq!(creds.role, Role::Admin);
}

// ─── Revocation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn revoke_is_idempotent() {
  let s = store().await;
  let exp = Utc::now() + Duration::hours(1);
  s.revoke("tok".into(), exp).await.unwrap();
  s.revoke("tok".into(), exp).await.unwrap();
  assert!(s.is_revoked("tok".into()).await.unwrap());
  assert!(!s.is_revoked("other".into()).await.unwrap());
}

#[tokio::test]
async fn purge_removes_only_expired_entries() {
  let s = store().await;
  let now = Utc::now();
  s.revoke("old".into(), now - Duration::minutes(1)).await.unwrap();
  s.revoke("edge".into(), now).await.unwrap();
  s.revoke("live".into(), now + Duration::hours(1)).await.unwrap();

  assert_eq!(s.purge_expired(now).await.unwrap(), 2);
  assert!(!s.is_revoked("old".into()).await.unwrap());
  assert!(s.is_revoked("live".into()).await.unwrap());
}

// ─── Contention ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn contended_write_fails_within_busy_timeout() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("vitrine.db");
  let s = SqliteStore::open(&path).await.unwrap();
  s.set_busy_timeout(std::time::Duration::from_millis(50)).await.unwrap();
  let created = s
    .insert(EntityKind::Message, new_record(ChangeSet::new().set("name", "x")))
    .await
    .unwrap();

  let blocker = rusqlite::Connection::open(&path).unwrap();
  blocker.execute_batch("BEGIN IMMEDIATE").unwrap();

  let started = std::time::Instant::now();
  let mutation = Mutation { set: ChangeSet::new().set("name", "y"), edited_by: 1, edited_at: Utc::now() };
  let err = s.update(EntityKind::Message, created.id, mutation).await.unwrap_err();
  assert!(started.elapsed() < std::time::Duration::from_secs(2));
  assert_eq!(err.kind(), StoreErrorKind::Other);

  // The failed statement left nothing behind to commit later.
  blocker.execute_batch("ROLLBACK").unwrap();
  let row = s.get(EntityKind::Message, created.id).await.unwrap().unwrap();
  assert_eq!(row.text("name"), Some("x"));
  assert_eq!(row.audit.edited_at, None);
}
