use std::{sync::Arc, time::Duration};

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use serde_json::{Value, json};
use tower::ServiceExt as _;
use vitrine_artifacts::MemoryArtifactStore;
use vitrine_core::{principal::Role, value::ArtifactRef};
use vitrine_store_sqlite::SqliteStore;

use super::*;

const SECRET: &str = "test-secret-that-is-long-enough-for-hs256";
const BOUNDARY: &str = "vitrine-test-boundary";

struct Harness {
  state:     AppState<SqliteStore, MemoryArtifactStore>,
  artifacts: Arc<MemoryArtifactStore>,
}

async fn harness() -> Harness { harness_with(ServerConfig::with_secret(SECRET)).await }

async fn harness_with(config: ServerConfig) -> Harness {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let artifacts = Arc::new(MemoryArtifactStore::new());
  let state = AppState::new(store, artifacts.clone(), config);
  Harness { state, artifacts }
}

fn preflight(origin: &str) -> Request<Body> {
  Request::builder()
    .method("OPTIONS")
    .uri("/products/1")
    .header(header::ORIGIN, origin)
    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PUT")
    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
    .body(Body::empty())
    .unwrap()
}

impl Harness {
  async fn send(&self, req: Request<Body>) -> Response {
    router(self.state.clone()).oneshot(req).await.unwrap()
  }

  async fn json(
    &self,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Value,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
      builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let res = self
      .send(builder.body(Body::from(body.to_string())).unwrap())
      .await;
    read(res).await
  }

  async fn multipart(
    &self,
    method: &str,
    uri: &str,
    token: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &[u8])>,
  ) -> (StatusCode, Value) {
    let mut body = Vec::new();
    for (name, value) in fields {
      body.extend_from_slice(
        format!(
          "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
        .as_bytes(),
      );
    }
    if let Some((file_name, bytes)) = file {
      body.extend_from_slice(
        format!(
          "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; \
           filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
      );
      body.extend_from_slice(bytes);
      body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let req = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::AUTHORIZATION, format!("Bearer {token}"))
      .header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
      )
      .body(Body::from(body))
      .unwrap();
    read(self.send(req).await).await
  }

  async fn register(&self, username: &str) -> i64 {
    let (status, body) = self
      .json(
        "POST",
        "/register",
        None,
        json!({ "name": username, "username": username, "password": "hunter22" }),
      )
      .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
  }

  async fn login(&self, username: &str) -> String {
    let (status, body) = self
      .json(
        "POST",
        "/login",
        None,
        json!({ "username": username, "password": "hunter22" }),
      )
      .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["token"].as_str().unwrap().to_owned()
  }

  async fn admin(&self, username: &str) -> (i64, String) {
    let id = self.register(username).await;
    assert!(
      self
        .state
        .store
        .assign_role(username.to_owned(), Role::Admin)
        .await
        .unwrap()
    );
    (id, self.login(username).await)
  }
}

async fn read(res: Response) -> (StatusCode, Value) {
  let status = res.status();
  let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

async fn wait_for_removal(artifacts: &MemoryArtifactStore, reference: &ArtifactRef) {
  for _ in 0..50 {
    if !artifacts.contains(reference) {
      return;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  panic!("{reference} was never cleaned up");
}

// ── Authentication ───────────────────────────────────────────────────────────

#[tokio::test]
async fn every_rejection_looks_the_same() {
  let h = harness().await;
  h.register("alice").await;
  let token = h.login("alice").await;
  let (status, _) = h.json("POST", "/logout", Some(&token), json!({})).await;
  assert_eq!(status, StatusCode::OK);

  let missing = h.send(Request::get("/products").body(Body::empty()).unwrap()).await;
  assert_eq!(missing.headers()[header::WWW_AUTHENTICATE], "Bearer");
  let missing = read(missing).await;

  let invalid = h.json("GET", "/products", Some("not-a-token"), Value::Null).await;
  let revoked = h.json("GET", "/products", Some(&token), Value::Null).await;

  assert_eq!(missing.0, StatusCode::UNAUTHORIZED);
  assert_eq!(missing, invalid);
  assert_eq!(missing, revoked);
}

#[tokio::test]
async fn login_logout_cycle() {
  let h = harness().await;
  let id = h.register("alice").await;
  let token = h.login("alice").await;

  let (status, body) = h.json("GET", &format!("/users/{id}"), Some(&token), Value::Null).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["username"], "alice");
  assert!(body.get("password").is_none());

  let (status, _) = h.json("POST", "/logout", Some(&token), Value::Null).await;
  assert_eq!(status, StatusCode::OK);

  let (status, _) = h.json("POST", "/logout", Some(&token), Value::Null).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  // A fresh login is unaffected by the earlier revocation.
  let again = h.login("alice").await;
  let (status, _) = h.json("GET", "/products", Some(&again), Value::Null).await;
  assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn wrong_password_and_unknown_user_are_indistinguishable() {
  let h = harness().await;
  h.register("alice").await;

  let wrong = h
    .json("POST", "/login", None, json!({ "username": "alice", "password": "nope" }))
    .await;
  let unknown = h
    .json("POST", "/login", None, json!({ "username": "bob", "password": "nope" }))
    .await;
  assert_eq!(wrong.0, StatusCode::UNAUTHORIZED);
  assert_eq!(wrong, unknown);
}

#[tokio::test]
async fn deleted_account_cannot_log_in() {
  let h = harness().await;
  let (_, admin) = h.admin("root").await;
  let id = h.register("alice").await;

  let (status, _) = h.json("DELETE", &format!("/users/{id}"), Some(&admin), Value::Null).await;
  assert_eq!(status, StatusCode::OK);

  let (status, _) = h
    .json("POST", "/login", None, json!({ "username": "alice", "password": "hunter22" }))
    .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_login_body_gets_a_json_error() {
  let h = harness().await;
  let req = Request::post("/login")
    .header(header::CONTENT_TYPE, "text/plain")
    .body(Body::from("username=alice"))
    .unwrap();
  let (status, body) = read(h.send(req).await).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].is_string());

  let (status, body) = h.json("POST", "/login", None, json!({ "username": "alice" })).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].is_string());
}

// ── CORS ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn preflight_is_answered_without_credentials() {
  let h = harness().await;
  let res = h.send(preflight("https://admin.example.com")).await;
  assert!(res.status().is_success());
  let headers = res.headers();
  assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
  let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
  assert!(methods.contains("PUT"), "{methods}");
  let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS].to_str().unwrap();
  assert!(allowed.contains("authorization"), "{allowed}");
}

#[tokio::test]
async fn configured_origins_are_the_only_ones_allowed() {
  let mut config = ServerConfig::with_secret(SECRET);
  config.cors_origins = vec!["https://admin.example.com".to_owned()];
  let h = harness_with(config).await;

  let res = h.send(preflight("https://admin.example.com")).await;
  assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://admin.example.com");

  let res = h.send(preflight("https://elsewhere.example.com")).await;
  assert!(res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

// ── Accounts ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn registration_cannot_choose_a_role() {
  let h = harness().await;
  let (status, body) = h
    .json(
      "POST",
      "/register",
      None,
      json!({ "name": "Eve", "username": "eve", "password": "pw", "role": "admin" }),
    )
    .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["role"], "user");
  assert_eq!(body["created_by"], Value::Null);
}

#[tokio::test]
async fn duplicate_username_conflicts() {
  let h = harness().await;
  h.register("alice").await;
  let (status, body) = h
    .json(
      "POST",
      "/register",
      None,
      json!({ "name": "Other", "username": "alice", "password": "pw" }),
    )
    .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn non_admin_role_change_is_ignored() {
  let h = harness().await;
  let id = h.register("alice").await;
  let token = h.login("alice").await;

  let (status, body) = h
    .json(
      "PUT",
      &format!("/users/{id}"),
      Some(&token),
      json!({ "name": "Alice", "role": "admin" }),
    )
    .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["name"], "Alice");
  assert_eq!(body["role"], "user");
  assert_eq!(body["edited_by"], id);
}

#[tokio::test]
async fn users_are_confined_to_their_own_account() {
  let h = harness().await;
  let alice = h.register("alice").await;
  let bob = h.register("bob").await;
  let token = h.login("alice").await;

  let (status, _) = h.json("GET", &format!("/users/{bob}"), Some(&token), Value::Null).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, _) = h
    .json("PUT", &format!("/users/{bob}"), Some(&token), json!({ "name": "B" }))
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, _) = h.json("GET", "/users", Some(&token), Value::Null).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, _) = h.json("DELETE", &format!("/users/{alice}"), Some(&token), Value::Null).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_lists_and_promotes_but_cannot_delete_self() {
  let h = harness().await;
  let (admin_id, admin) = h.admin("root").await;
  let alice = h.register("alice").await;

  let (status, body) = h.json("GET", "/users?limit=1", Some(&admin), Value::Null).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["meta"]["total"], 2);
  assert_eq!(body["meta"]["total_pages"], 2);
  assert_eq!(body["data"][0]["id"], alice);

  let (status, body) = h
    .json("PUT", &format!("/users/{alice}"), Some(&admin), json!({ "role": "staff" }))
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["role"], "staff");

  let (status, body) = h.json("GET", "/users?role=staff", Some(&admin), Value::Null).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["meta"]["total"], 1);

  let (status, _) = h
    .json("DELETE", &format!("/users/{admin_id}"), Some(&admin), Value::Null)
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

// ── Resources ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn deleted_resources_are_gone() {
  let h = harness().await;
  h.register("alice").await;
  let token = h.login("alice").await;

  let (status, created) = h
    .json("POST", "/messages", Some(&token), json!({ "name": "Visitor", "phone": "555" }))
    .await;
  assert_eq!(status, StatusCode::CREATED, "{created}");
  let uri = format!("/messages/{}", created["id"]);

  let (status, _) = h.json("DELETE", &uri, Some(&token), Value::Null).await;
  assert_eq!(status, StatusCode::OK);
  let (status, _) = h.json("GET", &uri, Some(&token), Value::Null).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (status, _) = h.json("PUT", &uri, Some(&token), json!({ "name": "Again" })).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (status, _) = h.json("DELETE", &uri, Some(&token), Value::Null).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bad_ids_and_bodies_are_rejected() {
  let h = harness().await;
  h.register("alice").await;
  let token = h.login("alice").await;

  let (status, _) = h.json("GET", "/messages/abc", Some(&token), Value::Null).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = h.json("POST", "/messages", Some(&token), json!([1, 2])).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, body) = h.json("POST", "/messages", Some(&token), json!({ "phone": "1" })).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn product_delete_requires_admin() {
  let h = harness().await;
  let (_, admin) = h.admin("root").await;
  h.register("alice").await;
  let user = h.login("alice").await;

  let (status, created) = h
    .multipart("POST", "/products", &admin, &[("title", "Lamp")], Some(("lamp.png", b"png")))
    .await;
  assert_eq!(status, StatusCode::CREATED, "{created}");
  let uri = format!("/products/{}", created["id"]);

  let (status, _) = h.json("DELETE", &uri, Some(&user), Value::Null).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, _) = h.json("DELETE", &uri, Some(&admin), Value::Null).await;
  assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn replacing_an_upload_cleans_up_the_old_file() {
  let h = harness().await;
  let (_, admin) = h.admin("root").await;

  let (status, created) = h
    .multipart(
      "POST",
      "/carousel",
      &admin,
      &[("title", "Spring"), ("status", "true")],
      Some(("spring.png", b"first")),
    )
    .await;
  assert_eq!(status, StatusCode::CREATED, "{created}");
  assert_eq!(created["status"], true);
  let first = ArtifactRef::new(created["image"].as_str().unwrap());
  assert!(h.artifacts.contains(&first));

  let uri = format!("/carousel/{}", created["id"]);
  let (status, updated) = h
    .multipart("PUT", &uri, &admin, &[("title", "")], Some(("summer.png", b"second")))
    .await;
  assert_eq!(status, StatusCode::OK, "{updated}");
  assert_eq!(updated["title"], "Spring");

  let second = ArtifactRef::new(updated["image"].as_str().unwrap());
  assert_ne!(first, second);
  assert!(h.artifacts.contains(&second));
  wait_for_removal(&h.artifacts, &first).await;
}

#[tokio::test]
async fn artifact_entities_require_an_upload() {
  let h = harness().await;
  let (_, admin) = h.admin("root").await;

  let (status, _) = h
    .json("POST", "/carousel", Some(&admin), json!({ "title": "No image" }))
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = h
    .multipart("POST", "/messages", &admin, &[("name", "x")], Some(("a.png", b"a")))
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(h.artifacts.is_empty());
}

#[tokio::test]
async fn non_image_uploads_are_refused() {
  let h = harness().await;
  h.register("alice").await;
  let token = h.login("alice").await;

  let (status, body) = h
    .multipart(
      "POST",
      "/portfolio/reviews",
      &token,
      &[("title", "Great")],
      Some(("evil.html", b"<script>alert(1)</script>")),
    )
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("file type"));
  assert!(h.artifacts.is_empty());

  let (status, _) = h
    .multipart(
      "POST",
      "/portfolio/reviews",
      &token,
      &[("title", "Great")],
      Some(("photo.webp", b"webp")),
    )
    .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(h.artifacts.len(), 1);
}

#[tokio::test]
async fn failed_create_leaves_no_artifact() {
  let h = harness().await;
  let (_, admin) = h.admin("root").await;

  // Missing title: the staged upload must be removed again.
  let (status, _) = h
    .multipart("POST", "/products", &admin, &[("price", "3.5")], Some(("a.png", b"a")))
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(h.artifacts.is_empty());
}

#[tokio::test]
async fn listing_filters_by_status() {
  let h = harness().await;
  let (_, admin) = h.admin("root").await;

  for (title, status) in [("a", "true"), ("b", "false"), ("c", "true")] {
    let (code, _) = h
      .multipart(
        "POST",
        "/products",
        &admin,
        &[("title", title), ("status", status)],
        Some(("p.png", b"p")),
      )
      .await;
    assert_eq!(code, StatusCode::CREATED);
  }

  let (status, body) = h
    .json("GET", "/products?status=true&page=abc", Some(&admin), Value::Null)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["meta"]["total"], 2);
  assert_eq!(body["meta"]["page"], 1);
  assert_eq!(body["data"][0]["title"], "c");
}
