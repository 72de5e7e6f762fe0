use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use ferron_admin_api::{AppState, build_router};
use ferron_common::reconcile::ReconcileHandle;
use ferron_observability_builtin::Stats;
use ferron_store::Store;
use ferron_store::model::UserRole;
use http_body_util::BodyExt;
use tower::ServiceExt;

struct NoopReconcile;
impl ReconcileHandle for NoopReconcile {
  fn trigger(&self) {}
}

async fn test_state() -> AppState {
  let store = Store::open(":memory:").await.expect("open in-memory store");
  let verifier = password_auth::generate_hash("hunter2");
  store.insert_user("alice", &verifier, UserRole::Admin).await.unwrap();
  let (acme_jobs, _rx) = async_channel::unbounded();
  AppState {
    store,
    reconcile: Arc::new(NoopReconcile),
    acme_jobs,
    stats: Arc::new(Stats::new()),
    jwt_secret: Arc::from("test-secret"),
    access_log_path: Arc::new(PathBuf::from("/nonexistent/access.log")),
  }
}

#[tokio::test]
async fn protected_route_rejects_missing_bearer_token() {
  let app = build_router(test_state().await);
  let response = app
    .oneshot(Request::builder().uri("/api/hosts").body(Body::empty()).unwrap())
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_then_list_hosts_round_trips() {
  let app = build_router(test_state().await);

  let login_body = serde_json::json!({"username": "alice", "password": "hunter2"}).to_string();
  let login_response = app
    .clone()
    .oneshot(
      Request::builder()
        .method("POST")
        .uri("/api/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(login_body))
        .unwrap(),
    )
    .await
    .unwrap();
  assert_eq!(login_response.status(), StatusCode::OK);
  let bytes = login_response.into_body().collect().await.unwrap().to_bytes();
  let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
  let token = parsed["token"].as_str().unwrap().to_string();

  let hosts_response = app
    .oneshot(
      Request::builder()
        .uri("/api/hosts")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap(),
    )
    .await
    .unwrap();
  assert_eq!(hosts_response.status(), StatusCode::OK);
  let bytes = hosts_response.into_body().collect().await.unwrap().to_bytes();
  let hosts: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
  assert!(hosts.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn login_with_wrong_password_is_rejected() {
  let app = build_router(test_state().await);
  let login_body = serde_json::json!({"username": "alice", "password": "wrong"}).to_string();
  let response = app
    .oneshot(
      Request::builder()
        .method("POST")
        .uri("/api/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(login_body))
        .unwrap(),
    )
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn metrics_is_reachable_without_a_token() {
  let app = build_router(test_state().await);
  let response = app
    .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);
}
