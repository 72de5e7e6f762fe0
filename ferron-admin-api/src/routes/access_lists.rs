use axum::{
  Json,
  extract::{Extension, Path, Query, State},
  http::StatusCode,
};
use ferron_store::model::AccessList;
use password_auth::generate_hash;
use serde::Deserialize;

use crate::audit::record;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AccessListPayload {
  pub name: String,
}

pub async fn list_access_lists(State(state): State<AppState>) -> ApiResult<Json<Vec<AccessList>>> {
  Ok(Json(state.store.list_access_lists().await?))
}

pub async fn create_access_list(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Json(payload): Json<AccessListPayload>,
) -> ApiResult<(StatusCode, Json<i64>)> {
  let id = state.store.insert_access_list(&payload.name).await?;
  record(&state, &actor, "create", "access_list", Some(&id.to_string()), Some(&payload.name)).await?;
  Ok((StatusCode::CREATED, Json(id)))
}

pub async fn delete_access_list(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
  state.store.delete_access_list(id).await?;
  record(&state, &actor, "delete", "access_list", Some(&id.to_string()), None).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ClientPayload {
  pub username: String,
  /// Plaintext, hashed with `password_auth::generate_hash` before storage —
  /// the same verifier format `ferron-passwd` and `AccessControlFilter`
  /// already speak.
  pub password: String,
}

pub async fn add_client(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Path(id): Path<i64>,
  Json(payload): Json<ClientPayload>,
) -> ApiResult<StatusCode> {
  let verifier = generate_hash(&payload.password);
  state.store.add_access_list_client(id, &payload.username, &verifier).await?;
  record(&state, &actor, "create", "access_list_client", Some(&id.to_string()), Some(&payload.username)).await?;
  Ok(StatusCode::CREATED)
}

pub async fn delete_client(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Path((id, username)): Path<(i64, String)>,
) -> ApiResult<StatusCode> {
  state.store.delete_access_list_client(id, &username).await?;
  record(&state, &actor, "delete", "access_list_client", Some(&id.to_string()), Some(&username)).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct IpRulePayload {
  pub cidr: String,
  pub allow: bool,
}

pub async fn add_ip_rule(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Path(id): Path<i64>,
  Json(payload): Json<IpRulePayload>,
) -> ApiResult<StatusCode> {
  state.store.add_access_list_ip_rule(id, &payload.cidr, payload.allow).await?;
  record(&state, &actor, "create", "access_list_ip_rule", Some(&id.to_string()), Some(&payload.cidr)).await?;
  Ok(StatusCode::CREATED)
}

#[derive(Debug, Deserialize)]
pub struct IpRuleQuery {
  pub cidr: String,
}

/// Takes `cidr` as a query parameter rather than a path segment — CIDRs
/// contain a literal `/`, which axum's router would otherwise split on.
pub async fn delete_ip_rule(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Path(id): Path<i64>,
  Query(query): Query<IpRuleQuery>,
) -> ApiResult<StatusCode> {
  state.store.delete_access_list_ip_rule(id, &query.cidr).await?;
  record(&state, &actor, "delete", "access_list_ip_rule", Some(&id.to_string()), Some(&query.cidr)).await?;
  Ok(StatusCode::NO_CONTENT)
}
