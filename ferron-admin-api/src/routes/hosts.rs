use axum::{
  Json,
  extract::{Extension, Path, Query, State},
  http::StatusCode,
};
use ferron_store::model::{Host, HeaderDirection, UpstreamScheme, split_upstreams};
use ferron_store::{NewHost, NewLocation};
use serde::Deserialize;

use crate::audit::record;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HostPayload {
  pub domain: String,
  /// Operator-facing comma-separated upstream list; split into the Store's
  /// canonical `Vec<String>` right here at the HTTP boundary.
  pub upstreams: String,
  pub upstream_scheme: String,
  pub upstream_sni: Option<String>,
  #[serde(default = "default_true")]
  pub verify_ssl: bool,
  #[serde(default)]
  pub ssl_forced: bool,
  pub redirect_to: Option<String>,
  pub redirect_status: Option<u16>,
  pub access_list_id: Option<i64>,
}

fn default_true() -> bool {
  true
}

impl HostPayload {
  fn into_new_host(self) -> NewHost {
    NewHost {
      domain: self.domain,
      upstreams: split_upstreams(&self.upstreams),
      upstream_scheme: UpstreamScheme::parse(&self.upstream_scheme),
      upstream_sni: self.upstream_sni,
      verify_ssl: self.verify_ssl,
      ssl_forced: self.ssl_forced,
      redirect_to: self.redirect_to,
      redirect_status: self.redirect_status,
      access_list_id: self.access_list_id,
    }
  }
}

pub async fn list_hosts(State(state): State<AppState>) -> ApiResult<Json<Vec<Host>>> {
  Ok(Json(state.store.list_hosts().await?))
}

pub async fn create_host(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Json(payload): Json<HostPayload>,
) -> ApiResult<(StatusCode, Json<Host>)> {
  let domain = payload.domain.clone();
  if state.store.get_host_by_domain(&domain).await?.is_some() {
    return Err(ApiError::Conflict(format!("host '{domain}' already exists")));
  }
  let new_host = payload.into_new_host();
  state.store.insert_host(&new_host).await?;
  record(&state, &actor, "create", "host", Some(&domain), None).await?;
  let host = state.store.get_host_by_domain(&domain).await?.ok_or(ApiError::NotFound(domain))?;
  Ok((StatusCode::CREATED, Json(host)))
}

pub async fn update_host(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Path(domain): Path<String>,
  Json(payload): Json<HostPayload>,
) -> ApiResult<Json<Host>> {
  let existing = state
    .store
    .get_host_by_domain(&domain)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("host '{domain}' not found")))?;
  state.store.update_host(existing.id, &payload.into_new_host()).await?;
  record(&state, &actor, "update", "host", Some(&domain), None).await?;
  let host = state.store.get_host_by_domain(&domain).await?.ok_or(ApiError::NotFound(domain))?;
  Ok(Json(host))
}

pub async fn delete_host(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Path(domain): Path<String>,
) -> ApiResult<StatusCode> {
  state.store.delete_host(&domain).await?;
  record(&state, &actor, "delete", "host", Some(&domain), None).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct LocationPayload {
  pub path: String,
  pub upstreams: String,
  pub upstream_scheme: String,
  pub upstream_sni: Option<String>,
  #[serde(default = "default_true")]
  pub verify_ssl: bool,
  #[serde(default)]
  pub rewrite: bool,
}

pub async fn upsert_location(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Path(domain): Path<String>,
  Json(payload): Json<LocationPayload>,
) -> ApiResult<StatusCode> {
  let host = state
    .store
    .get_host_by_domain(&domain)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("host '{domain}' not found")))?;
  let path = payload.path.clone();
  state
    .store
    .upsert_location(
      host.id,
      &NewLocation {
        path: payload.path,
        upstreams: split_upstreams(&payload.upstreams),
        upstream_scheme: UpstreamScheme::parse(&payload.upstream_scheme),
        upstream_sni: payload.upstream_sni,
        verify_ssl: payload.verify_ssl,
        rewrite: payload.rewrite,
      },
    )
    .await?;
  record(&state, &actor, "upsert", "location", Some(&format!("{domain}{path}")), None).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
  pub path: String,
}

pub async fn delete_location(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Path(domain): Path<String>,
  Query(query): Query<LocationQuery>,
) -> ApiResult<StatusCode> {
  let host = state
    .store
    .get_host_by_domain(&domain)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("host '{domain}' not found")))?;
  state.store.delete_location(host.id, &query.path).await?;
  record(&state, &actor, "delete", "location", Some(&format!("{domain}{}", query.path)), None).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct HeaderPayload {
  pub name: String,
  pub value: String,
  pub direction: String,
}

pub async fn add_header(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Path(domain): Path<String>,
  Json(payload): Json<HeaderPayload>,
) -> ApiResult<StatusCode> {
  let host = state
    .store
    .get_host_by_domain(&domain)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("host '{domain}' not found")))?;
  state
    .store
    .add_header_rule(host.id, &payload.name, &payload.value, HeaderDirection::parse(&payload.direction))
    .await?;
  record(&state, &actor, "create", "header_rule", Some(&domain), Some(&payload.name)).await?;
  Ok(StatusCode::CREATED)
}

pub async fn delete_header(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Path((domain, id)): Path<(String, i64)>,
) -> ApiResult<StatusCode> {
  let host = state
    .store
    .get_host_by_domain(&domain)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("host '{domain}' not found")))?;
  state.store.delete_header_rule(host.id, id).await?;
  record(&state, &actor, "delete", "header_rule", Some(&domain), Some(&id.to_string())).await?;
  Ok(StatusCode::NO_CONTENT)
}
