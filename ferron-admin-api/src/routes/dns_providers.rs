use axum::{
  Json,
  extract::{Extension, Path, State},
  http::StatusCode,
};
use ferron_store::model::DnsProviderRecord;
use serde::Deserialize;

use crate::audit::record;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_dns_providers(State(state): State<AppState>) -> ApiResult<Json<Vec<DnsProviderRecord>>> {
  Ok(Json(state.store.list_dns_providers().await?))
}

#[derive(Debug, Deserialize)]
pub struct DnsProviderPayload {
  pub name: String,
  pub provider_type: String,
  /// Opaque provider credentials blob — `ferron-dns-builtin`'s
  /// `DnsProvider::from_parameters` parses it per-provider (INI-style for
  /// most, per `ferron_common::dns::parse_ini_credentials`).
  pub credentials: String,
}

pub async fn create_dns_provider(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Json(payload): Json<DnsProviderPayload>,
) -> ApiResult<(StatusCode, Json<i64>)> {
  let id = state
    .store
    .insert_dns_provider(&payload.name, &payload.provider_type, &payload.credentials)
    .await?;
  record(&state, &actor, "create", "dns_provider", Some(&id.to_string()), Some(&payload.name)).await?;
  Ok((StatusCode::CREATED, Json(id)))
}

pub async fn delete_dns_provider(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
  state.store.delete_dns_provider(id).await?;
  record(&state, &actor, "delete", "dns_provider", Some(&id.to_string()), None).await?;
  Ok(StatusCode::NO_CONTENT)
}
