use axum::{Json, extract::{Query, State}};
use ferron_store::model::AuditEvent;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
  pub limit: Option<i64>,
  pub offset: Option<i64>,
  pub username: Option<String>,
  pub resource_type: Option<String>,
}

pub async fn list_audit_logs(State(state): State<AppState>, Query(query): Query<AuditQuery>) -> ApiResult<Json<Vec<AuditEvent>>> {
  let events = state
    .store
    .list_audit_events(
      query.limit.unwrap_or(100),
      query.offset.unwrap_or(0),
      query.username.as_deref(),
      query.resource_type.as_deref(),
    )
    .await?;
  Ok(Json(events))
}
