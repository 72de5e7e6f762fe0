use axum::{
  Json,
  extract::{Extension, Path, State},
  http::StatusCode,
};
use ferron_store::model::{Stream, StreamProtocol};
use ferron_store::NewStream;
use serde::Deserialize;

use crate::audit::record;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamPayload {
  pub listen_port: u16,
  pub protocol: String,
  pub forward_host: String,
  pub forward_port: u16,
}

pub async fn list_streams(State(state): State<AppState>) -> ApiResult<Json<Vec<Stream>>> {
  Ok(Json(state.store.list_streams().await?))
}

pub async fn create_stream(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Json(payload): Json<StreamPayload>,
) -> ApiResult<StatusCode> {
  let listen_port = payload.listen_port;
  state
    .store
    .insert_stream(&NewStream {
      listen_port: payload.listen_port,
      protocol: StreamProtocol::parse(&payload.protocol),
      forward_host: payload.forward_host,
      forward_port: payload.forward_port,
    })
    .await?;
  record(&state, &actor, "create", "stream", Some(&listen_port.to_string()), None).await?;
  Ok(StatusCode::CREATED)
}

pub async fn delete_stream(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Path(listen_port): Path<u16>,
) -> ApiResult<StatusCode> {
  state.store.delete_stream(listen_port).await?;
  record(&state, &actor, "delete", "stream", Some(&listen_port.to_string()), None).await?;
  Ok(StatusCode::NO_CONTENT)
}
