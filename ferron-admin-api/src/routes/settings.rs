use axum::{
  Json,
  extract::{Extension, State},
  http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::audit::record;
use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

const ERROR_PAGE_SETTING_KEY: &str = "error_page_html";

#[derive(Debug, Serialize)]
pub struct ErrorPageResponse {
  pub html: Option<String>,
}

pub async fn get_error_page(State(state): State<AppState>) -> ApiResult<Json<ErrorPageResponse>> {
  let html = state.store.get_setting(ERROR_PAGE_SETTING_KEY).await?;
  Ok(Json(ErrorPageResponse { html }))
}

#[derive(Debug, Deserialize)]
pub struct SetErrorPagePayload {
  pub html: String,
}

pub async fn set_error_page(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Json(payload): Json<SetErrorPagePayload>,
) -> ApiResult<StatusCode> {
  state.store.set_setting(ERROR_PAGE_SETTING_KEY, &payload.html).await?;
  record(&state, &actor, "update", "setting", Some(ERROR_PAGE_SETTING_KEY), None).await?;
  Ok(StatusCode::NO_CONTENT)
}
