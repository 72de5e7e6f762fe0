use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;

/// The Admin API's error taxonomy. Every handler returns this instead of a
/// bare `anyhow::Error` so a failed `ferron-store` call, a bad request body,
/// and an auth rejection each map to the right status code without the
/// caller string-matching an error message.
#[derive(Debug)]
pub enum ApiError {
  BadRequest(String),
  Unauthorized,
  Forbidden,
  NotFound(String),
  Conflict(String),
  Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
  fn from(err: anyhow::Error) -> Self {
    ApiError::Internal(err)
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
      ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "invalid or missing bearer token".to_string()),
      ApiError::Forbidden => (StatusCode::FORBIDDEN, "role does not permit this operation".to_string()),
      ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
      ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
      ApiError::Internal(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

pub type ApiResult<T> = Result<T, ApiError>;
