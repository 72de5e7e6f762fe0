use axum::{
  Json,
  extract::{Extension, Path, State},
  http::StatusCode,
};
use ferron_store::model::{User, UserRole};
use password_auth::{generate_hash, verify_password};
use serde::{Deserialize, Serialize};

use crate::audit::record;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `User` minus `password_verifier` — never reflected back to a caller.
#[derive(Debug, Serialize)]
pub struct UserView {
  pub id: i64,
  pub username: String,
  pub role: UserRole,
  pub created_at: chrono::DateTime<chrono::Utc>,
  pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for UserView {
  fn from(u: User) -> Self {
    UserView {
      id: u.id,
      username: u.username,
      role: u.role,
      created_at: u.created_at,
      updated_at: u.updated_at,
    }
  }
}

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserView>>> {
  let users = state.store.list_users().await?;
  Ok(Json(users.into_iter().map(UserView::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserPayload {
  pub username: String,
  pub password: String,
  pub role: String,
}

pub async fn create_user(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Json(payload): Json<CreateUserPayload>,
) -> ApiResult<(StatusCode, Json<i64>)> {
  if state.store.get_user_by_username(&payload.username).await?.is_some() {
    return Err(ApiError::Conflict(format!("user '{}' already exists", payload.username)));
  }
  let verifier = generate_hash(&payload.password);
  let id = state
    .store
    .insert_user(&payload.username, &verifier, UserRole::parse(&payload.role))
    .await?;
  record(&state, &actor, "create", "user", Some(&payload.username), None).await?;
  Ok((StatusCode::CREATED, Json(id)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserPayload {
  pub role: String,
}

pub async fn update_user(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Path(id): Path<i64>,
  Json(payload): Json<UpdateUserPayload>,
) -> ApiResult<StatusCode> {
  state.store.update_user(id, UserRole::parse(&payload.role)).await?;
  record(&state, &actor, "update", "user", Some(&id.to_string()), None).await?;
  Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_user(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
  state.store.delete_user(id).await?;
  record(&state, &actor, "delete", "user", Some(&id.to_string()), None).await?;
  Ok(StatusCode::NO_CONTENT)
}

pub async fn me(State(state): State<AppState>, Extension(actor): Extension<AuthUser>) -> ApiResult<Json<UserView>> {
  let user = state
    .store
    .get_user_by_id(actor.id)
    .await?
    .ok_or_else(|| ApiError::NotFound("current user no longer exists".to_string()))?;
  Ok(Json(UserView::from(user)))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordPayload {
  pub current_password: String,
  pub new_password: String,
}

pub async fn change_my_password(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Json(payload): Json<ChangePasswordPayload>,
) -> ApiResult<StatusCode> {
  let user = state
    .store
    .get_user_by_id(actor.id)
    .await?
    .ok_or_else(|| ApiError::NotFound("current user no longer exists".to_string()))?;
  verify_password(&payload.current_password, &user.password_verifier).map_err(|_| ApiError::Unauthorized)?;
  let verifier = generate_hash(&payload.new_password);
  state.store.update_user_password(actor.id, &verifier).await?;
  record(&state, &actor, "change_password", "user", Some(&actor.id.to_string()), None).await?;
  Ok(StatusCode::NO_CONTENT)
}
