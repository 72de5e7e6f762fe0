use axum::{
  Json,
  body::Body,
  extract::State,
  http::{Request, header},
  middleware::Next,
  response::Response,
};
use ferron_store::model::UserRole;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Bearer token payload. `role` is carried in the token so the auth
/// middleware can gate mutating methods without a Store round trip on
/// every request.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
  pub sub: String,
  pub uid: i64,
  pub role: String,
  pub exp: usize,
}

/// Identity attached to the request by [`require_auth`], read back out by
/// handlers that need to know who is acting (`/api/users/me`, audit events).
#[derive(Debug, Clone)]
pub struct AuthUser {
  pub id: i64,
  pub username: String,
  pub role: UserRole,
}

const TOKEN_TTL_SECS: usize = 12 * 60 * 60;

pub fn issue_token(secret: &str, user_id: i64, username: &str, role: UserRole) -> ApiResult<String> {
  let exp = (chrono::Utc::now().timestamp() as usize) + TOKEN_TTL_SECS;
  let claims = Claims {
    sub: username.to_string(),
    uid: user_id,
    role: role.as_str().to_string(),
    exp,
  };
  encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))
    .map_err(|e| ApiError::Internal(e.into()))
}

fn verify_token(secret: &str, token: &str) -> Option<Claims> {
  let mut validation = Validation::new(Algorithm::HS256);
  validation.validate_exp = true;
  decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
    .map(|data| data.claims)
    .ok()
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
  pub username: String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
  pub token: String,
}

/// `POST /api/login`. Not behind [`require_auth`].
pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> ApiResult<Json<LoginResponse>> {
  let user = state
    .store
    .get_user_by_username(&body.username)
    .await?
    .ok_or(ApiError::Unauthorized)?;
  password_auth::verify_password(&body.password, &user.password_verifier).map_err(|_| ApiError::Unauthorized)?;
  let token = issue_token(&state.jwt_secret, user.id, &user.username, user.role)?;
  Ok(Json(LoginResponse { token }))
}

/// Bearer-token middleware installed on every Admin API route except
/// `/api/login` and `/metrics` (the latter left open for scrape-tool
/// compatibility, per spec.md's external-interfaces section). Viewer-role
/// tokens are rejected on any method other than GET/HEAD — the role exists
/// precisely to distinguish read-only operators from ones that may mutate.
pub async fn require_auth(State(state): State<AppState>, mut request: Request<Body>, next: Next) -> Result<Response, ApiError> {
  let header_value = request
    .headers()
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;
  let token = header_value.strip_prefix("Bearer ").ok_or(ApiError::Unauthorized)?;
  let claims = verify_token(&state.jwt_secret, token).ok_or(ApiError::Unauthorized)?;
  let role = UserRole::parse(&claims.role);
  if role == UserRole::Viewer && request.method() != axum::http::Method::GET && request.method() != axum::http::Method::HEAD {
    return Err(ApiError::Forbidden);
  }
  request.extensions_mut().insert(AuthUser {
    id: claims.uid,
    username: claims.sub,
    role,
  });
  Ok(next.run(request).await)
}
