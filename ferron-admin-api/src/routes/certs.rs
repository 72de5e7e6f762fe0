use axum::{
  Json,
  extract::{Extension, State},
  http::StatusCode,
};
use ferron_common::acme::CertificateRequest;
use ferron_store::model::Certificate;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `GET /api/certs` lists certificates currently in the Store (not the
/// live Certificate Catalog — the catalog is an in-memory projection of
/// these rows, rebuilt on reconcile).
pub async fn list_certs(State(state): State<AppState>) -> ApiResult<Json<Vec<Certificate>>> {
  Ok(Json(state.store.list_certificates().await?))
}

#[derive(Debug, Deserialize)]
pub struct CertRequestPayload {
  pub domain: String,
  pub contact_email: String,
  pub dns_provider_id: Option<i64>,
}

/// `POST /api/certs` does not write to the Store directly: it enqueues a
/// job on the ACME Worker's queue, which issues the certificate
/// asynchronously and performs the Store write (and reconcile trigger)
/// itself once the ACME order completes. Returns 202, not 201 — there is
/// nothing to show the caller yet.
pub async fn request_cert(
  State(state): State<AppState>,
  Extension(actor): Extension<AuthUser>,
  Json(payload): Json<CertRequestPayload>,
) -> ApiResult<StatusCode> {
  let domain = payload.domain.clone();
  state
    .acme_jobs
    .send(CertificateRequest {
      domain: payload.domain,
      contact_email: payload.contact_email,
      dns_provider_id: payload.dns_provider_id,
    })
    .await
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("ACME worker queue closed: {e}")))?;
  state
    .store
    .append_audit_event(&actor.username, "request", "certificate", Some(&domain), None, None)
    .await?;
  Ok(StatusCode::ACCEPTED)
}
