use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// Appends an Audit Event and triggers a Publisher reconcile. Called by
/// every mutating handler right after its Store write commits, per
/// spec.md §6: "(b) append an Audit Event ... (c) trigger a Publisher
/// reconcile before returning success." Origin IP is intentionally left
/// unset here — the admin surface is not the data path spec.md's audit
/// trail is built to explain, and no handler threads a `ConnectInfo`
/// extractor through this helper yet.
pub async fn record(
  state: &AppState,
  actor: &AuthUser,
  action: &str,
  resource_type: &str,
  resource_id: Option<&str>,
  detail: Option<&str>,
) -> ApiResult<()> {
  state
    .store
    .append_audit_event(&actor.username, action, resource_type, resource_id, detail, None)
    .await?;
  state.reconcile.trigger();
  Ok(())
}
