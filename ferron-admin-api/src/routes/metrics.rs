use axum::extract::State;

use crate::state::AppState;

/// `GET /metrics`, intentionally left outside [`crate::auth::require_auth`]
/// so a Prometheus scrape config doesn't need a bearer token.
pub async fn metrics(State(state): State<AppState>) -> String {
  state.stats.render_prometheus()
}
