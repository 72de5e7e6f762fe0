use axum::{
  Json,
  extract::{Query, State},
};
use ferron_observability_builtin::{MinuteBucket, RealtimeSnapshot};
use serde::Deserialize;

use crate::state::AppState;

pub async fn realtime(State(state): State<AppState>) -> Json<RealtimeSnapshot> {
  Json(state.stats.realtime())
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
  pub hours: Option<u32>,
}

pub async fn history(State(state): State<AppState>, Query(query): Query<HistoryQuery>) -> Json<Vec<MinuteBucket>> {
  Json(state.stats.history(query.hours.unwrap_or(24)))
}
