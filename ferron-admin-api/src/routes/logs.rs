use axum::extract::{Query, State};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
  pub lines: Option<usize>,
}

/// `GET /api/logs?lines=`. Reads the whole access log and keeps the last
/// `lines` entries in memory — simple and adequate for an operator tailing
/// a log through the admin surface; `logfile.rs`'s writer already bounds
/// the file's growth rate (100ms flush tick), not its total size.
pub async fn tail_logs(State(state): State<AppState>, Query(query): Query<LogsQuery>) -> ApiResult<String> {
  let wanted = query.lines.unwrap_or(200);
  let file = match tokio::fs::File::open(state.access_log_path.as_path()).await {
    Ok(f) => f,
    Err(_) => return Ok(String::new()),
  };
  let mut reader = BufReader::new(file).lines();
  let mut ring: std::collections::VecDeque<String> = std::collections::VecDeque::with_capacity(wanted);
  while let Some(line) = reader.next_line().await.map_err(|e| anyhow::anyhow!(e))? {
    if ring.len() == wanted {
      ring.pop_front();
    }
    ring.push_back(line);
  }
  Ok(ring.into_iter().collect::<Vec<_>>().join("\n"))
}
