use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// One minute's worth of counters in the history ring.
#[derive(Clone, Copy, Debug, Default, serde::Serialize)]
pub struct MinuteBucket {
  pub minute_epoch: i64,
  pub requests: u64,
  pub bytes: u64,
  pub status_2xx: u64,
  pub status_4xx: u64,
  pub status_5xx: u64,
}

/// Status class a completed response falls into, for the `status_2xx` /
/// `status_4xx` / `status_5xx` buckets, exactly one of which is incremented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusClass {
  Success,
  ClientError,
  ServerError,
  Other,
}

impl StatusClass {
  pub fn of(status: u16) -> Self {
    match status {
      200..=299 => StatusClass::Success,
      400..=499 => StatusClass::ClientError,
      500..=599 => StatusClass::ServerError,
      _ => StatusClass::Other,
    }
  }
}

const HISTORY_LEN: usize = 1440;

/// The Statistics Collector: a realtime atomic counter set
/// plus a 24h-at-1-minute-resolution ring. Readers snapshot-copy; no locks
/// are held across a request, so readers never block on a writer.
pub struct Stats {
  requests: AtomicU64,
  bytes: AtomicU64,
  status_2xx: AtomicU64,
  status_4xx: AtomicU64,
  status_5xx: AtomicU64,
  history: RwLock<Vec<MinuteBucket>>,
  current_minute: AtomicU64,
}

impl Stats {
  pub fn new() -> Self {
    Self {
      requests: AtomicU64::new(0),
      bytes: AtomicU64::new(0),
      status_2xx: AtomicU64::new(0),
      status_4xx: AtomicU64::new(0),
      status_5xx: AtomicU64::new(0),
      history: RwLock::new(Vec::with_capacity(HISTORY_LEN)),
      current_minute: AtomicU64::new(0),
    }
  }

  /// Records one completed request: increments `requests` and
  /// `bytes`... and exactly one of `status_2xx`/`status_4xx`/`status_5xx`".
  pub fn record_request(&self, now_unix: i64, bytes: u64, status: u16) {
    self.requests.fetch_add(1, Ordering::Relaxed);
    self.bytes.fetch_add(bytes, Ordering::Relaxed);
    match StatusClass::of(status) {
      StatusClass::Success => {
        self.status_2xx.fetch_add(1, Ordering::Relaxed);
      }
      StatusClass::ClientError => {
        self.status_4xx.fetch_add(1, Ordering::Relaxed);
      }
      StatusClass::ServerError => {
        self.status_5xx.fetch_add(1, Ordering::Relaxed);
      }
      StatusClass::Other => {}
    }
    self.tick_bucket(now_unix, bytes, status);
  }

  fn tick_bucket(&self, now_unix: i64, bytes: u64, status: u16) {
    let minute_epoch = now_unix / 60;
    let needs_new_bucket = self.current_minute.load(Ordering::Relaxed) as i64 != minute_epoch;
    if needs_new_bucket {
      let mut history = self.history.write();
      if history.last().map(|b| b.minute_epoch) != Some(minute_epoch) {
        history.push(MinuteBucket {
          minute_epoch,
          ..Default::default()
        });
        if history.len() > HISTORY_LEN {
          let overflow = history.len() - HISTORY_LEN;
          history.drain(0..overflow);
        }
      }
      self.current_minute.store(minute_epoch as u64, Ordering::Relaxed);
      drop(history);
    }
    let mut history = self.history.write();
    if let Some(bucket) = history.last_mut() {
      bucket.requests += 1;
      bucket.bytes += bytes;
      match StatusClass::of(status) {
        StatusClass::Success => bucket.status_2xx += 1,
        StatusClass::ClientError => bucket.status_4xx += 1,
        StatusClass::ServerError => bucket.status_5xx += 1,
        StatusClass::Other => {}
      }
    }
  }

  pub fn realtime(&self) -> RealtimeSnapshot {
    RealtimeSnapshot {
      requests: self.requests.load(Ordering::Relaxed),
      bytes: self.bytes.load(Ordering::Relaxed),
      status_2xx: self.status_2xx.load(Ordering::Relaxed),
      status_4xx: self.status_4xx.load(Ordering::Relaxed),
      status_5xx: self.status_5xx.load(Ordering::Relaxed),
    }
  }

  /// Returns the last `hours` worth of minute buckets (the
  /// `GET /api/stats/history?hours=`).
  pub fn history(&self, hours: u32) -> Vec<MinuteBucket> {
    let minutes = (hours as usize).saturating_mul(60).min(HISTORY_LEN);
    let history = self.history.read();
    let start = history.len().saturating_sub(minutes);
    history[start..].to_vec()
  }

  /// Hand-formatted Prometheus text exposition for `GET /metrics`. No
  /// metrics crate is justified for five counters plus a ring.
  pub fn render_prometheus(&self) -> String {
    let r = self.realtime();
    format!(
      "# HELP proxy_requests_total Total requests processed since start.\n\
       # TYPE proxy_requests_total counter\n\
       proxy_requests_total {}\n\
       # HELP proxy_bytes_total Total response body bytes sent to clients.\n\
       # TYPE proxy_bytes_total counter\n\
       proxy_bytes_total {}\n\
       # HELP proxy_responses_total Responses by status class.\n\
       # TYPE proxy_responses_total counter\n\
       proxy_responses_total{{class=\"2xx\"}} {}\n\
       proxy_responses_total{{class=\"4xx\"}} {}\n\
       proxy_responses_total{{class=\"5xx\"}} {}\n",
      r.requests, r.bytes, r.status_2xx, r.status_4xx, r.status_5xx
    )
  }
}

impl Default for Stats {
  fn default() -> Self {
    Self::new()
  }
}

#[derive(Clone, Copy, Debug, serde::Serialize)]
pub struct RealtimeSnapshot {
  pub requests: u64,
  pub bytes: u64,
  pub status_2xx: u64,
  pub status_4xx: u64,
  pub status_5xx: u64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn records_exactly_one_status_bucket() {
    let stats = Stats::new();
    stats.record_request(1_700_000_000, 100, 200);
    stats.record_request(1_700_000_000, 50, 404);
    stats.record_request(1_700_000_000, 10, 503);
    let r = stats.realtime();
    assert_eq!(r.requests, 3);
    assert_eq!(r.bytes, 160);
    assert_eq!(r.status_2xx, 1);
    assert_eq!(r.status_4xx, 1);
    assert_eq!(r.status_5xx, 1);
  }

  #[test]
  fn history_buckets_by_minute() {
    let stats = Stats::new();
    stats.record_request(1_700_000_000, 10, 200);
    stats.record_request(1_700_000_059, 10, 200);
    stats.record_request(1_700_000_060, 10, 200);
    let history = stats.history(24);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].requests, 2);
    assert_eq!(history[1].requests, 1);
  }

  #[test]
  fn prometheus_output_has_expected_metric_names() {
    let stats = Stats::new();
    stats.record_request(1_700_000_000, 5, 200);
    let text = stats.render_prometheus();
    assert!(text.contains("proxy_requests_total 1"));
    assert!(text.contains("proxy_responses_total{class=\"2xx\"} 1"));
  }
}
