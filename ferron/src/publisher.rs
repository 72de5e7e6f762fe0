use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use cidr::IpCidr;
use ferron_common::modules::Settings;
use ferron_store::Store;
use tokio::sync::Notify;

use crate::cert_catalog::{certified_key_from_pem, CertificateCatalog};
use crate::snapshot::Snapshot;
use crate::stream::StreamForwarder;

/// Builds and republishes the Config Snapshot. Holds the single `ArcSwap`
/// readers dereference on the hot path, and the coalescing logic so a
/// storm of admin-API writes collapses into one rebuild instead of one
/// per write.
pub struct Publisher {
  store: Arc<Store>,
  snapshot: Arc<ArcSwap<Snapshot>>,
  cert_catalog: Arc<CertificateCatalog>,
  stream_forwarder: Arc<StreamForwarder>,
  trusted_proxies: Vec<IpCidr>,
  pending: Arc<AtomicBool>,
  notify: Arc<Notify>,
  reconciling: Arc<tokio::sync::Mutex<()>>,
}

impl Publisher {
  /// `trusted_proxies` comes from the process bootstrap's
  /// `PPM_TRUSTED_PROXY_IPS`/`TRUSTED_PROXY_IPS` environment variable read
  /// (spec.md §6), not from the Store — it is parsed once in `main.rs`
  /// and handed in here, the same way the teacher's own settings that are
  /// process-wide rather than per-host are bootstrap-time, not config-reload
  /// time.
  pub async fn new(
    store: Arc<Store>,
    cert_catalog: Arc<CertificateCatalog>,
    stream_forwarder: Arc<StreamForwarder>,
    trusted_proxies: Vec<IpCidr>,
  ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
    let initial = build_snapshot(&store, &cert_catalog, &trusted_proxies).await?;
    let publisher = Self {
      store,
      snapshot: Arc::new(ArcSwap::from_pointee(initial)),
      cert_catalog,
      stream_forwarder,
      trusted_proxies,
      pending: Arc::new(AtomicBool::new(false)),
      notify: Arc::new(Notify::new()),
      reconciling: Arc::new(tokio::sync::Mutex::new(())),
    };
    publisher.stream_forwarder.apply_diff(&[], &publisher.snapshot.load().streams);
    Ok(publisher)
  }

  /// The current Snapshot. Cheap: one atomic load, no locking.
  pub fn current(&self) -> Arc<Snapshot> {
    self.snapshot.load_full()
  }

  /// Spawns the background task that serializes and coalesces
  /// `reconcile()` calls: concurrent `trigger()`s while a run is in
  /// flight fold into a single follow-up run.
  pub fn spawn_reconcile_loop(self: &Arc<Self>) {
    let publisher = self.clone();
    tokio::spawn(async move {
      loop {
        publisher.notify.notified().await;
        while publisher.pending.swap(false, Ordering::SeqCst) {
          if let Err(err) = publisher.reconcile().await {
            log_reconcile_error(&format!("reconcile failed: {err}"));
          }
        }
      }
    });
  }

  /// Requests a reconcile. Non-blocking: returns immediately, the actual
  /// rebuild happens on the background loop.
  pub fn trigger(&self) {
    self.pending.store(true, Ordering::SeqCst);
    self.notify.notify_one();
  }

  /// Runs one reconcile synchronously: read the Store, build a new
  /// Snapshot, swap it in, then diff and apply Stream listeners. At most
  /// one of these runs at a time.
  pub async fn reconcile(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let _guard = self.reconciling.lock().await;
    let previous_streams = self.snapshot.load().streams.clone();
    let new_snapshot = build_snapshot(&self.store, &self.cert_catalog, &self.trusted_proxies).await?;
    let new_streams = new_snapshot.streams.clone();
    self.snapshot.store(Arc::new(new_snapshot));
    self.stream_forwarder.apply_diff(&previous_streams, &new_streams);
    Ok(())
  }
}

impl ferron_common::reconcile::ReconcileHandle for Publisher {
  fn trigger(&self) {
    Publisher::trigger(self);
  }
}

fn log_reconcile_error(message: &str) {
  eprintln!("{message}");
}

async fn build_snapshot(
  store: &Store,
  cert_catalog: &Arc<CertificateCatalog>,
  trusted_proxies: &[IpCidr],
) -> Result<Snapshot, Box<dyn std::error::Error + Send + Sync>> {
  let hosts = store.list_hosts().await?;
  let streams = store.list_streams().await?;
  let access_lists = store.list_access_lists().await?;
  let certificates = store.list_certificates().await?;

  let mut host_index = HashMap::with_capacity(hosts.len());
  for host in hosts {
    host_index.insert(host.domain.to_lowercase(), Arc::new(host));
  }

  let stream_index = streams.into_iter().map(|s| (s.listen_port, s)).collect();
  let access_list_index = access_lists.into_iter().map(|a| (a.id, a)).collect();

  let mut catalog_entries = Vec::with_capacity(certificates.len());
  for certificate in &certificates {
    match certified_key_from_pem(&certificate.chain_pem, &certificate.key_pem) {
      Ok(certified_key) => catalog_entries.push((certificate.domain.clone(), Arc::new(certified_key))),
      Err(err) => log_reconcile_error(&format!(
        "skipping unparsable certificate for {}: {err}",
        certificate.domain
      )),
    }
  }
  cert_catalog.rebuild(catalog_entries);

  let error_page_html = store.get_setting("error_page_html").await?;

  Ok(Snapshot {
    hosts: host_index,
    streams: stream_index,
    access_lists: access_list_index,
    cert_catalog: cert_catalog.clone(),
    settings: Settings {
      trusted_proxies: trusted_proxies.to_vec(),
      error_page_html,
    },
  })
}

/// Parses `PPM_TRUSTED_PROXY_IPS` (falling back to `TRUSTED_PROXY_IPS`) into
/// the CIDR list `Settings.trusted_proxies` carries for the lifetime of the
/// process. Defaults to loopback-only, per spec.md §6.
pub fn trusted_proxies_from_env() -> Vec<IpCidr> {
  let raw = std::env::var("PPM_TRUSTED_PROXY_IPS")
    .or_else(|_| std::env::var("TRUSTED_PROXY_IPS"))
    .unwrap_or_default();
  let parsed: Vec<IpCidr> = raw
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .filter_map(|s| s.parse::<IpCidr>().ok().or_else(|| format!("{s}/32").parse().ok()))
    .collect();
  if parsed.is_empty() {
    vec!["127.0.0.1/32".parse().unwrap(), "::1/128".parse().unwrap()]
  } else {
    parsed
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn trusted_proxies_from_env_defaults_to_loopback() {
    std::env::remove_var("PPM_TRUSTED_PROXY_IPS");
    std::env::remove_var("TRUSTED_PROXY_IPS");
    let proxies = trusted_proxies_from_env();
    assert_eq!(proxies.len(), 2);
  }
}
