use std::collections::HashMap;
use std::sync::Arc;

use ferron_common::modules::Settings;
use ferron_store::model::{AccessList, Host, Stream};

use crate::cert_catalog::CertificateCatalog;

/// The Config Snapshot: an immutable, fully cross-referenced
/// routing table. Once published, every field is read-only; a new
/// configuration change produces an entirely new `Snapshot` rather than
/// mutating this one.
pub struct Snapshot {
  /// Case-folded domain → Host, exact match only (wildcard logic belongs to
  /// the Certificate Catalog / TLS layer, not here).
  pub hosts: HashMap<String, Arc<Host>>,
  /// `listen_port` → Stream, keyed across both protocol namespaces.
  pub streams: HashMap<u16, Stream>,
  /// Access List id → Access List, so a Host's `access_list_id` resolves
  /// without a second Store round trip per request.
  pub access_lists: HashMap<i64, AccessList>,
  pub cert_catalog: Arc<CertificateCatalog>,
  pub settings: Settings,
}

impl Snapshot {
  pub fn resolve_host(&self, domain: &str) -> Option<&Arc<Host>> {
    self.hosts.get(&domain.to_lowercase())
  }

  pub fn resolve_access_list<'a>(&'a self, host: &Host) -> Option<&'a AccessList> {
    host.access_list_id.and_then(|id| self.access_lists.get(&id))
  }
}
