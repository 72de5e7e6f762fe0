use std::error::Error;
use std::sync::Arc;

use parking_lot::RwLock;
use rcgen::{CertificateParams, KeyPair};
use rustls::crypto::CryptoProvider;
use rustls::sign::CertifiedKey;
use rustls_pki_types::PrivateKeyDer;

use crate::util::HostnameRadixTree;

/// The Certificate Catalog: maps an SNI server name to the
/// certified key to present, exact match first, then wildcard
/// (`*.b.c` for a `server_name` of `a.b.c`), falling back to a single
/// pre-generated self-signed certificate so the handshake always completes.
pub struct CertificateCatalog {
  tree: RwLock<HostnameRadixTree<Arc<CertifiedKey>>>,
  fallback: Arc<CertifiedKey>,
}

impl CertificateCatalog {
  pub fn new(fallback: Arc<CertifiedKey>) -> Self {
    Self {
      tree: RwLock::new(HostnameRadixTree::new()),
      fallback,
    }
  }

  /// Looks a server name up, case-folding it first. Never returns `None`:
  /// an unmatched name gets the fallback self-signed certificate.
  pub fn select(&self, server_name: &str) -> Arc<CertifiedKey> {
    let server_name = server_name.to_lowercase();
    self
      .tree
      .read()
      .get(&server_name)
      .cloned()
      .unwrap_or_else(|| self.fallback.clone())
  }

  /// Replaces (or inserts) a single domain's entry without disturbing any
  /// other entry — used by the ACME Worker so a just-renewed cert becomes
  /// selectable without waiting for a full Publisher reconcile.
  pub fn install(&self, domain: String, certified_key: Arc<CertifiedKey>) {
    self.tree.write().insert(domain.to_lowercase(), certified_key);
  }

  /// Rebuilds the catalog wholesale from a fresh set of (domain,
  /// certified-key) pairs, as the Publisher does on every reconcile.
  pub fn rebuild(&self, entries: impl IntoIterator<Item = (String, Arc<CertifiedKey>)>) {
    let mut tree = HostnameRadixTree::new();
    for (domain, certified_key) in entries {
      tree.insert(domain.to_lowercase(), certified_key);
    }
    *self.tree.write() = tree;
  }
}

/// Builds a CertifiedKey from a PEM certificate chain and PEM private key,
/// as stored in a `Certificate` row.
pub fn certified_key_from_pem(chain_pem: &[u8], key_pem: &[u8]) -> Result<CertifiedKey, Box<dyn Error + Send + Sync>> {
  let certs = rustls_pemfile::certs(&mut std::io::Cursor::new(chain_pem)).collect::<Result<Vec<_>, _>>()?;
  let private_key = match rustls_pemfile::private_key(&mut std::io::Cursor::new(key_pem))? {
    Some(private_key) => private_key,
    None => return Err(anyhow::anyhow!("no private key found in certificate PEM").into()),
  };
  let signing_key = CryptoProvider::get_default()
    .ok_or_else(|| anyhow::anyhow!("no default crypto provider installed"))?
    .key_provider
    .load_private_key(private_key)?;
  Ok(CertifiedKey::new(certs, signing_key))
}

/// Generates the startup fallback self-signed certificate.
pub fn generate_fallback_certified_key() -> Result<CertifiedKey, Box<dyn Error + Send + Sync>> {
  let key_pair = KeyPair::generate()?;
  let params = CertificateParams::new(vec!["ferron-fallback.invalid".to_string()])?;
  let certificate = params.self_signed(&key_pair)?;
  let private_key = PrivateKeyDer::try_from(key_pair.serialize_der())?;
  let signing_key = CryptoProvider::get_default()
    .ok_or_else(|| anyhow::anyhow!("no default crypto provider installed"))?
    .key_provider
    .load_private_key(private_key)?;
  Ok(CertifiedKey::new(vec![certificate.der().to_owned()], signing_key))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn dummy_key() -> Arc<CertifiedKey> {
    Arc::new(generate_fallback_certified_key().unwrap())
  }

  #[test]
  fn falls_back_when_unmatched() {
    let fallback = dummy_key();
    let catalog = CertificateCatalog::new(fallback.clone());
    let selected = catalog.select("unknown.example.com");
    assert!(Arc::ptr_eq(&selected, &fallback));
  }

  #[test]
  fn exact_match_takes_precedence_over_wildcard() {
    let catalog = CertificateCatalog::new(dummy_key());
    let exact = dummy_key();
    let wildcard = dummy_key();
    catalog.rebuild(vec![
      ("*.example.com".to_string(), wildcard.clone()),
      ("a.example.com".to_string(), exact.clone()),
    ]);
    let selected = catalog.select("a.example.com");
    assert!(Arc::ptr_eq(&selected, &exact));
    let selected = catalog.select("b.example.com");
    assert!(Arc::ptr_eq(&selected, &wildcard));
  }

  #[test]
  fn wildcard_does_not_reach_two_labels_deep() {
    let fallback = dummy_key();
    let catalog = CertificateCatalog::new(fallback.clone());
    let wildcard = dummy_key();
    catalog.rebuild(vec![("*.example.com".to_string(), wildcard.clone())]);
    let selected = catalog.select("a.example.com");
    assert!(Arc::ptr_eq(&selected, &wildcard));
    let selected = catalog.select("a.b.example.com");
    assert!(Arc::ptr_eq(&selected, &fallback));
  }

  #[test]
  fn install_replaces_a_single_entry_in_place() {
    let catalog = CertificateCatalog::new(dummy_key());
    let first = dummy_key();
    catalog.install("a.example.com".to_string(), first.clone());
    assert!(Arc::ptr_eq(&catalog.select("a.example.com"), &first));

    let renewed = dummy_key();
    catalog.install("a.example.com".to_string(), renewed.clone());
    assert!(Arc::ptr_eq(&catalog.select("a.example.com"), &renewed));
  }
}
