use std::sync::Arc;

use rustls::ServerConfig;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;

use crate::cert_catalog::CertificateCatalog;

/// Adapts the [`CertificateCatalog`] to `rustls`'s SNI resolution seam.
/// Unlike the teacher's `CustomSniResolver` (a map of per-host resolvers
/// plus a fallback sender for lazy ACME issuance), the catalog already does
/// exact/wildcard/fallback matching internally, so this is just a thin
/// `resolve()` forward.
pub struct CatalogResolver {
  catalog: Arc<CertificateCatalog>,
}

impl CatalogResolver {
  pub fn new(catalog: Arc<CertificateCatalog>) -> Self {
    Self { catalog }
  }
}

impl ResolvesServerCert for CatalogResolver {
  fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
    let server_name = client_hello.server_name().unwrap_or("");
    Some(self.catalog.select(server_name))
  }
}

/// Builds the `rustls::ServerConfig` shared by every HTTPS listener:
/// no client auth, ALPN negotiates h2 then http/1.1, dynamic cert
/// resolution via [`CatalogResolver`].
pub fn build_tls_server_config(catalog: Arc<CertificateCatalog>) -> Arc<ServerConfig> {
  let mut config = ServerConfig::builder()
    .with_no_client_auth()
    .with_cert_resolver(Arc::new(CatalogResolver::new(catalog)));
  config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
  Arc::new(config)
}
