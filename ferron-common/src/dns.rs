use std::collections::HashMap;
use std::error::Error;

use async_trait::async_trait;
use hickory_resolver::{config::ResolverConfig, name_server::TokioConnectionProvider};

/// Trait for DNS providers used for DNS-01 ACME challenge.
#[async_trait]
pub trait DnsProvider {
  async fn set_acme_txt_record(
    &self,
    acme_challenge_identifier: &str,
    dns_value: &str,
  ) -> Result<(), Box<dyn Error + Send + Sync>>;

  #[allow(unused_variables)]
  async fn remove_acme_txt_record(&self, acme_challenge_identifier: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    Ok(())
  }
}

/// Separates subdomain from domain name.
pub async fn separate_subdomain_from_domain_name(domain_name: &str) -> (String, String) {
  let parts: Vec<&str> = domain_name
    .strip_suffix(".")
    .unwrap_or(domain_name)
    .split('.')
    .collect();
  let resolver = hickory_resolver::Resolver::builder_tokio()
    .unwrap_or(hickory_resolver::Resolver::builder_with_config(
      ResolverConfig::default(),
      TokioConnectionProvider::default(),
    ))
    .build();

  for parts_index in 0..parts.len() {
    if resolver
      .soa_lookup(format!("{}.", parts[parts_index..].join(".")))
      .await
      .is_ok()
    {
      // SOA record found
      let subdomain = parts[..parts_index].join(".");
      let domain = parts[parts_index..].join(".");
      return (subdomain, domain);
    }
  }

  ("".to_string(), parts.join("."))
}

/// Parses a DNS provider's opaque INI-format credential blob (the
/// `DnsProvider.credentials`) into a flat key/value map. Section headers
/// (`[section]`) and comment/blank lines are ignored; this is deliberately
/// a single flat namespace since no DNS-01 provider plugin here needs
/// sections.
pub fn parse_ini_credentials(blob: &str) -> HashMap<String, String> {
  let mut map = HashMap::new();
  for line in blob.lines() {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with(';') || line.starts_with('[') {
      continue;
    }
    if let Some((key, value)) = line.split_once('=') {
      map.insert(key.trim().to_string(), value.trim().to_string());
    }
  }
  map
}
