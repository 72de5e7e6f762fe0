use std::{collections::HashMap, error::Error};

use async_trait::async_trait;
use google_cloud_dns::client::{Client, ClientConfig};
use google_cloud_dns::model::resource_record_set::ResourceRecordSet;

use ferron_common::dns::{separate_subdomain_from_domain_name, DnsProvider};

/// Google Cloud DNS provider
pub struct GoogleDnsProvider {
  project_id: String,
  managed_zone: String,
}

impl GoogleDnsProvider {
  /// Create a new Google Cloud DNS provider. Authentication is resolved via
  /// Application Default Credentials, the same way every other
  /// `google-cloud-rust` client in this crate family does it.
  pub fn new(project_id: &str, managed_zone: &str) -> Self {
    Self {
      project_id: project_id.to_string(),
      managed_zone: managed_zone.to_string(),
    }
  }

  /// Load a Google Cloud DNS provider from the store's opaque credential blob.
  pub fn from_parameters(challenge_params: &HashMap<String, String>) -> Result<Self, Box<dyn Error + Send + Sync>> {
    let project_id = challenge_params
      .get("project_id")
      .ok_or_else(|| anyhow::anyhow!("Missing Google Cloud project_id"))?;
    let managed_zone = challenge_params
      .get("managed_zone")
      .ok_or_else(|| anyhow::anyhow!("Missing Google Cloud managed_zone"))?;
    Ok(Self::new(project_id, managed_zone))
  }

  async fn client(&self) -> Result<Client, Box<dyn Error + Send + Sync>> {
    let config = ClientConfig::default().with_auth().await?;
    Ok(Client::new(config))
  }
}

#[async_trait]
impl DnsProvider for GoogleDnsProvider {
  async fn set_acme_txt_record(&self, acme_challenge_identifier: &str, dns_value: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let client = self.client().await?;
    let (subdomain, domain_name) = separate_subdomain_from_domain_name(acme_challenge_identifier).await;
    let subdomain = if subdomain.is_empty() {
      "_acme-challenge".to_string()
    } else {
      format!("_acme-challenge.{subdomain}")
    };
    let record_name = format!("{subdomain}.{domain_name}.");
    let record_set = ResourceRecordSet::new()
      .set_name(record_name)
      .set_type("TXT")
      .set_ttl(300)
      .set_rrdatas(vec![format!("\"{dns_value}\"")]);
    client
      .resource_record_sets()
      .create(&self.project_id, &self.managed_zone, record_set)
      .send()
      .await
      .map_err(|e| anyhow::anyhow!("Google Cloud DNS create failed: {e}"))?;
    Ok(())
  }

  async fn remove_acme_txt_record(&self, acme_challenge_identifier: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let client = self.client().await?;
    let (subdomain, domain_name) = separate_subdomain_from_domain_name(acme_challenge_identifier).await;
    let subdomain = if subdomain.is_empty() {
      "_acme-challenge".to_string()
    } else {
      format!("_acme-challenge.{subdomain}")
    };
    let record_name = format!("{subdomain}.{domain_name}.");
    client
      .resource_record_sets()
      .delete(&self.project_id, &self.managed_zone, &record_name, "TXT")
      .send()
      .await
      .map_err(|e| anyhow::anyhow!("Google Cloud DNS delete failed: {e}"))?;
    Ok(())
  }
}
