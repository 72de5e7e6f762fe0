use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ferron_common::acme::{AcmeJobQueue, CertificateRequest};
use ferron_common::dns::{parse_ini_credentials, DnsProvider};
use ferron_common::modules::Http01TokenStore;
use ferron_common::reconcile::ReconcileHandle;
use ferron_dns_builtin::{
  CloudflareDnsProvider, DigitalOceanDnsProvider, GoogleDnsProvider, Route53DnsProvider,
};
use ferron_store::Store;
use instant_acme::ChallengeType;
use rustls_platform_verifier::ConfigVerifierExt;
use tokio::sync::RwLock;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::cert_catalog::CertificateCatalog;

use super::{get_certificate_cache_key, provision_certificate, AcmeCache, AcmeConfig, CertificateCacheData};

const RENEWAL_WINDOW_SECS: i64 = 30 * 24 * 60 * 60;
const RENEWAL_SCAN_INTERVAL: Duration = Duration::from_secs(3600);
const JOB_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const DEFAULT_DIRECTORY: &str = "https://acme-v02.api.letsencrypt.org/directory";

/// Background task that acquires and renews certificates: a job-queue
/// consumer fed by admin-triggered requests and its own hourly renewal
/// scan. Every job runs serially so at most one ACME exchange with the
/// remote directory is in flight at a time.
pub struct AcmeWorker {
  store: Arc<Store>,
  cert_catalog: Arc<CertificateCatalog>,
  http01_token_store: Http01TokenStore,
  reconcile: Arc<dyn ReconcileHandle>,
  rustls_client_config: rustls::ClientConfig,
  account_cache_dir: PathBuf,
}

impl AcmeWorker {
  pub fn new(
    store: Arc<Store>,
    cert_catalog: Arc<CertificateCatalog>,
    http01_token_store: Http01TokenStore,
    reconcile: Arc<dyn ReconcileHandle>,
    account_cache_dir: PathBuf,
  ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
    let rustls_client_config = rustls::ClientConfig::builder()
      .with_platform_verifier()?
      .with_no_client_auth();
    Ok(Self {
      store,
      cert_catalog,
      http01_token_store,
      reconcile,
      rustls_client_config,
      account_cache_dir,
    })
  }

  /// Spawns the job-consumer task and the hourly renewal-scan task, and
  /// returns the queue handle the admin API enqueues onto.
  pub fn spawn(self: Arc<Self>) -> AcmeJobQueue {
    let (sender, receiver) = async_channel::unbounded::<CertificateRequest>();

    let consumer_worker = self.clone();
    tokio::spawn(async move {
      while let Ok(job) = receiver.recv().await {
        let domain = job.domain.clone();
        match tokio::time::timeout(JOB_TIMEOUT, consumer_worker.process_job(job)).await {
          Ok(Ok(())) => {}
          Ok(Err(err)) => {
            consumer_worker.record_failure(&domain, &err.to_string()).await;
          }
          Err(_) => {
            consumer_worker
              .record_failure(&domain, "ACME job timed out after 5 minutes")
              .await;
          }
        }
      }
    });

    let scan_worker = self.clone();
    let scan_sender = sender.clone();
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(RENEWAL_SCAN_INTERVAL);
      loop {
        ticker.tick().await;
        scan_worker.enqueue_due_renewals(&scan_sender).await;
      }
    });

    sender
  }

  async fn enqueue_due_renewals(&self, sender: &AcmeJobQueue) {
    let certificates = match self.store.list_certificates().await {
      Ok(certificates) => certificates,
      Err(err) => {
        eprintln!("acme: could not list certificates for renewal scan: {err}");
        return;
      }
    };
    let now = match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
      Ok(duration) => duration.as_secs() as i64,
      Err(_) => return,
    };
    let contact_email = self
      .store
      .get_setting("acme_contact_email")
      .await
      .ok()
      .flatten()
      .unwrap_or_default();

    for certificate in certificates {
      if certificate.expires_at - now < RENEWAL_WINDOW_SECS {
        let job = CertificateRequest {
          domain: certificate.domain,
          contact_email: contact_email.clone(),
          dns_provider_id: certificate.dns_provider_id,
        };
        if sender.send(job).await.is_err() {
          break;
        }
      }
    }
  }

  async fn record_failure(&self, domain: &str, detail: &str) {
    eprintln!("acme: provisioning {domain} failed: {detail}");
    let _ = self
      .store
      .append_audit_event(
        "acme-worker",
        "acme.certificate.failed",
        "certificate",
        Some(domain),
        Some(detail),
        None,
      )
      .await;
  }

  async fn resolve_dns_provider(
    &self,
    dns_provider_id: i64,
  ) -> Result<Arc<dyn DnsProvider + Send + Sync>, Box<dyn std::error::Error + Send + Sync>> {
    let record = self
      .store
      .get_dns_provider(dns_provider_id)
      .await?
      .ok_or_else(|| anyhow::anyhow!("DNS provider {dns_provider_id} not found"))?;
    let params: HashMap<String, String> = parse_ini_credentials(&record.credentials);
    let provider: Arc<dyn DnsProvider + Send + Sync> = match record.provider_type.as_str() {
      "cloudflare" => Arc::new(CloudflareDnsProvider::from_parameters(&params)?),
      "digitalocean" => Arc::new(DigitalOceanDnsProvider::from_parameters(&params)?),
      "google" => Arc::new(GoogleDnsProvider::from_parameters(&params)?),
      "route53" => Arc::new(Route53DnsProvider::from_parameters(&params)?),
      other => return Err(anyhow::anyhow!("unknown DNS provider type: {other}").into()),
    };
    Ok(provider)
  }

  async fn process_job(
    &self,
    job: CertificateRequest,
  ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if job.domain.starts_with("*.") && job.dns_provider_id.is_none() {
      return Err(anyhow::anyhow!("wildcard domain {} requires a DNS provider", job.domain).into());
    }

    let dns_provider = match job.dns_provider_id {
      Some(id) => Some(self.resolve_dns_provider(id).await?),
      None => None,
    };
    let challenge_type = if dns_provider.is_some() {
      ChallengeType::Dns01
    } else {
      ChallengeType::Http01
    };

    let directory = self
      .store
      .get_setting("acme_directory")
      .await
      .ok()
      .flatten()
      .unwrap_or_else(|| DEFAULT_DIRECTORY.to_string());

    tokio::fs::create_dir_all(&self.account_cache_dir).await.ok();

    let certificate_cache = Arc::new(RwLock::new(HashMap::new()));
    let mut config = AcmeConfig {
      rustls_client_config: self.rustls_client_config.clone(),
      domains: vec![job.domain.clone()],
      challenge_type,
      contact: vec![format!("mailto:{}", job.contact_email)],
      directory,
      profile: None,
      account_cache: AcmeCache::File(self.account_cache_dir.clone()),
      certificate_cache: AcmeCache::Memory(certificate_cache.clone()),
      certified_key_lock: Arc::new(RwLock::new(None)),
      http01_token_store: self.http01_token_store.clone(),
      dns_provider,
    };

    provision_certificate(&mut config).await?;

    let certified_key = config
      .certified_key_lock
      .read()
      .await
      .clone()
      .ok_or_else(|| anyhow::anyhow!("ACME provisioning reported success with no certificate"))?;

    let cache_key = get_certificate_cache_key(&config);
    let cached = certificate_cache
      .read()
      .await
      .get(&cache_key)
      .cloned()
      .ok_or_else(|| anyhow::anyhow!("ACME provisioning did not populate the certificate cache"))?;
    let cache_data: CertificateCacheData = serde_json::from_slice(&cached)?;
    let chain_pem = cache_data.certificate_chain_pem;
    let key_pem = cache_data.private_key_pem;
    let expires_at = leaf_certificate_expiry(&chain_pem)?;

    let cert_id = self
      .store
      .upsert_certificate(
        &job.domain,
        chain_pem.as_bytes(),
        key_pem.as_bytes(),
        expires_at,
        job.dns_provider_id,
      )
      .await?;
    self.cert_catalog.install(job.domain.clone(), certified_key);
    let _ = self
      .store
      .append_audit_event(
        "acme-worker",
        "acme.certificate.issued",
        "certificate",
        Some(&cert_id.to_string()),
        Some(&format!("issued for {}", job.domain)),
        None,
      )
      .await;
    self.reconcile.trigger();

    Ok(())
  }
}

fn leaf_certificate_expiry(
  chain_pem: &str,
) -> Result<i64, Box<dyn std::error::Error + Send + Sync>> {
  let certs = rustls_pemfile::certs(&mut std::io::Cursor::new(chain_pem.as_bytes()))
    .collect::<Result<Vec<_>, _>>()?;
  let leaf = certs
    .first()
    .ok_or_else(|| anyhow::anyhow!("certificate chain is empty"))?;
  let (_, x509_certificate) = X509Certificate::from_der(leaf)?;
  Ok(x509_certificate.validity().not_after.timestamp())
}
