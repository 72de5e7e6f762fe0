use async_channel::Sender;

/// One certificate-acquisition/renewal job. Enqueued either by an admin API
/// call requesting a new certificate, or by the ACME Worker's own hourly
/// renewal scan.
#[derive(Clone, Debug)]
pub struct CertificateRequest {
  pub domain: String,
  pub contact_email: String,
  pub dns_provider_id: Option<i64>,
}

/// The producer side of the Worker's job queue. `ferron-admin-api` holds a
/// clone of this without depending on the `ferron` bin crate, the same way
/// it holds a `ReconcileHandle`.
pub type AcmeJobQueue = Sender<CertificateRequest>;
