use std::path::PathBuf;
use std::sync::Arc;

use ferron_common::acme::AcmeJobQueue;
use ferron_common::reconcile::ReconcileHandle;
use ferron_observability_builtin::Stats;
use ferron_store::Store;

/// Everything a route handler needs. Cheap to clone (every field is already
/// either `Arc`-backed or a pool handle), handed to `axum::Router::with_state`.
#[derive(Clone)]
pub struct AppState {
  pub store: Store,
  pub reconcile: Arc<dyn ReconcileHandle>,
  pub acme_jobs: AcmeJobQueue,
  pub stats: Arc<Stats>,
  pub jwt_secret: Arc<str>,
  pub access_log_path: Arc<PathBuf>,
}
