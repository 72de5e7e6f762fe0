//! The control-plane HTTP API: the sole mutation path into `ferron-store`,
//! per spec.md §6. Every write here lands in the Store, an Audit Event, and
//! a Publisher reconcile trigger in that order (see [`audit::record`]).

pub mod audit;
pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::{
  Router,
  middleware,
  routing::{delete, get, post, put},
};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Builds the full Admin API router. `/api/login` and `/metrics` are
/// reachable without a bearer token; every other route is wrapped in
/// [`auth::require_auth`].
pub fn build_router(state: AppState) -> Router {
  let public = Router::new()
    .route("/api/login", post(auth::login))
    .route("/metrics", get(routes::metrics::metrics));

  let protected = Router::new()
    .route("/api/hosts", get(routes::hosts::list_hosts).post(routes::hosts::create_host))
    .route("/api/hosts/{domain}", put(routes::hosts::update_host).delete(routes::hosts::delete_host))
    .route(
      "/api/hosts/{domain}/locations",
      post(routes::hosts::upsert_location).delete(routes::hosts::delete_location),
    )
    .route("/api/hosts/{domain}/headers", post(routes::hosts::add_header))
    .route("/api/hosts/{domain}/headers/{id}", delete(routes::hosts::delete_header))
    .route("/api/streams", get(routes::streams::list_streams).post(routes::streams::create_stream))
    .route("/api/streams/{listen_port}", delete(routes::streams::delete_stream))
    .route(
      "/api/access-lists",
      get(routes::access_lists::list_access_lists).post(routes::access_lists::create_access_list),
    )
    .route("/api/access-lists/{id}", delete(routes::access_lists::delete_access_list))
    .route(
      "/api/access-lists/{id}/clients",
      post(routes::access_lists::add_client),
    )
    .route(
      "/api/access-lists/{id}/clients/{username}",
      delete(routes::access_lists::delete_client),
    )
    .route(
      "/api/access-lists/{id}/ips",
      post(routes::access_lists::add_ip_rule).delete(routes::access_lists::delete_ip_rule),
    )
    .route("/api/certs", get(routes::certs::list_certs).post(routes::certs::request_cert))
    .route(
      "/api/dns-providers",
      get(routes::dns_providers::list_dns_providers).post(routes::dns_providers::create_dns_provider),
    )
    .route("/api/dns-providers/{id}", delete(routes::dns_providers::delete_dns_provider))
    .route("/api/users", get(routes::users::list_users).post(routes::users::create_user))
    .route("/api/users/{id}", put(routes::users::update_user).delete(routes::users::delete_user))
    .route("/api/users/me", get(routes::users::me))
    .route("/api/users/me/password", put(routes::users::change_my_password))
    .route("/api/audit-logs", get(routes::audit_logs::list_audit_logs))
    .route("/api/stats/realtime", get(routes::stats::realtime))
    .route("/api/stats/history", get(routes::stats::history))
    .route("/api/logs", get(routes::logs::tail_logs))
    .route(
      "/api/settings/error-page",
      get(routes::settings::get_error_page).post(routes::settings::set_error_page),
    )
    .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

  public.merge(protected).layer(TraceLayer::new_for_http()).with_state(state)
}
