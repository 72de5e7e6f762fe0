use std::collections::HashMap;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ferron_store::model::{AccessList, Host};
use http_body_util::combinators::BoxBody;
use hyper::{HeaderMap, Request, Response, StatusCode, Uri};
use tokio::sync::RwLock;

use crate::logging::ErrorLogger;

/// A filter: one link of the fixed request-handling chain
/// steps 2-6; step 1, the ACME challenge responder, runs ahead of Host
/// resolution in the proxy engine itself and so isn't one of these). Where
/// the teacher's module system let arbitrary third-party crates register
/// themselves against a configuration block, a filter here is one of six
/// built-in stages, always run in the same order, always handed the
/// fully-resolved `Host` record the request matched.
#[async_trait(?Send)]
pub trait Filter {
  /// Handles the incoming request. Returning `Ok(ResponseData::default())`
  /// (nothing set) means "continue to the next filter in the chain".
  async fn request_handler(
    &mut self,
    request: Request<BoxBody<Bytes, std::io::Error>>,
    ctx: &mut FilterContext<'_>,
    error_logger: &ErrorLogger,
  ) -> Result<ResponseData, Box<dyn Error + Send + Sync>>;

  /// Modifies the outgoing response on its way back out (e.g. Header Rules
  /// applied in the `response` direction).
  async fn response_modifying_handler(
    &mut self,
    response: Response<BoxBody<Bytes, std::io::Error>>,
    _ctx: &mut FilterContext<'_>,
  ) -> Result<Response<BoxBody<Bytes, std::io::Error>>, Box<dyn Error + Send + Sync>> {
    Ok(response)
  }
}

/// Information about the network socket a request arrived on.
pub struct SocketData {
  /// The remote address of the socket.
  pub remote_addr: SocketAddr,
  /// The local address of the socket.
  pub local_addr: SocketAddr,
  /// Indicates if the connection is encrypted.
  pub encrypted: bool,
}

/// Settings carried on the Snapshot:
/// the trusted-proxy IP set and the custom error-page template.
#[derive(Clone, Default)]
pub struct Settings {
  pub trusted_proxies: Vec<cidr::IpCidr>,
  pub error_page_html: Option<String>,
}

impl Settings {
  pub fn is_trusted_proxy(&self, addr: std::net::IpAddr) -> bool {
    self.trusted_proxies.iter().any(|net| net.contains(&addr))
  }
}

/// Data threaded through the filter chain alongside the request, mutated in
/// place by earlier filters and read by later ones.
pub struct RequestData {
  /// The authenticated username, set once Access Control succeeds.
  pub auth_user: Option<String>,
  /// The original URL, captured before Location rewriting.
  pub original_url: Option<Uri>,
  /// The effective client address: the socket peer, or the left-most
  /// `X-Forwarded-For` entry once Trusted Proxy Normalization accepts it.
  pub effective_remote_addr: SocketAddr,
  /// The effective scheme: "http" or "https", likewise overridable by
  /// `X-Forwarded-Proto` from a trusted peer.
  pub effective_scheme: String,
  /// Set by Location Match: the upstream list to dispatch to, overriding
  /// the Host's own list. `None` means "use the Host's default upstreams".
  pub selected_upstreams: Option<Vec<String>>,
  pub selected_upstream_scheme: Option<ferron_store::model::UpstreamScheme>,
  pub selected_upstream_sni: Option<String>,
  pub selected_verify_ssl: Option<bool>,
  /// The path and query to forward upstream, after Location rewriting (if
  /// any). `None` means "forward the request path unchanged".
  pub forwarded_path_and_query: Option<String>,
}

impl RequestData {
  pub fn new(socket_data: &SocketData) -> Self {
    Self {
      auth_user: None,
      original_url: None,
      effective_remote_addr: socket_data.remote_addr,
      effective_scheme: if socket_data.encrypted { "https".to_string() } else { "http".to_string() },
      selected_upstreams: None,
      selected_upstream_scheme: None,
      selected_upstream_sni: None,
      selected_verify_ssl: None,
      forwarded_path_and_query: None,
    }
  }
}

/// What a filter decided to do with a request. An entirely empty
/// `ResponseData` means "continue to the next filter".
#[derive(Default)]
pub struct ResponseData {
  /// The request, handed back so the next filter can keep using it.
  pub request: Option<Request<BoxBody<Bytes, std::io::Error>>>,
  /// A full response body, short-circuiting the rest of the chain.
  pub response: Option<Response<BoxBody<Bytes, std::io::Error>>>,
  /// A status-only short-circuit (error page rendering fills in the body).
  pub response_status: Option<StatusCode>,
  /// Headers to merge into whatever response eventually gets sent.
  pub response_headers: Option<HeaderMap>,
}

pub type SharedHost = Arc<Host>;

/// Keyed by the ACME HTTP-01 token (the last path segment of
/// `/.well-known/acme-challenge/{token}`), mapping to the key authorization
/// string the challenge filter serves verbatim.
/// Single-writer (the ACME Worker), many-readers (the filter).
pub type Http01TokenStore = Arc<RwLock<HashMap<String, String>>>;

/// Everything a filter needs beyond the request body itself: the resolved
/// Host, its Access List (if any), the socket it arrived on, the Snapshot's
/// settings, and the mutable per-request scratch data.
pub struct FilterContext<'a> {
  pub host: &'a Host,
  pub access_list: Option<&'a AccessList>,
  pub socket_data: &'a SocketData,
  pub settings: &'a Settings,
  pub request_data: &'a mut RequestData,
}
