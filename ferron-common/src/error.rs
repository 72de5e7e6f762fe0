use hyper::StatusCode;

/// The request-scoped error taxonomy. Every filter returns one of these
/// instead of a bare `anyhow::Error` so the chain never has to string-match
/// an error to decide what status code to send.
#[derive(Debug)]
pub enum ProxyError {
  /// Malformed request, invalid Host header, oversized headers.
  ClientProtocol(String),
  /// ACL rejection.
  Unauthorized { status: StatusCode, www_authenticate: Option<String> },
  /// Unknown host, missing ACME token.
  NotFound,
  /// DNS/connect/TLS failure reaching the upstream.
  UpstreamUnreachable(String),
  /// A per-request deadline was hit.
  UpstreamTimeout,
  /// Snapshot build failed; the previous snapshot is retained.
  ConfigInvalid(String),
}

impl ProxyError {
  pub fn status(&self) -> StatusCode {
    match self {
      ProxyError::ClientProtocol(_) => StatusCode::BAD_REQUEST,
      ProxyError::Unauthorized { status, .. } => *status,
      ProxyError::NotFound => StatusCode::NOT_FOUND,
      ProxyError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
      ProxyError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
      ProxyError::ConfigInvalid(_) => StatusCode::BAD_REQUEST,
    }
  }

  pub fn www_authenticate(&self) -> Option<&str> {
    match self {
      ProxyError::Unauthorized { www_authenticate, .. } => www_authenticate.as_deref(),
      _ => None,
    }
  }
}

impl std::fmt::Display for ProxyError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ProxyError::ClientProtocol(msg) => write!(f, "client protocol error: {msg}"),
      ProxyError::Unauthorized { status, .. } => write!(f, "unauthorized ({status})"),
      ProxyError::NotFound => write!(f, "not found"),
      ProxyError::UpstreamUnreachable(msg) => write!(f, "upstream unreachable: {msg}"),
      ProxyError::UpstreamTimeout => write!(f, "upstream timeout"),
      ProxyError::ConfigInvalid(msg) => write!(f, "invalid configuration: {msg}"),
    }
  }
}

impl std::error::Error for ProxyError {}

/// Errors that abort the whole process at startup (fatal, exit code 1) or
/// during a runtime invariant violation the process cannot recover from
/// (exit code 2).
#[derive(Debug)]
pub enum FatalError {
  ListenerBind(String),
  StoreOpen(String),
  Runtime(String),
}

impl std::fmt::Display for FatalError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      FatalError::ListenerBind(msg) => write!(f, "failed to bind listener: {msg}"),
      FatalError::StoreOpen(msg) => write!(f, "failed to open store: {msg}"),
      FatalError::Runtime(msg) => write!(f, "unrecoverable runtime error: {msg}"),
    }
  }
}

impl std::error::Error for FatalError {}

impl FatalError {
  /// The process exit code this fatal condition maps to.
  pub fn exit_code(&self) -> i32 {
    match self {
      FatalError::ListenerBind(_) | FatalError::StoreOpen(_) => 1,
      FatalError::Runtime(_) => 2,
    }
  }
}
