use std::error::Error;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use connpool::Pool;
use ferron_common::logging::ErrorLogger;
use ferron_common::modules::{Filter, FilterContext, ResponseData};
use ferron_store::model::UpstreamScheme;
use http_body_util::combinators::BoxBody;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::client::conn::http1::SendRequest;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Request, Response, StatusCode, Uri};
use rustls_pki_types::ServerName;
use rustls_platform_verifier::ConfigVerifierExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::util::NoServerVerifier;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_WRITE_TIMEOUT: Duration = Duration::from_secs(60);

type ConnSender = SendRequest<BoxBody<Bytes, std::io::Error>>;

/// One pooled slot's identity: everything that changes the wire connection
/// itself, so two requests with different verification or SNI never reuse
/// each other's socket.
#[derive(Clone, Eq, PartialEq, Hash)]
struct PoolKey {
  scheme: UpstreamScheme,
  host: String,
  port: u16,
  sni: Option<String>,
  verify_ssl: bool,
}

/// Process-wide keep-alive pool, one slot per distinct upstream endpoint
/// (spec §4.2 step 7 / §9's per-endpoint pool note). Unbounded, matching the
/// teacher's `Connections::new()` default before an operator opts into a
/// global limit.
static CONNECTION_POOL: OnceLock<Arc<Pool<PoolKey, ConnSender>>> = OnceLock::new();

fn connection_pool() -> Arc<Pool<PoolKey, ConnSender>> {
  CONNECTION_POOL.get_or_init(|| Arc::new(Pool::new_unbounded())).clone()
}

/// Hop-by-hop headers that must never be forwarded verbatim (RFC 9110 §7.6.1).
const HOP_BY_HOP: &[&str] = &[
  "connection",
  "keep-alive",
  "proxy-authenticate",
  "proxy-authorization",
  "te",
  "trailer",
  "transfer-encoding",
  "upgrade",
];

/// Step 7, the last stop in the filter chain: picks one upstream endpoint
/// at random, dials it, forwards the request, and relays the response.
pub struct UpstreamDispatchFilter;

fn is_hop_by_hop(name: &HeaderName) -> bool {
  HOP_BY_HOP.iter().any(|h| name.as_str().eq_ignore_ascii_case(h))
}

fn copy_forwardable_headers(source: &HeaderMap, dest: &mut HeaderMap) {
  for (name, value) in source.iter() {
    if !is_hop_by_hop(name) {
      dest.append(name.clone(), value.clone());
    }
  }
}

async fn dial_plain(host: &str, port: u16) -> std::io::Result<TcpStream> {
  timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
    .await
    .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"))?
}

async fn dial_tls(
  host: &str,
  port: u16,
  sni: &str,
  verify_ssl: bool,
) -> Result<tokio_rustls::client::TlsStream<TcpStream>, Box<dyn Error + Send + Sync>> {
  let tcp = dial_plain(host, port).await?;
  let tls_client_config = (if !verify_ssl {
    rustls::ClientConfig::builder()
      .dangerous()
      .with_custom_certificate_verifier(Arc::new(NoServerVerifier::new()))
  } else {
    rustls::ClientConfig::builder().with_platform_verifier()?
  })
  .with_no_client_auth();
  let connector = tokio_rustls::TlsConnector::from(Arc::new(tls_client_config));
  let server_name = ServerName::try_from(sni.to_string())?;
  let tls_stream = timeout(CONNECT_TIMEOUT, connector.connect(server_name, tcp)).await??;
  Ok(tls_stream)
}

async fn handshake<S>(stream: S) -> Result<ConnSender, Box<dyn Error + Send + Sync>>
where
  S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
  let io = hyper_util::rt::TokioIo::new(stream);
  let (sender, connection) = hyper::client::conn::http1::handshake(io).await?;
  tokio::spawn(async move {
    let _ = connection.await;
  });
  Ok(sender)
}

async fn dial_and_handshake(key: &PoolKey) -> Result<ConnSender, Box<dyn Error + Send + Sync>> {
  match key.scheme {
    UpstreamScheme::Http => {
      let tcp = dial_plain(&key.host, key.port).await?;
      handshake(tcp).await
    }
    UpstreamScheme::Https => {
      let sni = key.sni.clone().unwrap_or_else(|| key.host.clone());
      let tls_stream = dial_tls(&key.host, key.port, &sni, key.verify_ssl).await?;
      handshake(tls_stream).await
    }
  }
}

/// Sends `request` over a pooled keep-alive connection for `key`, dialing
/// a fresh one if the pool has none ready, and returns the now-idle
/// connection to the pool afterwards if it is still usable.
async fn send_pooled(
  key: PoolKey,
  request: Request<BoxBody<Bytes, std::io::Error>>,
) -> Result<Response<Incoming>, Box<dyn Error + Send + Sync>> {
  let pool = connection_pool();
  let mut item = pool.pull_with_wait_local_limit(key.clone(), None).await;

  let mut sender = match item.inner_mut().take() {
    Some(sender) if !sender.is_closed() => sender,
    _ => dial_and_handshake(&key).await?,
  };

  let response = timeout(READ_WRITE_TIMEOUT, sender.send_request(request)).await??;

  if !sender.is_closed() {
    *item.inner_mut() = Some(sender);
  }

  Ok(response)
}

fn pick_endpoint(upstreams: &[String]) -> Option<&str> {
  if upstreams.is_empty() {
    return None;
  }
  let index = rand::random_range(0..upstreams.len());
  upstreams.get(index).map(|s| s.as_str())
}

fn split_host_port(endpoint: &str, default_port: u16) -> (String, u16) {
  match endpoint.rsplit_once(':') {
    Some((host, port)) if port.parse::<u16>().is_ok() => (host.to_string(), port.parse().unwrap()),
    _ => (endpoint.to_string(), default_port),
  }
}

#[async_trait(?Send)]
impl Filter for UpstreamDispatchFilter {
  async fn request_handler(
    &mut self,
    mut request: Request<BoxBody<Bytes, std::io::Error>>,
    ctx: &mut FilterContext<'_>,
    error_logger: &ErrorLogger,
  ) -> Result<ResponseData, Box<dyn Error + Send + Sync>> {
    let upstreams = ctx
      .request_data
      .selected_upstreams
      .clone()
      .unwrap_or_else(|| ctx.host.upstreams.clone());
    let scheme = ctx
      .request_data
      .selected_upstream_scheme
      .unwrap_or(ctx.host.upstream_scheme);
    let sni_override = ctx
      .request_data
      .selected_upstream_sni
      .clone()
      .or_else(|| ctx.host.upstream_sni.clone());
    let verify_ssl = ctx.request_data.selected_verify_ssl.unwrap_or(ctx.host.verify_ssl);

    let Some(endpoint) = pick_endpoint(&upstreams) else {
      return Ok(ResponseData {
        response_status: Some(StatusCode::BAD_GATEWAY),
        ..Default::default()
      });
    };

    let default_port = match scheme {
      UpstreamScheme::Http => 80,
      UpstreamScheme::Https => 443,
    };
    let (host, port) = split_host_port(endpoint, default_port);

    let path_and_query = ctx
      .request_data
      .forwarded_path_and_query
      .clone()
      .unwrap_or_else(|| {
        request
          .uri()
          .path_and_query()
          .map(|p| p.to_string())
          .unwrap_or_else(|| "/".to_string())
      });
    *request.uri_mut() = Uri::try_from(path_and_query)?;

    let headers = request.headers_mut();
    let mut forwarded = HeaderMap::new();
    copy_forwardable_headers(headers, &mut forwarded);
    forwarded.insert(
      HeaderName::from_static("x-forwarded-for"),
      HeaderValue::from_str(&ctx.request_data.effective_remote_addr.ip().to_string())?,
    );
    forwarded.insert(
      HeaderName::from_static("x-forwarded-proto"),
      HeaderValue::from_str(&ctx.request_data.effective_scheme)?,
    );
    if let Some(host_header) = headers.get(hyper::header::HOST).cloned() {
      forwarded.insert(HeaderName::from_static("x-forwarded-host"), host_header);
    }
    for rule in &ctx.host.header_rules {
      if rule.direction == ferron_store::model::HeaderDirection::Request {
        if let (Ok(name), Ok(value)) = (
          HeaderName::try_from(rule.name.as_str()),
          HeaderValue::from_str(&rule.value),
        ) {
          forwarded.insert(name, value);
        }
      }
    }
    *request.headers_mut() = forwarded;

    let pool_key = PoolKey {
      scheme,
      host: host.clone(),
      port,
      sni: sni_override,
      verify_ssl,
    };
    let dispatch_result = send_pooled(pool_key, request).await;

    let upstream_response = match dispatch_result {
      Ok(response) => response,
      Err(err) => {
        error_logger.log(format!("upstream dispatch to {}:{} failed: {}", host, port, err));
        let status = if err.to_string().contains("timed out") {
          StatusCode::GATEWAY_TIMEOUT
        } else {
          StatusCode::BAD_GATEWAY
        };
        return Ok(ResponseData {
          response_status: Some(status),
          ..Default::default()
        });
      }
    };

    let (mut parts, body) = upstream_response.into_parts();
    for rule in &ctx.host.header_rules {
      if rule.direction == ferron_store::model::HeaderDirection::Response {
        if let (Ok(name), Ok(value)) = (
          HeaderName::try_from(rule.name.as_str()),
          HeaderValue::from_str(&rule.value),
        ) {
          parts.headers.insert(name, value);
        }
      }
    }
    let boxed_body = body.map_err(std::io::Error::other).boxed();
    let response = Response::from_parts(parts, boxed_body);

    Ok(ResponseData {
      response: Some(response),
      ..Default::default()
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn picks_from_nonempty_set() {
    let upstreams = vec!["10.0.0.1:8080".to_string(), "10.0.0.2:8080".to_string()];
    let picked = pick_endpoint(&upstreams);
    assert!(picked.is_some());
    assert!(upstreams.contains(&picked.unwrap().to_string()));
  }

  #[test]
  fn empty_set_yields_none() {
    assert!(pick_endpoint(&[]).is_none());
  }

  #[test]
  fn splits_host_and_explicit_port() {
    assert_eq!(split_host_port("example.com:9000", 80), ("example.com".to_string(), 9000));
  }

  #[test]
  fn falls_back_to_default_port() {
    assert_eq!(split_host_port("example.com", 443), ("example.com".to_string(), 443));
  }
}
