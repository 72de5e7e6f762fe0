use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_channel::Sender;
use bytes::Bytes;
use ferron_common::logging::{ErrorLogger, LogMessage};
use ferron_common::modules::{Filter, FilterContext, RequestData, ResponseData, SocketData};
use ferron_modules_builtin::{
  try_serve_challenge, AccessControlFilter, ForceHttpsFilter, LocationMatchFilter, RedirectFilter, TrustedProxyFilter,
  UpstreamDispatchFilter,
};
use ferron_observability_builtin::{format_combined_log, Stats};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, StatusCode};

use crate::snapshot::Snapshot;
use crate::util::render_error_page;

pub type AccessLog = Option<Sender<LogMessage>>;

pub type AnyBody = BoxBody<Bytes, std::io::Error>;

fn text_response(status: StatusCode, body: String) -> Response<AnyBody> {
  Response::builder()
    .status(status)
    .header(hyper::header::CONTENT_TYPE, "text/html; charset=utf-8")
    .body(Full::new(Bytes::from(body)).map_err(|never| match never {}).boxed())
    .unwrap_or_else(|_| Response::new(Full::new(Bytes::new()).map_err(|never| match never {}).boxed()))
}

/// Serves one request end-to-end: the ACME challenge short-circuit (ahead
/// of Host resolution), Host resolution, the ordered filter chain, and
/// Statistics recording.
pub async fn handle_request(
  request: Request<AnyBody>,
  snapshot: Arc<Snapshot>,
  socket_data: SocketData,
  stats: Arc<Stats>,
  tokens: ferron_common::modules::Http01TokenStore,
  error_logger: ErrorLogger,
  access_log: AccessLog,
) -> Response<AnyBody> {
  let method = request.method().to_string();
  let version = format!("{:?}", request.version());
  let path_and_query = request
    .uri()
    .path_and_query()
    .map(|pq| pq.as_str().to_string())
    .unwrap_or_else(|| request.uri().path().to_string());
  let referer = request.headers().get(hyper::header::REFERER).and_then(|v| v.to_str().ok()).map(str::to_string);
  let user_agent = request.headers().get(hyper::header::USER_AGENT).and_then(|v| v.to_str().ok()).map(str::to_string);

  if let Some(response) = try_serve_challenge(&request, &tokens).await {
    record_stats(&stats, &response);
    log_access(
      &access_log,
      socket_data.remote_addr,
      None,
      &method,
      &path_and_query,
      &version,
      &response,
      referer.as_deref(),
      user_agent.as_deref(),
    );
    return response;
  }

  let host_key = request
    .uri()
    .authority()
    .map(|a| a.host().to_string())
    .or_else(|| {
      request
        .headers()
        .get(hyper::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|h| h.split(':').next().unwrap_or(h).to_string())
    })
    .unwrap_or_default()
    .to_lowercase();

  let Some(host) = snapshot.resolve_host(&host_key) else {
    let response = text_response(
      StatusCode::NOT_FOUND,
      render_error_page(StatusCode::NOT_FOUND, snapshot.settings.error_page_html.as_deref()),
    );
    record_stats(&stats, &response);
    log_access(
      &access_log,
      socket_data.remote_addr,
      None,
      &method,
      &path_and_query,
      &version,
      &response,
      referer.as_deref(),
      user_agent.as_deref(),
    );
    return response;
  };

  let access_list = snapshot.resolve_access_list(host);
  let mut request_data = RequestData::new(&socket_data);

  let mut ctx = FilterContext {
    host: host.as_ref(),
    access_list,
    socket_data: &socket_data,
    settings: &snapshot.settings,
    request_data: &mut request_data,
  };

  let mut filters: Vec<Box<dyn Filter>> = vec![
    Box::new(TrustedProxyFilter),
    Box::new(AccessControlFilter),
    Box::new(ForceHttpsFilter),
    Box::new(RedirectFilter),
    Box::new(LocationMatchFilter),
    Box::new(UpstreamDispatchFilter),
  ];

  let mut current_request = Some(request);
  let mut response = None;

  for filter in filters.iter_mut() {
    let Some(request) = current_request.take() else {
      break;
    };
    match filter.request_handler(request, &mut ctx, &error_logger).await {
      Ok(ResponseData {
        request: next_request,
        response: short_circuit,
        response_status,
        response_headers,
      }) => {
        if let Some(short_circuit) = short_circuit {
          response = Some(short_circuit);
          break;
        }
        if let Some(status) = response_status {
          let mut built = text_response(status, render_error_page(status, snapshot.settings.error_page_html.as_deref()));
          if let Some(headers) = response_headers {
            for (name, value) in headers.iter() {
              built.headers_mut().insert(name.clone(), value.clone());
            }
          }
          response = Some(built);
          break;
        }
        current_request = next_request;
      }
      Err(err) => {
        error_logger.log(format!("filter chain error: {err}"));
        response = Some(text_response(
          StatusCode::BAD_GATEWAY,
          render_error_page(StatusCode::BAD_GATEWAY, snapshot.settings.error_page_html.as_deref()),
        ));
        break;
      }
    }
  }

  let response = response.unwrap_or_else(|| {
    text_response(
      StatusCode::NOT_FOUND,
      render_error_page(StatusCode::NOT_FOUND, snapshot.settings.error_page_html.as_deref()),
    )
  });

  record_stats(&stats, &response);
  log_access(
    &access_log,
    request_data.effective_remote_addr,
    request_data.auth_user.as_deref(),
    &method,
    &path_and_query,
    &version,
    &response,
    referer.as_deref(),
    user_agent.as_deref(),
  );
  response
}

#[allow(clippy::too_many_arguments)]
fn log_access(
  access_log: &AccessLog,
  remote_addr: SocketAddr,
  auth_user: Option<&str>,
  method: &str,
  path_and_query: &str,
  version: &str,
  response: &Response<AnyBody>,
  referer: Option<&str>,
  user_agent: Option<&str>,
) {
  let Some(sender) = access_log else {
    return;
  };
  let content_length = response
    .headers()
    .get(hyper::header::CONTENT_LENGTH)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.parse::<u64>().ok())
    .unwrap_or(0);
  let line = format_combined_log(
    &remote_addr.to_string(),
    auth_user,
    method,
    path_and_query,
    version,
    response.status().as_u16(),
    content_length,
    referer,
    user_agent,
  );
  sender.try_send(LogMessage::new(line, false)).ok();
}

fn record_stats(stats: &Arc<Stats>, response: &Response<AnyBody>) {
  let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0);
  let content_length = response
    .headers()
    .get(hyper::header::CONTENT_LENGTH)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.parse::<u64>().ok())
    .unwrap_or(0);
  stats.record_request(now, content_length, response.status().as_u16());
}
