use std::error::Error;

use async_trait::async_trait;
use bytes::Bytes;
use ferron_common::logging::ErrorLogger;
use ferron_common::modules::{Filter, FilterContext, ResponseData};
use http_body_util::combinators::BoxBody;
use hyper::Request;

/// Step 2 of the filter chain: if the immediate peer is a configured
/// trusted proxy, trust its `X-Forwarded-For`/`X-Forwarded-Proto` instead of
/// the raw socket peer, so downstream filters see the real client.
pub struct TrustedProxyFilter;

#[async_trait(?Send)]
impl Filter for TrustedProxyFilter {
  async fn request_handler(
    &mut self,
    request: Request<BoxBody<Bytes, std::io::Error>>,
    ctx: &mut FilterContext<'_>,
    _error_logger: &ErrorLogger,
  ) -> Result<ResponseData, Box<dyn Error + Send + Sync>> {
    if ctx.settings.is_trusted_proxy(ctx.socket_data.remote_addr.ip()) {
      if let Some(forwarded_for) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
      {
        if let Some(leftmost) = forwarded_for.split(',').next() {
          if let Ok(ip) = leftmost.trim().parse() {
            ctx.request_data.effective_remote_addr.set_ip(ip);
          }
        }
      }
      if let Some(forwarded_proto) = request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
      {
        ctx.request_data.effective_scheme = forwarded_proto.trim().to_lowercase();
      }
    }

    Ok(ResponseData {
      request: Some(request),
      ..Default::default()
    })
  }
}
