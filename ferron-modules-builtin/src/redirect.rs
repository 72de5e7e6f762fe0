use std::error::Error;

use async_trait::async_trait;
use bytes::Bytes;
use ferron_common::logging::ErrorLogger;
use ferron_common::modules::{Filter, FilterContext, ResponseData};
use http_body_util::combinators::BoxBody;
use hyper::{HeaderMap, Request, StatusCode};

/// Step 5 of the filter chain: an unconditional redirect configured on the
/// Host, independent of the request path.
pub struct RedirectFilter;

#[async_trait(?Send)]
impl Filter for RedirectFilter {
  async fn request_handler(
    &mut self,
    request: Request<BoxBody<Bytes, std::io::Error>>,
    ctx: &mut FilterContext<'_>,
    _error_logger: &ErrorLogger,
  ) -> Result<ResponseData, Box<dyn Error + Send + Sync>> {
    if let Some(redirect_to) = ctx.host.redirect_to.as_deref().filter(|s| !s.is_empty()) {
      let status = match ctx.host.redirect_status {
        Some(302) => StatusCode::FOUND,
        _ => StatusCode::MOVED_PERMANENTLY,
      };
      let mut headers = HeaderMap::new();
      headers.insert(hyper::header::LOCATION, redirect_to.parse()?);
      return Ok(ResponseData {
        response_status: Some(status),
        response_headers: Some(headers),
        ..Default::default()
      });
    }

    Ok(ResponseData {
      request: Some(request),
      ..Default::default()
    })
  }
}
