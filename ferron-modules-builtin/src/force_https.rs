use std::error::Error;

use async_trait::async_trait;
use bytes::Bytes;
use ferron_common::logging::ErrorLogger;
use ferron_common::modules::{Filter, FilterContext, ResponseData};
use http_body_util::combinators::BoxBody;
use hyper::{HeaderMap, Request, StatusCode};

/// Step 4 of the filter chain: upgrade plain HTTP to HTTPS when the Host
/// requires it.
pub struct ForceHttpsFilter;

#[async_trait(?Send)]
impl Filter for ForceHttpsFilter {
  async fn request_handler(
    &mut self,
    request: Request<BoxBody<Bytes, std::io::Error>>,
    ctx: &mut FilterContext<'_>,
    _error_logger: &ErrorLogger,
  ) -> Result<ResponseData, Box<dyn Error + Send + Sync>> {
    if ctx.host.ssl_forced && ctx.request_data.effective_scheme == "http" {
      let path_and_query = request.uri().path_and_query().map(|p| p.as_str()).unwrap_or("/");
      let location = format!("https://{}{}", ctx.host.domain, path_and_query);
      let mut headers = HeaderMap::new();
      headers.insert(hyper::header::LOCATION, location.parse()?);
      return Ok(ResponseData {
        response_status: Some(StatusCode::MOVED_PERMANENTLY),
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
