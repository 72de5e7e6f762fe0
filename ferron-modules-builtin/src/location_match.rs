use std::error::Error;

use async_trait::async_trait;
use bytes::Bytes;
use ferron_common::logging::ErrorLogger;
use ferron_common::modules::{Filter, FilterContext, ResponseData};
use ferron_store::model::Location;
use http_body_util::combinators::BoxBody;
use hyper::Request;

/// Step 6 of the filter chain: picks the Location whose path is the
/// longest prefix of the request path, and rewrites the forwarded path if
/// that Location asks for it.
pub struct LocationMatchFilter;

fn normalize(path: &str) -> String {
  let mut normalized = path.to_string();
  while normalized.contains("//") {
    normalized = normalized.replace("//", "/");
  }
  while normalized.len() > 1 && normalized.ends_with('/') {
    normalized.pop();
  }
  normalized
}

/// Whether `location_path` prefix-matches `req_path` on a path-segment
/// boundary (so `/api` matches `/api/v1` but not `/apiv1`).
fn matches(location_path: &str, req_path: &str) -> bool {
  let location_path = normalize(location_path);
  let req_path = normalize(req_path);
  req_path == location_path || req_path.starts_with(&format!("{}/", location_path))
}

/// Picks the best-matching Location: longest path wins, ties broken by
/// declaration order (earliest in the Host's `locations` vector).
fn select_location<'a>(locations: &'a [Location], req_path: &str) -> Option<&'a Location> {
  locations
    .iter()
    .filter(|location| matches(&location.path, req_path))
    .enumerate()
    .max_by_key(|(index, location)| (location.path.len(), std::cmp::Reverse(*index)))
    .map(|(_, location)| location)
}

fn rewrite_path(location_path: &str, req_path: &str) -> String {
  let location_path = normalize(location_path);
  let stripped = req_path.strip_prefix(&location_path).unwrap_or(req_path);
  if stripped.is_empty() {
    "/".to_string()
  } else if stripped.starts_with('/') {
    stripped.to_string()
  } else {
    format!("/{}", stripped)
  }
}

#[async_trait(?Send)]
impl Filter for LocationMatchFilter {
  async fn request_handler(
    &mut self,
    request: Request<BoxBody<Bytes, std::io::Error>>,
    ctx: &mut FilterContext<'_>,
    _error_logger: &ErrorLogger,
  ) -> Result<ResponseData, Box<dyn Error + Send + Sync>> {
    let req_path = request.uri().path().to_string();
    let query = request.uri().query().map(|q| format!("?{}", q)).unwrap_or_default();

    if let Some(location) = select_location(&ctx.host.locations, &req_path) {
      ctx.request_data.selected_upstreams = Some(location.upstreams.clone());
      ctx.request_data.selected_upstream_scheme = Some(location.upstream_scheme);
      ctx.request_data.selected_upstream_sni = location.upstream_sni.clone();
      ctx.request_data.selected_verify_ssl = Some(location.verify_ssl);

      let forwarded_path = if location.rewrite {
        rewrite_path(&location.path, &req_path)
      } else {
        req_path
      };
      ctx.request_data.forwarded_path_and_query = Some(format!("{}{}", forwarded_path, query));
    }

    Ok(ResponseData {
      request: Some(request),
      ..Default::default()
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn location(path: &str, rewrite: bool) -> Location {
    Location {
      id: 1,
      host_id: 1,
      path: path.to_string(),
      upstreams: vec!["127.0.0.1:8080".to_string()],
      upstream_scheme: ferron_store::model::UpstreamScheme::Http,
      upstream_sni: None,
      verify_ssl: true,
      rewrite,
    }
  }

  #[test]
  fn longest_prefix_wins() {
    let locations = vec![location("/api", false), location("/api/v1", false)];
    let selected = select_location(&locations, "/api/v1/users").unwrap();
    assert_eq!(selected.path, "/api/v1");
  }

  #[test]
  fn ties_favor_declaration_order() {
    let locations = vec![location("/api", false), location("/api", false)];
    let selected = select_location(&locations, "/api/users").unwrap();
    assert_eq!(selected.path, "/api");
  }

  #[test]
  fn no_match_returns_none() {
    let locations = vec![location("/api", false)];
    assert!(select_location(&locations, "/other").is_none());
  }

  #[test]
  fn rewrite_strips_prefix() {
    assert_eq!(rewrite_path("/api", "/api/users"), "/users");
    assert_eq!(rewrite_path("/api", "/api"), "/");
  }
}
