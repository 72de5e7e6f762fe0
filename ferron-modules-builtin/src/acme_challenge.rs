use bytes::Bytes;
use ferron_common::modules::Http01TokenStore;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, Response, StatusCode};

/// Filter chain step 1: served ahead of Host resolution, so
/// it has no `Host` to act on and doesn't implement the `Filter` trait —
/// the proxy engine calls this directly on every request before looking
/// the Host index up.
///
/// Returns `Some(response)` when the request matched the ACME challenge
/// path, regardless of whether a token was found for it.
pub async fn try_serve_challenge(
  request: &Request<BoxBody<Bytes, std::io::Error>>,
  tokens: &Http01TokenStore,
) -> Option<Response<BoxBody<Bytes, std::io::Error>>> {
  if request.method() != Method::GET {
    return None;
  }
  let token = request.uri().path().strip_prefix("/.well-known/acme-challenge/")?;
  if token.is_empty() || token.contains('/') {
    return None;
  }

  let key_authorization = tokens.read().await.get(token).cloned();
  let response = match key_authorization {
    Some(key_authorization) => Response::builder()
      .status(StatusCode::OK)
      .header(hyper::header::CONTENT_TYPE, "text/plain")
      .body(Full::new(Bytes::from(key_authorization)).map_err(|never| match never {}).boxed())
      .ok()?,
    None => Response::builder()
      .status(StatusCode::NOT_FOUND)
      .body(Full::new(Bytes::new()).map_err(|never| match never {}).boxed())
      .ok()?,
  };
  Some(response)
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;
  use std::sync::Arc;

  use http_body_util::Empty;
  use tokio::sync::RwLock;

  use super::*;

  fn empty_request(method: Method, path: &str) -> Request<BoxBody<Bytes, std::io::Error>> {
    Request::builder()
      .method(method)
      .uri(path)
      .body(Empty::new().map_err(|never| match never {}).boxed())
      .unwrap()
  }

  #[tokio::test]
  async fn serves_known_token() {
    let tokens: Http01TokenStore = Arc::new(RwLock::new(HashMap::from([(
      "abc".to_string(),
      "abc.xyz".to_string(),
    )])));
    let request = empty_request(Method::GET, "/.well-known/acme-challenge/abc");
    let response = try_serve_challenge(&request, &tokens).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn unknown_token_is_404() {
    let tokens: Http01TokenStore = Arc::new(RwLock::new(HashMap::new()));
    let request = empty_request(Method::GET, "/.well-known/acme-challenge/missing");
    let response = try_serve_challenge(&request, &tokens).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn non_matching_path_is_ignored() {
    let tokens: Http01TokenStore = Arc::new(RwLock::new(HashMap::new()));
    let request = empty_request(Method::GET, "/index.html");
    assert!(try_serve_challenge(&request, &tokens).await.is_none());
  }
}
