use std::error::Error;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use cidr::IpCidr;
use ferron_common::logging::ErrorLogger;
use ferron_common::modules::{Filter, FilterContext, ResponseData};
use http_body_util::combinators::BoxBody;
use hyper::{HeaderMap, Request, StatusCode};

use crate::util::parse_basic_auth;

/// Step 3 of the filter chain: IP allow/deny rules, then HTTP Basic Auth,
/// evaluated against the Host's Access List (if it has one).
pub struct AccessControlFilter;

#[async_trait(?Send)]
impl Filter for AccessControlFilter {
  async fn request_handler(
    &mut self,
    request: Request<BoxBody<Bytes, std::io::Error>>,
    ctx: &mut FilterContext<'_>,
    _error_logger: &ErrorLogger,
  ) -> Result<ResponseData, Box<dyn Error + Send + Sync>> {
    let Some(access_list) = ctx.access_list else {
      return Ok(ResponseData {
        request: Some(request),
        ..Default::default()
      });
    };

    if !access_list.ip_rules.is_empty() {
      let client_ip = ctx.request_data.effective_remote_addr.ip();
      let mut decision: Option<bool> = None;
      let mut saw_allow_rule = false;
      let mut rules = access_list.ip_rules.clone();
      rules.sort_by_key(|rule| rule.position);
      for rule in &rules {
        if rule.allow {
          saw_allow_rule = true;
        }
        let Ok(cidr) = IpCidr::from_str(&rule.cidr) else {
          continue;
        };
        if cidr.contains(&client_ip) {
          decision = Some(rule.allow);
          break;
        }
      }
      let allowed = match decision {
        Some(allow) => allow,
        None => !saw_allow_rule,
      };
      if !allowed {
        return Ok(ResponseData {
          response_status: Some(StatusCode::FORBIDDEN),
          ..Default::default()
        });
      }
    }

    if !access_list.clients.is_empty() {
      let credentials = request
        .headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_basic_auth);

      let authenticated = credentials.as_ref().and_then(|(user, pass)| {
        access_list
          .clients
          .iter()
          .find(|client| client.username == *user)
          .filter(|client| password_auth::verify_password(pass, &client.password_verifier).is_ok())
      });

      match authenticated {
        Some(client) => {
          ctx.request_data.auth_user = Some(client.username.clone());
        }
        None => {
          let mut headers = HeaderMap::new();
          headers.insert(
            hyper::header::WWW_AUTHENTICATE,
            "Basic realm=\"Restricted\"".parse()?,
          );
          return Ok(ResponseData {
            response_status: Some(StatusCode::UNAUTHORIZED),
            response_headers: Some(headers),
            ..Default::default()
          });
        }
      }
    }

    Ok(ResponseData {
      request: Some(request),
      ..Default::default()
    })
  }
}
