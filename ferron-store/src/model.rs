use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One virtual host, keyed by its case-folded fully-qualified domain name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Host {
  pub id: i64,
  pub domain: String,
  pub upstreams: Vec<String>,
  pub upstream_scheme: UpstreamScheme,
  pub upstream_sni: Option<String>,
  pub verify_ssl: bool,
  pub ssl_forced: bool,
  pub redirect_to: Option<String>,
  pub redirect_status: Option<u16>,
  pub access_list_id: Option<i64>,
  pub locations: Vec<Location>,
  pub header_rules: Vec<HeaderRule>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamScheme {
  Http,
  Https,
}

impl UpstreamScheme {
  pub fn as_str(&self) -> &'static str {
    match self {
      UpstreamScheme::Http => "http",
      UpstreamScheme::Https => "https",
    }
  }

  pub fn parse(s: &str) -> Self {
    if s.eq_ignore_ascii_case("https") {
      UpstreamScheme::Https
    } else {
      UpstreamScheme::Http
    }
  }
}

/// A path-prefixed sub-route of a Host, unique per (host, path).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Location {
  pub id: i64,
  pub host_id: i64,
  pub path: String,
  pub upstreams: Vec<String>,
  pub upstream_scheme: UpstreamScheme,
  pub upstream_sni: Option<String>,
  pub verify_ssl: bool,
  pub rewrite: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderDirection {
  Request,
  Response,
}

impl HeaderDirection {
  pub fn parse(s: &str) -> Self {
    if s.eq_ignore_ascii_case("response") {
      HeaderDirection::Response
    } else {
      HeaderDirection::Request
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      HeaderDirection::Request => "request",
      HeaderDirection::Response => "response",
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeaderRule {
  pub id: i64,
  pub name: String,
  pub value: String,
  pub direction: HeaderDirection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamProtocol {
  Tcp,
  Udp,
}

impl StreamProtocol {
  pub fn parse(s: &str) -> Self {
    if s.eq_ignore_ascii_case("udp") {
      StreamProtocol::Udp
    } else {
      StreamProtocol::Tcp
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      StreamProtocol::Tcp => "tcp",
      StreamProtocol::Udp => "udp",
    }
  }
}

/// An L4 forward from a fixed listen port to a fixed upstream endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Stream {
  pub id: i64,
  pub listen_port: u16,
  pub protocol: StreamProtocol,
  pub forward_host: String,
  pub forward_port: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IpRule {
  pub id: i64,
  pub position: i64,
  pub cidr: String,
  pub allow: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientCredential {
  pub id: i64,
  pub username: String,
  pub password_verifier: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessList {
  pub id: i64,
  pub name: String,
  pub clients: Vec<ClientCredential>,
  pub ip_rules: Vec<IpRule>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Certificate {
  pub id: i64,
  pub domain: String,
  pub chain_pem: Vec<u8>,
  pub key_pem: Vec<u8>,
  pub expires_at: i64,
  pub dns_provider_id: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DnsProviderRecord {
  pub id: i64,
  pub name: String,
  pub provider_type: String,
  pub credentials: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
  Admin,
  Operator,
  Viewer,
}

impl UserRole {
  pub fn parse(s: &str) -> Self {
    match s {
      "admin" => UserRole::Admin,
      "operator" => UserRole::Operator,
      _ => UserRole::Viewer,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      UserRole::Admin => "admin",
      UserRole::Operator => "operator",
      UserRole::Viewer => "viewer",
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
  pub id: i64,
  pub username: String,
  pub password_verifier: String,
  pub role: UserRole,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
  pub id: i64,
  pub ts: DateTime<Utc>,
  pub actor_username: String,
  pub action: String,
  pub resource_type: String,
  pub resource_id: Option<String>,
  pub detail: Option<String>,
  pub origin_ip: Option<String>,
}

/// Helper shared by the store and the admin API: splits an operator-facing
/// CSV upstream list into a canonical `Vec<String>`. See SPEC_FULL.md/DESIGN.md's
/// Open Question note: canonicalization happens at the admin boundary only.
pub fn split_upstreams(csv: &str) -> Vec<String> {
  csv
    .split(',')
    .map(|s| s.trim())
    .filter(|s| !s.is_empty())
    .map(|s| s.to_string())
    .collect()
}

pub fn join_upstreams(upstreams: &[String]) -> String {
  upstreams.join(",")
}
