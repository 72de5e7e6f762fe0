use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;

use crate::model::*;

/// Handle onto the SQLite-backed persistent store. Cheap to clone (wraps a
/// connection pool), so it can be handed to the Admin API, the ACME Worker
/// and the Snapshot Publisher alike.
#[derive(Clone)]
pub struct Store {
  pool: SqlitePool,
}

impl Store {
  /// Opens (creating if absent) the store at `path` and runs pending
  /// migrations. Mirrors the teacher's "create parent dir, then open" shape
  /// used for `AcmeCache::File`.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await.ok();
    }
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
      .create_if_missing(true)
      .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
      .max_connections(8)
      .connect_with(options)
      .await
      .with_context(|| format!("opening store at {}", path.display()))?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(Self { pool })
  }

  pub fn pool(&self) -> &SqlitePool {
    &self.pool
  }

  // ---- Hosts -------------------------------------------------------

  pub async fn list_hosts(&self) -> Result<Vec<Host>> {
    let rows = sqlx::query("SELECT * FROM hosts ORDER BY domain").fetch_all(&self.pool).await?;
    let mut hosts = Vec::with_capacity(rows.len());
    for row in rows {
      hosts.push(self.hydrate_host(row).await?);
    }
    Ok(hosts)
  }

  pub async fn get_host_by_domain(&self, domain: &str) -> Result<Option<Host>> {
    let row = sqlx::query("SELECT * FROM hosts WHERE domain = ?")
      .bind(domain.to_lowercase())
      .fetch_optional(&self.pool)
      .await?;
    match row {
      Some(row) => Ok(Some(self.hydrate_host(row).await?)),
      None => Ok(None),
    }
  }

  async fn hydrate_host(&self, row: sqlx::sqlite::SqliteRow) -> Result<Host> {
    let id: i64 = row.try_get("id")?;
    let locations = sqlx::query("SELECT * FROM locations WHERE host_id = ? ORDER BY LENGTH(path) DESC, id ASC")
      .bind(id)
      .fetch_all(&self.pool)
      .await?
      .into_iter()
      .map(|r| -> Result<Location> {
        Ok(Location {
          id: r.try_get("id")?,
          host_id: r.try_get("host_id")?,
          path: r.try_get("path")?,
          upstreams: split_upstreams(&r.try_get::<String, _>("upstreams")?),
          upstream_scheme: UpstreamScheme::parse(&r.try_get::<String, _>("upstream_scheme")?),
          upstream_sni: r.try_get("upstream_sni")?,
          verify_ssl: r.try_get::<i64, _>("verify_ssl")? != 0,
          rewrite: r.try_get::<i64, _>("rewrite")? != 0,
        })
      })
      .collect::<Result<Vec<_>>>()?;

    let header_rules = sqlx::query("SELECT * FROM header_rules WHERE host_id = ?")
      .bind(id)
      .fetch_all(&self.pool)
      .await?
      .into_iter()
      .map(|r| -> Result<HeaderRule> {
        Ok(HeaderRule {
          id: r.try_get("id")?,
          name: r.try_get("name")?,
          value: r.try_get("value")?,
          direction: HeaderDirection::parse(&r.try_get::<String, _>("direction")?),
        })
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(Host {
      id,
      domain: row.try_get("domain")?,
      upstreams: split_upstreams(&row.try_get::<String, _>("upstreams")?),
      upstream_scheme: UpstreamScheme::parse(&row.try_get::<String, _>("upstream_scheme")?),
      upstream_sni: row.try_get("upstream_sni")?,
      verify_ssl: row.try_get::<i64, _>("verify_ssl")? != 0,
      ssl_forced: row.try_get::<i64, _>("ssl_forced")? != 0,
      redirect_to: row.try_get("redirect_to")?,
      redirect_status: row.try_get::<Option<i64>, _>("redirect_status")?.map(|v| v as u16),
      access_list_id: row.try_get("access_list_id")?,
      locations,
      header_rules,
    })
  }

  pub async fn insert_host(&self, h: &NewHost) -> Result<i64> {
    if self.get_host_by_domain(&h.domain).await?.is_some() {
      return Err(anyhow!("host '{}' already exists", h.domain));
    }
    let id = sqlx::query(
      "INSERT INTO hosts (domain, upstreams, upstream_scheme, upstream_sni, verify_ssl, ssl_forced, redirect_to, redirect_status, access_list_id, updated_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(h.domain.to_lowercase())
    .bind(join_upstreams(&h.upstreams))
    .bind(h.upstream_scheme.as_str())
    .bind(&h.upstream_sni)
    .bind(h.verify_ssl as i64)
    .bind(h.ssl_forced as i64)
    .bind(&h.redirect_to)
    .bind(h.redirect_status.map(|v| v as i64))
    .bind(h.access_list_id)
    .bind(Utc::now().to_rfc3339())
    .execute(&self.pool)
    .await?
    .last_insert_rowid();
    Ok(id)
  }

  pub async fn update_host(&self, id: i64, h: &NewHost) -> Result<()> {
    sqlx::query(
      "UPDATE hosts SET domain = ?, upstreams = ?, upstream_scheme = ?, upstream_sni = ?, verify_ssl = ?, ssl_forced = ?, redirect_to = ?, redirect_status = ?, access_list_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(h.domain.to_lowercase())
    .bind(join_upstreams(&h.upstreams))
    .bind(h.upstream_scheme.as_str())
    .bind(&h.upstream_sni)
    .bind(h.verify_ssl as i64)
    .bind(h.ssl_forced as i64)
    .bind(&h.redirect_to)
    .bind(h.redirect_status.map(|v| v as i64))
    .bind(h.access_list_id)
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  pub async fn delete_host(&self, domain: &str) -> Result<()> {
    sqlx::query("DELETE FROM hosts WHERE domain = ?")
      .bind(domain.to_lowercase())
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  // ---- Locations -----------------------------------------------------

  pub async fn upsert_location(&self, host_id: i64, loc: &NewLocation) -> Result<i64> {
    let id = sqlx::query(
      "INSERT INTO locations (host_id, path, upstreams, upstream_scheme, upstream_sni, verify_ssl, rewrite)
       VALUES (?, ?, ?, ?, ?, ?, ?)
       ON CONFLICT(host_id, path) DO UPDATE SET
         upstreams = excluded.upstreams, upstream_scheme = excluded.upstream_scheme,
         upstream_sni = excluded.upstream_sni, verify_ssl = excluded.verify_ssl, rewrite = excluded.rewrite
       RETURNING id",
    )
    .bind(host_id)
    .bind(&loc.path)
    .bind(join_upstreams(&loc.upstreams))
    .bind(loc.upstream_scheme.as_str())
    .bind(&loc.upstream_sni)
    .bind(loc.verify_ssl as i64)
    .bind(loc.rewrite as i64)
    .fetch_one(&self.pool)
    .await?
    .try_get("id")?;
    Ok(id)
  }

  pub async fn delete_location(&self, host_id: i64, path: &str) -> Result<()> {
    sqlx::query("DELETE FROM locations WHERE host_id = ? AND path = ?")
      .bind(host_id)
      .bind(path)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  // ---- Header rules ----------------------------------------------------

  pub async fn add_header_rule(&self, host_id: i64, name: &str, value: &str, direction: HeaderDirection) -> Result<i64> {
    let id = sqlx::query("INSERT INTO header_rules (host_id, name, value, direction) VALUES (?, ?, ?, ?)")
      .bind(host_id)
      .bind(name)
      .bind(value)
      .bind(direction.as_str())
      .execute(&self.pool)
      .await?
      .last_insert_rowid();
    Ok(id)
  }

  pub async fn delete_header_rule(&self, host_id: i64, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM header_rules WHERE host_id = ? AND id = ?")
      .bind(host_id)
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  // ---- Streams -----------------------------------------------------

  pub async fn list_streams(&self) -> Result<Vec<Stream>> {
    let rows = sqlx::query("SELECT * FROM streams ORDER BY listen_port").fetch_all(&self.pool).await?;
    rows
      .into_iter()
      .map(|r| -> Result<Stream> {
        Ok(Stream {
          id: r.try_get("id")?,
          listen_port: r.try_get::<i64, _>("listen_port")? as u16,
          protocol: StreamProtocol::parse(&r.try_get::<String, _>("protocol")?),
          forward_host: r.try_get("forward_host")?,
          forward_port: r.try_get::<i64, _>("forward_port")? as u16,
        })
      })
      .collect()
  }

  pub async fn insert_stream(&self, s: &NewStream) -> Result<i64> {
    let id = sqlx::query("INSERT INTO streams (listen_port, protocol, forward_host, forward_port) VALUES (?, ?, ?, ?)")
      .bind(s.listen_port as i64)
      .bind(s.protocol.as_str())
      .bind(&s.forward_host)
      .bind(s.forward_port as i64)
      .execute(&self.pool)
      .await?
      .last_insert_rowid();
    Ok(id)
  }

  pub async fn delete_stream(&self, listen_port: u16) -> Result<()> {
    sqlx::query("DELETE FROM streams WHERE listen_port = ?")
      .bind(listen_port as i64)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  // ---- Access lists -----------------------------------------------------

  pub async fn list_access_lists(&self) -> Result<Vec<AccessList>> {
    let rows = sqlx::query("SELECT id FROM access_lists ORDER BY id").fetch_all(&self.pool).await?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
      let id: i64 = row.try_get("id")?;
      if let Some(al) = self.get_access_list(id).await? {
        out.push(al);
      }
    }
    Ok(out)
  }

  pub async fn get_access_list(&self, id: i64) -> Result<Option<AccessList>> {
    let row = sqlx::query("SELECT * FROM access_lists WHERE id = ?").bind(id).fetch_optional(&self.pool).await?;
    let Some(row) = row else { return Ok(None) };
    let clients = sqlx::query("SELECT * FROM access_list_clients WHERE access_list_id = ?")
      .bind(id)
      .fetch_all(&self.pool)
      .await?
      .into_iter()
      .map(|r| -> Result<ClientCredential> {
        Ok(ClientCredential {
          id: r.try_get("id")?,
          username: r.try_get("username")?,
          password_verifier: r.try_get("password_verifier")?,
        })
      })
      .collect::<Result<Vec<_>>>()?;
    let ip_rules = sqlx::query("SELECT * FROM access_list_ip_rules WHERE access_list_id = ? ORDER BY position ASC")
      .bind(id)
      .fetch_all(&self.pool)
      .await?
      .into_iter()
      .map(|r| -> Result<IpRule> {
        Ok(IpRule {
          id: r.try_get("id")?,
          position: r.try_get("position")?,
          cidr: r.try_get("cidr")?,
          allow: r.try_get::<String, _>("action")? == "allow",
        })
      })
      .collect::<Result<Vec<_>>>()?;
    Ok(Some(AccessList { id, name: row.try_get("name")?, clients, ip_rules }))
  }

  pub async fn insert_access_list(&self, name: &str) -> Result<i64> {
    Ok(
      sqlx::query("INSERT INTO access_lists (name) VALUES (?)")
        .bind(name)
        .execute(&self.pool)
        .await?
        .last_insert_rowid(),
    )
  }

  pub async fn delete_access_list(&self, id: i64) -> Result<()> {
    let referenced: i64 = sqlx::query("SELECT COUNT(*) AS c FROM hosts WHERE access_list_id = ?")
      .bind(id)
      .fetch_one(&self.pool)
      .await?
      .try_get("c")?;
    if referenced > 0 {
      return Err(anyhow!("access list {id} is still referenced by {referenced} host(s)"));
    }
    sqlx::query("DELETE FROM access_lists WHERE id = ?").bind(id).execute(&self.pool).await?;
    Ok(())
  }

  pub async fn add_access_list_client(&self, access_list_id: i64, username: &str, password_verifier: &str) -> Result<i64> {
    Ok(
      sqlx::query(
        "INSERT INTO access_list_clients (access_list_id, username, password_verifier) VALUES (?, ?, ?)
         ON CONFLICT(access_list_id, username) DO UPDATE SET password_verifier = excluded.password_verifier
         RETURNING id",
      )
      .bind(access_list_id)
      .bind(username)
      .bind(password_verifier)
      .fetch_one(&self.pool)
      .await?
      .try_get("id")?,
    )
  }

  pub async fn delete_access_list_client(&self, access_list_id: i64, username: &str) -> Result<()> {
    sqlx::query("DELETE FROM access_list_clients WHERE access_list_id = ? AND username = ?")
      .bind(access_list_id)
      .bind(username)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  pub async fn add_access_list_ip_rule(&self, access_list_id: i64, cidr: &str, allow: bool) -> Result<i64> {
    let position: i64 = sqlx::query("SELECT COALESCE(MAX(position), -1) + 1 AS p FROM access_list_ip_rules WHERE access_list_id = ?")
      .bind(access_list_id)
      .fetch_one(&self.pool)
      .await?
      .try_get("p")?;
    Ok(
      sqlx::query("INSERT INTO access_list_ip_rules (access_list_id, position, cidr, action) VALUES (?, ?, ?, ?)")
        .bind(access_list_id)
        .bind(position)
        .bind(cidr)
        .bind(if allow { "allow" } else { "deny" })
        .execute(&self.pool)
        .await?
        .last_insert_rowid(),
    )
  }

  pub async fn delete_access_list_ip_rule(&self, access_list_id: i64, cidr: &str) -> Result<()> {
    sqlx::query("DELETE FROM access_list_ip_rules WHERE access_list_id = ? AND cidr = ?")
      .bind(access_list_id)
      .bind(cidr)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  // ---- Certificates -----------------------------------------------------

  pub async fn list_certificates(&self) -> Result<Vec<Certificate>> {
    let rows = sqlx::query("SELECT * FROM certificates ORDER BY domain").fetch_all(&self.pool).await?;
    rows
      .into_iter()
      .map(|r| -> Result<Certificate> {
        Ok(Certificate {
          id: r.try_get("id")?,
          domain: r.try_get("domain")?,
          chain_pem: r.try_get("chain_pem")?,
          key_pem: r.try_get("key_pem")?,
          expires_at: r.try_get("expires_at")?,
          dns_provider_id: r.try_get("dns_provider_id")?,
        })
      })
      .collect()
  }

  pub async fn upsert_certificate(&self, domain: &str, chain_pem: &[u8], key_pem: &[u8], expires_at: i64, dns_provider_id: Option<i64>) -> Result<i64> {
    let existing = sqlx::query("SELECT id FROM certificates WHERE domain = ?").bind(domain).fetch_optional(&self.pool).await?;
    if let Some(row) = existing {
      let id: i64 = row.try_get("id")?;
      sqlx::query("UPDATE certificates SET chain_pem = ?, key_pem = ?, expires_at = ?, dns_provider_id = ? WHERE id = ?")
        .bind(chain_pem)
        .bind(key_pem)
        .bind(expires_at)
        .bind(dns_provider_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
      Ok(id)
    } else {
      Ok(
        sqlx::query("INSERT INTO certificates (domain, chain_pem, key_pem, expires_at, dns_provider_id) VALUES (?, ?, ?, ?, ?)")
          .bind(domain)
          .bind(chain_pem)
          .bind(key_pem)
          .bind(expires_at)
          .bind(dns_provider_id)
          .execute(&self.pool)
          .await?
          .last_insert_rowid(),
      )
    }
  }

  // ---- DNS providers -----------------------------------------------------

  pub async fn list_dns_providers(&self) -> Result<Vec<DnsProviderRecord>> {
    let rows = sqlx::query("SELECT * FROM dns_providers ORDER BY name").fetch_all(&self.pool).await?;
    rows
      .into_iter()
      .map(|r| -> Result<DnsProviderRecord> {
        Ok(DnsProviderRecord {
          id: r.try_get("id")?,
          name: r.try_get("name")?,
          provider_type: r.try_get("provider_type")?,
          credentials: r.try_get("credentials")?,
        })
      })
      .collect()
  }

  pub async fn get_dns_provider(&self, id: i64) -> Result<Option<DnsProviderRecord>> {
    let row = sqlx::query("SELECT * FROM dns_providers WHERE id = ?").bind(id).fetch_optional(&self.pool).await?;
    row
      .map(|r| -> Result<DnsProviderRecord> {
        Ok(DnsProviderRecord {
          id: r.try_get("id")?,
          name: r.try_get("name")?,
          provider_type: r.try_get("provider_type")?,
          credentials: r.try_get("credentials")?,
        })
      })
      .transpose()
  }

  pub async fn insert_dns_provider(&self, name: &str, provider_type: &str, credentials: &str) -> Result<i64> {
    Ok(
      sqlx::query("INSERT INTO dns_providers (name, provider_type, credentials) VALUES (?, ?, ?)")
        .bind(name)
        .bind(provider_type)
        .bind(credentials)
        .execute(&self.pool)
        .await?
        .last_insert_rowid(),
    )
  }

  pub async fn delete_dns_provider(&self, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM dns_providers WHERE id = ?").bind(id).execute(&self.pool).await?;
    Ok(())
  }

  // ---- Users -----------------------------------------------------

  pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE username = ?").bind(username).fetch_optional(&self.pool).await?;
    row.map(Self::hydrate_user).transpose()
  }

  pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
    let row = sqlx::query("SELECT * FROM users WHERE id = ?").bind(id).fetch_optional(&self.pool).await?;
    row.map(Self::hydrate_user).transpose()
  }

  pub async fn list_users(&self) -> Result<Vec<User>> {
    let rows = sqlx::query("SELECT * FROM users ORDER BY username").fetch_all(&self.pool).await?;
    rows.into_iter().map(Self::hydrate_user).collect()
  }

  fn hydrate_user(r: sqlx::sqlite::SqliteRow) -> Result<User> {
    Ok(User {
      id: r.try_get("id")?,
      username: r.try_get("username")?,
      password_verifier: r.try_get("password_verifier")?,
      role: UserRole::parse(&r.try_get::<String, _>("role")?),
      created_at: r.try_get::<String, _>("created_at")?.parse()?,
      updated_at: r.try_get::<String, _>("updated_at")?.parse()?,
    })
  }

  pub async fn insert_user(&self, username: &str, password_verifier: &str, role: UserRole) -> Result<i64> {
    Ok(
      sqlx::query("INSERT INTO users (username, password_verifier, role, updated_at) VALUES (?, ?, ?, ?)")
        .bind(username)
        .bind(password_verifier)
        .bind(role.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?
        .last_insert_rowid(),
    )
  }

  pub async fn update_user_password(&self, id: i64, password_verifier: &str) -> Result<()> {
    sqlx::query("UPDATE users SET password_verifier = ?, updated_at = ? WHERE id = ?")
      .bind(password_verifier)
      .bind(Utc::now().to_rfc3339())
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  pub async fn update_user(&self, id: i64, role: UserRole) -> Result<()> {
    sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
      .bind(role.as_str())
      .bind(Utc::now().to_rfc3339())
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  pub async fn delete_user(&self, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM users WHERE id = ?").bind(id).execute(&self.pool).await?;
    Ok(())
  }

  // ---- Audit log -----------------------------------------------------

  pub async fn append_audit_event(&self, actor_username: &str, action: &str, resource_type: &str, resource_id: Option<&str>, detail: Option<&str>, origin_ip: Option<&str>) -> Result<()> {
    sqlx::query(
      "INSERT INTO audit_log (actor_username, action, resource_type, resource_id, detail, origin_ip) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(actor_username)
    .bind(action)
    .bind(resource_type)
    .bind(resource_id)
    .bind(detail)
    .bind(origin_ip)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  pub async fn list_audit_events(&self, limit: i64, offset: i64, username: Option<&str>, resource_type: Option<&str>) -> Result<Vec<AuditEvent>> {
    let rows = sqlx::query(
      "SELECT * FROM audit_log
       WHERE (?1 IS NULL OR actor_username = ?1) AND (?2 IS NULL OR resource_type = ?2)
       ORDER BY id DESC LIMIT ?3 OFFSET ?4",
    )
    .bind(username)
    .bind(resource_type)
    .bind(limit)
    .bind(offset)
    .fetch_all(&self.pool)
    .await?;
    rows
      .into_iter()
      .map(|r| -> Result<AuditEvent> {
        Ok(AuditEvent {
          id: r.try_get("id")?,
          ts: r.try_get::<String, _>("ts")?.parse().unwrap_or_else(|_| Utc::now()),
          actor_username: r.try_get("actor_username")?,
          action: r.try_get("action")?,
          resource_type: r.try_get("resource_type")?,
          resource_id: r.try_get("resource_id")?,
          detail: r.try_get("detail")?,
          origin_ip: r.try_get("origin_ip")?,
        })
      })
      .collect()
  }

  // ---- Settings -----------------------------------------------------

  pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
    let row = sqlx::query("SELECT value FROM settings WHERE key = ?").bind(key).fetch_optional(&self.pool).await?;
    row.map(|r| r.try_get::<String, _>("value").map_err(Into::into)).transpose()
  }

  pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
    sqlx::query("INSERT INTO settings (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value")
      .bind(key)
      .bind(value)
      .execute(&self.pool)
      .await?;
    Ok(())
  }
}

/// Input payload for inserting/updating a Host; mirrors `Host` minus the
/// server-assigned id and the child collections, which are managed through
/// their own endpoints.
pub struct NewHost {
  pub domain: String,
  pub upstreams: Vec<String>,
  pub upstream_scheme: UpstreamScheme,
  pub upstream_sni: Option<String>,
  pub verify_ssl: bool,
  pub ssl_forced: bool,
  pub redirect_to: Option<String>,
  pub redirect_status: Option<u16>,
  pub access_list_id: Option<i64>,
}

pub struct NewLocation {
  pub path: String,
  pub upstreams: Vec<String>,
  pub upstream_scheme: UpstreamScheme,
  pub upstream_sni: Option<String>,
  pub verify_ssl: bool,
  pub rewrite: bool,
}

pub struct NewStream {
  pub listen_port: u16,
  pub protocol: StreamProtocol,
  pub forward_host: String,
  pub forward_port: u16,
}

#[cfg(test)]
mod tests {
  use super::*;

  async fn memory_store() -> Store {
    Store::open(":memory:").await.expect("open in-memory store")
  }

  fn sample_host(domain: &str) -> NewHost {
    NewHost {
      domain: domain.to_string(),
      upstreams: vec!["10.0.0.1:9000".to_string()],
      upstream_scheme: UpstreamScheme::Http,
      upstream_sni: None,
      verify_ssl: true,
      ssl_forced: false,
      redirect_to: None,
      redirect_status: None,
      access_list_id: None,
    }
  }

  #[tokio::test]
  async fn host_domain_uniqueness_is_enforced() {
    let store = memory_store().await;
    store.insert_host(&sample_host("a.test")).await.unwrap();
    assert!(store.insert_host(&sample_host("A.Test")).await.is_err());
  }

  #[tokio::test]
  async fn access_list_referenced_by_a_host_cannot_be_deleted() {
    let store = memory_store().await;
    let al_id = store.insert_access_list("restricted").await.unwrap();
    let mut h = sample_host("e.test");
    h.access_list_id = Some(al_id);
    store.insert_host(&h).await.unwrap();
    assert!(store.delete_access_list(al_id).await.is_err());
  }

  #[tokio::test]
  async fn location_is_scoped_to_its_host() {
    let store = memory_store().await;
    let host_id = store.insert_host(&sample_host("d.test")).await.unwrap();
    store
      .upsert_location(
        host_id,
        &NewLocation {
          path: "/api".to_string(),
          upstreams: vec!["10.0.0.2:9000".to_string()],
          upstream_scheme: UpstreamScheme::Http,
          upstream_sni: None,
          verify_ssl: true,
          rewrite: true,
        },
      )
      .await
      .unwrap();
    let host = store.get_host_by_domain("d.test").await.unwrap().unwrap();
    assert_eq!(host.locations.len(), 1);
    assert!(host.locations[0].rewrite);
  }

  #[tokio::test]
  async fn audit_log_filters_by_resource_type() {
    let store = memory_store().await;
    store.append_audit_event("alice", "create", "host", Some("a.test"), None, None).await.unwrap();
    store.append_audit_event("alice", "create", "stream", Some("3307"), None, None).await.unwrap();
    let events = store.list_audit_events(10, 0, None, Some("host")).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].resource_type, "host");
  }
}
