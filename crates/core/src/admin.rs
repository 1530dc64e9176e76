//! Control-plane REST client for domain and inbox management.
//!
//! [`NerveAdmin`] talks to the `/v1` admin API with the bootstrap admin
//! key (`X-API-Key` header). It is independent of the MCP data plane: no
//! sessions, no JSON-RPC, plain request/response REST.
//!
//! ```no_run
//! use nerve::NerveAdmin;
//!
//! # async fn run() -> nerve::Result<()> {
//! let admin = NerveAdmin::builder("https://nerve.example.com", "admin_key").build()?;
//!
//! let domain = admin.add_domain("org_123", "clientclinic.com", None).await?;
//! let records = admin.get_dns_records(domain["domain_id"].as_str().unwrap_or("")).await?;
//! admin.verify_domain(domain["domain_id"].as_str().unwrap_or("")).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use nerve_protocol::ADMIN_KEY_HEADER;
use reqwest::Method;
use serde_json::{Value, json};
use url::Url;

use crate::error::{Error, Result};
use crate::transport::parse_base_url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_TOKEN_TTL_SECS: u64 = 900;

/// Builder for [`NerveAdmin`].
pub struct NerveAdminBuilder {
	base_url: String,
	api_key: String,
	timeout: Duration,
}

impl NerveAdminBuilder {
	/// Per-request timeout. Defaults to 30 seconds.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	pub fn build(self) -> Result<NerveAdmin> {
		let base_url = parse_base_url(&self.base_url)?;
		let http = reqwest::Client::builder()
			.timeout(self.timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(|e| Error::Transport(format!("build http client: {e}")))?;
		Ok(NerveAdmin {
			http,
			base_url,
			api_key: self.api_key,
		})
	}
}

/// Control-plane client for Nerve domain and inbox management.
pub struct NerveAdmin {
	http: reqwest::Client,
	base_url: Url,
	api_key: String,
}

impl NerveAdmin {
	pub fn builder(base_url: impl Into<String>, api_key: impl Into<String>) -> NerveAdminBuilder {
		NerveAdminBuilder {
			base_url: base_url.into(),
			api_key: api_key.into(),
			timeout: DEFAULT_TIMEOUT,
		}
	}

	async fn request(
		&self,
		method: Method,
		path: &str,
		query: &[(&str, &str)],
		body: Option<Value>,
	) -> Result<Value> {
		let url = self
			.base_url
			.join(path.trim_start_matches('/'))
			.map_err(|e| Error::Transport(format!("invalid admin path {path}: {e}")))?;

		let mut req = self
			.http
			.request(method, url)
			.header(ADMIN_KEY_HEADER, &self.api_key);
		if !query.is_empty() {
			req = req.query(query);
		}
		if let Some(body) = body {
			req = req.json(&body);
		}

		let resp = req.send().await?;
		let status = resp.status().as_u16();
		tracing::debug!(status, path, "admin response");

		if status == 401 {
			return Err(Error::Auth("authentication failed, check admin API key".to_string()));
		}
		if status == 403 {
			return Err(Error::Auth(
				"forbidden, admin key lacks required permissions".to_string(),
			));
		}
		if status >= 400 {
			return Err(Error::Remote {
				code: i64::from(status),
				message: resp.text().await.unwrap_or_default(),
			});
		}

		let bytes = resp.bytes().await?;
		if bytes.is_empty() {
			return Ok(Value::Null);
		}
		Ok(serde_json::from_slice(&bytes)?)
	}

	// ------------------------------------------------------------------
	// Org management
	// ------------------------------------------------------------------

	pub async fn create_org(&self, name: &str) -> Result<Value> {
		self.request(Method::POST, "/v1/orgs", &[], Some(json!({"name": name})))
			.await
	}

	// ------------------------------------------------------------------
	// Domain management
	// ------------------------------------------------------------------

	/// Adds a custom email domain. Returns domain info plus the DNS
	/// records the tenant must configure. `dkim_method` defaults to
	/// `"cname"` (delegated DKIM) when `None`.
	pub async fn add_domain(
		&self,
		org_id: &str,
		domain: &str,
		dkim_method: Option<&str>,
	) -> Result<Value> {
		self.request(
			Method::POST,
			"/v1/domains",
			&[],
			Some(json!({
				"org_id": org_id,
				"domain": domain,
				"dkim_method": dkim_method.unwrap_or("cname"),
			})),
		)
		.await
	}

	pub async fn list_domains(&self, org_id: &str) -> Result<Value> {
		self.request(Method::GET, "/v1/domains", &[("org_id", org_id)], None)
			.await
	}

	/// Triggers DNS verification for a domain. The server rate-limits
	/// this to a few attempts per minute per domain.
	pub async fn verify_domain(&self, domain_id: &str) -> Result<Value> {
		self.request(
			Method::POST,
			"/v1/domains/verify",
			&[],
			Some(json!({"domain_id": domain_id})),
		)
		.await
	}

	/// Fetches the DNS records a tenant needs to configure.
	pub async fn get_dns_records(&self, domain_id: &str) -> Result<Value> {
		self.request(Method::GET, "/v1/domains/dns", &[("domain_id", domain_id)], None)
			.await
	}

	pub async fn delete_domain(&self, domain_id: &str) -> Result<()> {
		self.request(
			Method::POST,
			"/v1/domains/delete",
			&[],
			Some(json!({"domain_id": domain_id})),
		)
		.await
		.map(|_| ())
	}

	// ------------------------------------------------------------------
	// Inbox management
	// ------------------------------------------------------------------

	/// Creates an inbox on a verified domain, e.g. `support@clientclinic.com`.
	pub async fn create_inbox(&self, org_id: &str, address: &str) -> Result<Value> {
		self.request(
			Method::POST,
			"/v1/inboxes",
			&[],
			Some(json!({"org_id": org_id, "address": address})),
		)
		.await
	}

	// ------------------------------------------------------------------
	// Credential management
	// ------------------------------------------------------------------

	/// Issues a long-lived Cloud API key for agent MCP access.
	///
	/// Preferred over short-TTL service tokens for machine-to-machine
	/// access since it avoids token refresh. The result carries `key`
	/// (the secret, shown once) and `key_id`.
	pub async fn issue_cloud_api_key(
		&self,
		org_id: &str,
		label: &str,
		scopes: Option<&[&str]>,
	) -> Result<Value> {
		let mut payload = json!({"org_id": org_id, "label": label});
		if let Some(scopes) = scopes {
			payload["scopes"] = json!(scopes);
		}
		self.request(Method::POST, "/v1/keys", &[], Some(payload)).await
	}

	/// Issues a scoped, short-lived service token for MCP access.
	/// `ttl_seconds` defaults to 900 when `None`. For long-running agent
	/// processes prefer [`issue_cloud_api_key`](Self::issue_cloud_api_key).
	pub async fn issue_service_token(
		&self,
		org_id: &str,
		scopes: &[&str],
		ttl_seconds: Option<u64>,
	) -> Result<Value> {
		self.request(
			Method::POST,
			"/v1/tokens/service",
			&[],
			Some(json!({
				"org_id": org_id,
				"scopes": scopes,
				"ttl_seconds": ttl_seconds.unwrap_or(DEFAULT_TOKEN_TTL_SECS),
			})),
		)
		.await
	}
}
