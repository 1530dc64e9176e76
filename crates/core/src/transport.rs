//! HTTP transport for the Nerve MCP endpoint.
//!
//! The client core only needs one primitive from the transport: POST a
//! JSON-RPC body, optionally tagged with the current session id, and get
//! back the HTTP status, the response `MCP-Session-Id` header (present on
//! the establishment round trip), and the parsed JSON body. [`Transport`]
//! captures exactly that seam so the retry/session logic can be exercised
//! against a scripted fake in tests.

use std::time::Duration;

use async_trait::async_trait;
use nerve_protocol::{CLOUD_KEY_HEADER, MCP_PROTOCOL_VERSION, PROTOCOL_VERSION_HEADER, SESSION_ID_HEADER};
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};

/// Parses a base URL, normalizing the path to end with `/` so that
/// joining a relative endpoint path appends to it. Without the trailing
/// slash, `Url::join` replaces the last path segment and a base like
/// `https://host/prefix` would lose its prefix.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url> {
	let trimmed = base_url.trim_end_matches('/');
	Url::parse(&format!("{trimmed}/")).map_err(|e| Error::Transport(format!("invalid base url: {e}")))
}

/// One HTTP round trip against the MCP endpoint, pre-parse.
#[derive(Debug, Clone)]
pub struct RpcHttpResponse {
	/// HTTP status code. 401/403 short-circuit to an auth failure before
	/// the body is inspected.
	pub status: u16,
	/// Session id from the response header, if the server sent one.
	pub session_id: Option<String>,
	/// Parsed JSON body; `None` when the body was empty.
	pub body: Option<Value>,
}

/// Request/response transport for the MCP endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
	/// POSTs one JSON-RPC message. `session_id` is attached at send time,
	/// not earlier, so a concurrently refreshed session is picked up.
	async fn post_rpc(&self, body: &Value, session_id: Option<&str>) -> Result<RpcHttpResponse>;
}

/// Credentials for the MCP endpoint.
#[derive(Debug, Clone)]
pub enum Credentials {
	/// Long-lived Cloud API key, sent as `X-Nerve-Cloud-Key`.
	ApiKey(String),
	/// Short-lived service token, sent as a bearer `Authorization` header.
	Bearer(String),
}

/// reqwest-backed [`Transport`] implementation.
pub struct HttpTransport {
	http: reqwest::Client,
	endpoint: Url,
	credentials: Option<Credentials>,
}

impl HttpTransport {
	pub fn new(base_url: &Url, credentials: Option<Credentials>, timeout: Duration) -> Result<Self> {
		let http = reqwest::Client::builder()
			.timeout(timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(|e| Error::Transport(format!("build http client: {e}")))?;
		let endpoint = base_url
			.join("mcp")
			.map_err(|e| Error::Transport(format!("invalid base url: {e}")))?;
		Ok(Self {
			http,
			endpoint,
			credentials,
		})
	}
}

#[async_trait]
impl Transport for HttpTransport {
	async fn post_rpc(&self, body: &Value, session_id: Option<&str>) -> Result<RpcHttpResponse> {
		let mut req = self
			.http
			.post(self.endpoint.clone())
			.header("content-type", "application/json")
			.header(PROTOCOL_VERSION_HEADER, MCP_PROTOCOL_VERSION)
			.json(body);

		req = match &self.credentials {
			Some(Credentials::ApiKey(key)) => req.header(CLOUD_KEY_HEADER, key),
			Some(Credentials::Bearer(token)) => req.bearer_auth(token),
			None => req,
		};

		if let Some(sid) = session_id {
			req = req.header(SESSION_ID_HEADER, sid);
		}

		let resp = req.send().await?;
		let status = resp.status().as_u16();
		let session_id = resp
			.headers()
			.get(SESSION_ID_HEADER)
			.and_then(|h| h.to_str().ok())
			.map(|s| s.to_string());

		let bytes = resp.bytes().await?;
		let body = if bytes.is_empty() {
			None
		} else {
			// Non-2xx bodies are not required to be JSON-RPC; keep what
			// parses and let the caller decide based on the status.
			serde_json::from_slice::<Value>(&bytes).ok()
		};

		tracing::debug!(status, has_session = session_id.is_some(), "mcp http response");

		Ok(RpcHttpResponse {
			status,
			session_id,
			body,
		})
	}
}
