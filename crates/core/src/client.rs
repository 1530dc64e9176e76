//! Async MCP client for the Nerve email server.
//!
//! This module implements the session and retry core on top of the
//! transport. It handles:
//! - Lazy session establishment, shared across concurrent callers
//! - Generating unique, monotonically increasing request ids
//! - Classifying structured server errors into the typed taxonomy
//! - Bounded rate-limit retries for idempotent tools
//! - Transparent one-shot recovery from mid-flight session expiry
//!
//! # Usage
//!
//! ```no_run
//! use nerve::NerveClient;
//!
//! # async fn run() -> nerve::Result<()> {
//! let client = NerveClient::builder("https://nerve.example.com")
//!     .api_key("nerve_sk_...")
//!     .build()?;
//!
//! if client.health_check().await {
//!     let threads = client.list_threads("inbox_123", None, 20, None).await?;
//!     let page2 = client
//!         .list_threads("inbox_123", None, 20, threads["next_cursor"].as_str())
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use nerve_protocol::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use nerve_protocol::tools::is_idempotent;
use nerve_protocol::{CLIENT_NAME, CLIENT_VERSION, MCP_PROTOCOL_VERSION};
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::error::{Error, RemoteFailure, Result, classify_remote};
use crate::session::SessionManager;
use crate::transport::{Credentials, HttpTransport, Transport, parse_base_url};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Builder for [`NerveClient`].
pub struct NerveClientBuilder {
	base_url: String,
	credentials: Option<Credentials>,
	timeout: Duration,
	max_retries: u32,
}

impl NerveClientBuilder {
	/// Authenticate with a long-lived Cloud API key.
	pub fn api_key(mut self, key: impl Into<String>) -> Self {
		self.credentials = Some(Credentials::ApiKey(key.into()));
		self
	}

	/// Authenticate with a short-lived bearer token.
	pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
		self.credentials = Some(Credentials::Bearer(token.into()));
		self
	}

	/// Per-round-trip timeout. Defaults to 30 seconds.
	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	/// Maximum rate-limit retries for idempotent tools. Defaults to 3,
	/// giving up to 4 attempts per call.
	pub fn max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;
		self
	}

	pub fn build(self) -> Result<NerveClient> {
		let base_url = parse_base_url(&self.base_url)?;
		let transport = HttpTransport::new(&base_url, self.credentials, self.timeout)?;
		Ok(NerveClient::with_transport(
			Arc::new(transport),
			self.max_retries,
		))
	}
}

/// Async MCP client for the Nerve email server.
///
/// Safe to share across tasks: session establishment is serialized
/// internally and every call carries its own request id.
pub struct NerveClient {
	/// Transport handle; `None` after [`close`](Self::close).
	transport: Mutex<Option<Arc<dyn Transport>>>,
	session: SessionManager,
	/// Sequence id counter. Ids are assigned in send order and never reused.
	last_id: AtomicU64,
	max_retries: u32,
}

impl NerveClient {
	pub fn builder(base_url: impl Into<String>) -> NerveClientBuilder {
		NerveClientBuilder {
			base_url: base_url.into(),
			credentials: None,
			timeout: DEFAULT_TIMEOUT,
			max_retries: DEFAULT_MAX_RETRIES,
		}
	}

	pub(crate) fn with_transport(transport: Arc<dyn Transport>, max_retries: u32) -> Self {
		Self {
			transport: Mutex::new(Some(transport)),
			session: SessionManager::new(),
			last_id: AtomicU64::new(0),
			max_retries,
		}
	}

	fn transport(&self) -> Result<Arc<dyn Transport>> {
		self.transport
			.lock()
			.clone()
			.ok_or_else(|| Error::Transport("client is closed".to_string()))
	}

	fn next_id(&self) -> u64 {
		self.last_id.fetch_add(1, Ordering::SeqCst) + 1
	}

	/// Establishes the MCP session if one is not already cached.
	///
	/// Under N concurrent callers with no session, exactly one
	/// `initialize` round trip is issued; the rest observe its result.
	pub async fn ensure_session(&self) -> Result<()> {
		self.session.ensure(|| self.establish()).await.map(|_| ())
	}

	/// One `initialize` handshake round trip. The session id arrives in
	/// the response header; a missing header means no session is cached
	/// and the establishment fails.
	fn establish(&self) -> Pin<Box<dyn Future<Output = Result<Arc<str>>> + Send + '_>> {
		Box::pin(async move {
			let params = json!({
				"clientInfo": {
					"name": CLIENT_NAME,
					"version": CLIENT_VERSION,
				},
				"protocolVersion": MCP_PROTOCOL_VERSION,
			});
			let (_result, session_id) = self.rpc_round("initialize", params, true).await?;
			match session_id {
				Some(sid) => Ok(Arc::from(sid.as_str())),
				None => Err(Error::Session(
					"server did not return MCP-Session-Id".to_string(),
				)),
			}
		})
	}

	/// Sends one JSON-RPC request, driving the retry loop.
	///
	/// `allow_retry` gates the rate-limit retry budget; non-idempotent
	/// tools pass `false` and fail on the first rate limit. Session
	/// expiry is recovered at most once per logical call, and the replay
	/// neither consumes rate budget nor is retried if it fails again.
	///
	/// Returns the result value and the session id header of the final
	/// response (used by the `initialize` path).
	async fn rpc_round(
		&self,
		method: &str,
		params: Value,
		allow_retry: bool,
	) -> Result<(Value, Option<String>)> {
		let transport = self.transport()?;
		let id = self.next_id();
		let request = JsonRpcRequest::new(id, method, params);
		let body = serde_json::to_value(&request)?;

		let max_attempts = if allow_retry { self.max_retries + 1 } else { 1 };
		let mut rate_attempts: u32 = 0;
		let mut recovered = false;

		// Bounded by max_attempts rate-limited sends plus one recovery replay.
		for _ in 0..=max_attempts {
			// Session read at send time: a concurrently refreshed session
			// is picked up without re-queuing the request.
			let session = self.session.current();
			let resp = transport.post_rpc(&body, session.as_deref()).await?;

			if resp.status == 401 {
				return Err(Error::Auth(
					"authentication failed, check API key or token".to_string(),
				));
			}
			if resp.status == 403 {
				return Err(Error::Auth("forbidden, check API key scopes".to_string()));
			}

			let Some(body_json) = resp.body else {
				return Err(Error::Transport(format!(
					"empty response body (status {})",
					resp.status
				)));
			};
			let parsed: JsonRpcResponse = serde_json::from_value(body_json)?;

			let Some(err) = parsed.error else {
				// Absence of a structured error is the success condition;
				// a null/missing result is a valid success value.
				return Ok((parsed.result.unwrap_or(Value::Null), resp.session_id));
			};

			match classify_remote(&err) {
				RemoteFailure::RateLimited {
					message,
					retry_after,
				} => {
					rate_attempts += 1;
					if !recovered && rate_attempts < max_attempts {
						tracing::warn!(
							method,
							id,
							retry_after_secs = retry_after.as_secs(),
							"rate limited, retrying"
						);
						tokio::time::sleep(retry_after).await;
						continue;
					}
					return Err(Error::RateLimited {
						message,
						retry_after,
					});
				}
				RemoteFailure::SessionExpired => {
					// Only recover when this attempt actually carried a
					// session id; the initialize path never does, which
					// keeps recovery from recursing.
					let Some(stale) = session else {
						return Err(Error::Session(err.message));
					};
					if recovered {
						return Err(Error::Session(err.message));
					}
					tracing::debug!(method, id, "session expired mid-flight, recovering");
					self.session.recover(stale.as_ref(), || self.establish()).await?;
					recovered = true;
					continue;
				}
				RemoteFailure::Fatal(error) => return Err(error),
			}
		}

		Err(Error::retries_exhausted())
	}

	async fn rpc(&self, method: &str, params: Value, allow_retry: bool) -> Result<Value> {
		let (result, _) = self.rpc_round(method, params, allow_retry).await?;
		Ok(result)
	}

	/// Calls an MCP tool with automatic session management.
	///
	/// Non-idempotent tools (`send_reply`) are never retried, to prevent
	/// duplicate side effects like double-sending an email.
	async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
		self.ensure_session().await?;
		self.rpc(
			"tools/call",
			json!({"name": name, "arguments": arguments}),
			is_idempotent(name),
		)
		.await
	}

	// ------------------------------------------------------------------
	// Health / discovery
	// ------------------------------------------------------------------

	/// Best-effort readiness probe: true if the server is reachable and a
	/// session can be established. Swallows every failure mode; intended
	/// for pre-flight checks, not as a substitute for per-call errors.
	pub async fn health_check(&self) -> bool {
		self.ensure_session().await.is_ok()
	}

	/// Discovers available tools from the server via `tools/list`.
	///
	/// Compare against the static definitions in `nerve-protocol` to
	/// detect breaking server changes.
	pub async fn list_tools(&self) -> Result<Vec<Value>> {
		self.ensure_session().await?;
		let result = self.rpc("tools/list", json!({}), true).await?;
		Ok(result
			.get("tools")
			.and_then(Value::as_array)
			.cloned()
			.unwrap_or_default())
	}

	// ------------------------------------------------------------------
	// Typed tool methods
	// ------------------------------------------------------------------

	/// Lists email threads with pagination support.
	///
	/// Returns an object with a `threads` array and an optional
	/// `next_cursor` for fetching subsequent pages.
	pub async fn list_threads(
		&self,
		inbox_id: &str,
		status: Option<&str>,
		limit: u32,
		cursor: Option<&str>,
	) -> Result<Value> {
		let mut args = json!({"inbox_id": inbox_id, "limit": limit});
		if let Some(status) = status {
			args["status"] = json!(status);
		}
		if let Some(cursor) = cursor {
			args["cursor"] = json!(cursor);
		}
		self.call_tool("list_threads", args).await
	}

	/// Fetches a complete thread with all messages.
	pub async fn get_thread(&self, thread_id: &str) -> Result<Value> {
		self.call_tool("get_thread", json!({"thread_id": thread_id}))
			.await
	}

	/// Semantic search over an inbox, with pagination support.
	pub async fn search_inbox(
		&self,
		inbox_id: &str,
		query: &str,
		top_k: u32,
		cursor: Option<&str>,
	) -> Result<Value> {
		let mut args = json!({"inbox_id": inbox_id, "query": query, "top_k": top_k});
		if let Some(cursor) = cursor {
			args["cursor"] = json!(cursor);
		}
		self.call_tool("search_inbox", args).await
	}

	/// Classifies a message by intent, urgency, and sentiment.
	pub async fn triage_message(&self, message_id: &str) -> Result<Value> {
		self.call_tool("triage_message", json!({"message_id": message_id}))
			.await
	}

	/// Extracts structured data from a message using a predefined schema.
	pub async fn extract_to_schema(&self, message_id: &str, schema_id: &str) -> Result<Value> {
		self.call_tool(
			"extract_to_schema",
			json!({"message_id": message_id, "schema_id": schema_id}),
		)
		.await
	}

	/// Drafts an email reply with policy guardrails.
	///
	/// `goal` states what the reply should accomplish. The result carries
	/// the draft text, risk flags, and approval status. `attachments` is
	/// reserved and not yet supported server-side; it is forwarded only
	/// when non-empty.
	pub async fn draft_reply(
		&self,
		thread_id: &str,
		goal: &str,
		attachments: Option<&[Value]>,
	) -> Result<Value> {
		let mut args = json!({"thread_id": thread_id, "goal": goal});
		if let Some(attachments) = attachments {
			if !attachments.is_empty() {
				args["attachments"] = json!(attachments);
			}
		}
		self.call_tool("draft_reply_with_policy", args).await
	}

	/// Sends an email reply. NOT retried on failure (non-idempotent).
	///
	/// `body_or_draft_id` is either literal body text or a draft id from
	/// [`draft_reply`](Self::draft_reply). With `needs_human_approval`
	/// the server flags the reply for review instead of sending; pass
	/// `false` once the user has confirmed in conversation.
	pub async fn send_reply(
		&self,
		thread_id: &str,
		body_or_draft_id: &str,
		needs_human_approval: bool,
	) -> Result<Value> {
		self.call_tool(
			"send_reply",
			json!({
				"thread_id": thread_id,
				"body_or_draft_id": body_or_draft_id,
				"needs_human_approval": needs_human_approval,
			}),
		)
		.await
	}

	/// Reads the `email://inboxes` resource.
	pub async fn list_inboxes(&self) -> Result<Value> {
		self.ensure_session().await?;
		self.rpc("resources/read", json!({"uri": "email://inboxes"}), true)
			.await
	}

	// ------------------------------------------------------------------
	// Generic tool execution (for agentic use)
	// ------------------------------------------------------------------

	/// Executes any MCP tool by name. Used by agent frameworks that drive
	/// the tool set dynamically; idempotency policy still applies.
	pub async fn execute_tool(&self, tool_name: &str, arguments: Value) -> Result<Value> {
		self.call_tool(tool_name, arguments).await
	}

	/// Releases the transport. Idempotent; later calls on this client
	/// fail with a transport error.
	pub fn close(&self) {
		self.transport.lock().take();
	}
}

#[cfg(test)]
mod tests;
