//! JSON-RPC 2.0 envelope for the Nerve MCP endpoint.
//!
//! Requests carry a monotonically increasing `id` assigned by the client;
//! responses are correlated by that id. A failed response carries a
//! [`JsonRpcError`] whose numeric code maps onto the client error taxonomy
//! (see the `ERROR_CODE_*` constants).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server is rate limiting the caller. Retryable; `data` carries a
/// `retry_after_seconds` hint.
pub const ERROR_CODE_RATE_LIMITED: i64 = -32042;

/// Tenant usage quota exhausted. Never retried.
pub const ERROR_CODE_QUOTA_EXCEEDED: i64 = -32040;

/// Tenant subscription is paused or cancelled. Never retried.
pub const ERROR_CODE_SUBSCRIPTION_INACTIVE: i64 = -32041;

/// Generic server error. Combined with a "session" substring in the
/// message this signals an expired session.
pub const ERROR_CODE_SERVER: i64 = -32000;

/// Fallback retry-after when the server omits the hint, in seconds.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 2;

/// Outbound JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
	pub jsonrpc: String,
	/// Sequence id, unique per client instance, assigned in send order.
	pub id: u64,
	pub method: String,
	pub params: Value,
}

impl JsonRpcRequest {
	pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
		Self {
			jsonrpc: crate::JSONRPC_VERSION.to_string(),
			id,
			method: method.into(),
			params,
		}
	}
}

/// Inbound JSON-RPC response. `result` and `error` are mutually exclusive;
/// absence of `error` is the success condition even when `result` is null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
	#[serde(default)]
	pub jsonrpc: String,
	#[serde(default)]
	pub id: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<JsonRpcError>,
}

/// Structured error payload from the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
	pub code: i64,
	#[serde(default)]
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

impl JsonRpcError {
	/// Server-supplied retry-after hint in seconds, falling back to
	/// [`DEFAULT_RETRY_AFTER_SECS`] when absent or malformed.
	pub fn retry_after_seconds(&self) -> u64 {
		self.data
			.as_ref()
			.and_then(|d| d.get("retry_after_seconds"))
			.and_then(Value::as_u64)
			.unwrap_or(DEFAULT_RETRY_AFTER_SECS)
	}

	/// True when this error indicates an expired MCP session.
	///
	/// The server contract is a generic `-32000` code plus a
	/// case-insensitive "session" substring in the message. The substring
	/// match is a heuristic carried over from the server; an unrelated
	/// error that happens to mention "session" will also match.
	pub fn is_session_expired(&self) -> bool {
		self.code == ERROR_CODE_SERVER && self.message.to_lowercase().contains("session")
	}
}
