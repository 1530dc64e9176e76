//! Error types for the Nerve client.

use std::time::Duration;

use nerve_protocol::jsonrpc::{
	ERROR_CODE_QUOTA_EXCEEDED, ERROR_CODE_RATE_LIMITED, ERROR_CODE_SUBSCRIPTION_INACTIVE,
	JsonRpcError,
};
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the Nerve client.
///
/// Every non-success server response maps to exactly one variant; the
/// mapping is a pure function of the numeric error code (plus, for session
/// expiry, a message heuristic handled internally and never surfaced).
#[derive(Debug, Error)]
pub enum Error {
	/// Authentication or authorization failure (HTTP 401/403). Fatal,
	/// never retried, regardless of the response body.
	#[error("authentication failed: {0}")]
	Auth(String),

	/// The server did not issue a session identifier during the
	/// `initialize` handshake. Fatal; callers may re-attempt explicitly.
	#[error("session could not be established: {0}")]
	Session(String),

	/// Rate limited by the server. Idempotent operations are retried up
	/// to the configured bound before this surfaces; `retry_after` is the
	/// last server-supplied hint.
	#[error("rate limited, retry after {}s: {message}", retry_after.as_secs())]
	RateLimited {
		message: String,
		retry_after: Duration,
	},

	/// Tenant usage quota exhausted. Never retried; distinct from rate
	/// limiting, which is transient.
	#[error("quota exceeded: {0}")]
	QuotaExceeded(String),

	/// Tenant subscription is paused or cancelled. Never retried.
	#[error("subscription inactive: {0}")]
	SubscriptionInactive(String),

	/// Any other structured server error, surfaced with the original
	/// code and message.
	#[error("server error {code}: {message}")]
	Remote { code: i64, message: String },

	/// Transport-level failure (connect, timeout, malformed response).
	#[error("transport error: {0}")]
	Transport(String),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Retry budget exhausted without a definitive server answer.
	pub(crate) fn retries_exhausted() -> Self {
		Error::Remote {
			code: 0,
			message: "max retries exceeded".to_string(),
		}
	}

	/// Returns the retry-after hint if this is a rate-limit error.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Error::RateLimited { retry_after, .. } => Some(*retry_after),
			_ => None,
		}
	}

	/// True if waiting and re-issuing the call could succeed.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Error::RateLimited { .. })
	}

	/// Returns the server error code if this error carries one.
	pub fn code(&self) -> Option<i64> {
		match self {
			Error::Remote { code, .. } => Some(*code),
			Error::RateLimited { .. } => Some(ERROR_CODE_RATE_LIMITED),
			Error::QuotaExceeded(_) => Some(ERROR_CODE_QUOTA_EXCEEDED),
			Error::SubscriptionInactive(_) => Some(ERROR_CODE_SUBSCRIPTION_INACTIVE),
			_ => None,
		}
	}
}

impl From<reqwest::Error> for Error {
	fn from(err: reqwest::Error) -> Self {
		Error::Transport(err.to_string())
	}
}

/// Classification of one structured server error, driving the retry loop.
///
/// Closed over the full code space: rate limiting and session expiry are
/// control-flow signals; everything else is a fatal, fully-formed [`Error`].
#[derive(Debug)]
pub(crate) enum RemoteFailure {
	RateLimited {
		message: String,
		retry_after: Duration,
	},
	SessionExpired,
	Fatal(Error),
}

/// Maps a [`JsonRpcError`] onto the taxonomy. Pure function of the code
/// and, for session expiry, the message heuristic.
pub(crate) fn classify_remote(err: &JsonRpcError) -> RemoteFailure {
	match err.code {
		ERROR_CODE_RATE_LIMITED => RemoteFailure::RateLimited {
			message: err.message.clone(),
			retry_after: Duration::from_secs(err.retry_after_seconds()),
		},
		ERROR_CODE_QUOTA_EXCEEDED => {
			RemoteFailure::Fatal(Error::QuotaExceeded(err.message.clone()))
		}
		ERROR_CODE_SUBSCRIPTION_INACTIVE => {
			RemoteFailure::Fatal(Error::SubscriptionInactive(err.message.clone()))
		}
		_ if err.is_session_expired() => RemoteFailure::SessionExpired,
		code => RemoteFailure::Fatal(Error::Remote {
			code,
			message: err.message.clone(),
		}),
	}
}
