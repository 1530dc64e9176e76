//! Convenience response models for Nerve tool results.
//!
//! Client methods return raw `serde_json::Value` so callers can stay
//! loosely typed; these models are an opt-in structured view. Every model
//! carries a flattened residual map so fields the server adds later are
//! preserved rather than dropped.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Email address with optional display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAddress {
	pub address: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
}

/// A single email message within a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
	pub id: String,
	pub thread_id: String,
	#[serde(rename = "from", skip_serializing_if = "Option::is_none")]
	pub from: Option<EmailAddress>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub to: Option<Vec<EmailAddress>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub subject: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub body_text: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub body_html: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub received_at: Option<String>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// An email thread (conversation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
	pub id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub subject: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message_count: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_message_at: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub messages: Option<Vec<EmailMessage>>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// A single semantic search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
	pub message_id: String,
	pub thread_id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub subject: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub snippet: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub score: Option<f64>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// Result of message triage/classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageResult {
	pub message_id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub intent: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub urgency: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sentiment: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub suggested_action: Option<String>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// Result of drafting a reply under policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftResult {
	pub draft: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub draft_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub risk_flags: Option<Vec<String>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub auto_approved: Option<bool>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// Result of sending an email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResult {
	pub message_id: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<String>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// List of inbox ids available to the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboxList {
	#[serde(default)]
	pub inbox_ids: Vec<String>,
}
