//! Framework-neutral tool definitions for the Nerve email tools.
//!
//! Definitions are stored as [`ToolDefinition`] values with JSON Schema
//! parameters. [`tool_definitions`] converts them to Claude, OpenAI, or raw
//! JSON Schema shape for whichever agent framework is calling.
//!
//! Idempotency policy also lives here: [`is_idempotent`] is the static
//! classification the client consults before auto-retrying a tool call.

use serde_json::{Value, json};

/// Tools that are NOT safe to retry automatically. `send_reply` causes an
/// email to leave the building; a duplicate send is worse than a failure.
const NON_IDEMPOTENT_TOOLS: &[&str] = &["send_reply"];

/// Returns true if the named tool may be retried automatically.
///
/// The classification is fixed at compile time and never changes at
/// runtime. Unknown tool names are treated as idempotent, matching the
/// server's own defaults.
pub fn is_idempotent(name: &str) -> bool {
	!NON_IDEMPOTENT_TOOLS.contains(&name)
}

/// Framework-neutral tool definition.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
	pub name: &'static str,
	pub description: &'static str,
	/// JSON Schema for the tool arguments (without `required`).
	pub parameters: fn() -> Value,
	pub required: &'static [&'static str],
}

impl ToolDefinition {
	fn schema(&self) -> Value {
		let mut schema = (self.parameters)();
		if !self.required.is_empty() {
			schema["required"] = json!(self.required);
		}
		schema
	}
}

/// Target framework for [`tool_definitions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFormat {
	/// Claude/Anthropic `tool_use` format (`input_schema`).
	Claude,
	/// OpenAI function calling format.
	OpenAi,
	/// Raw JSON Schema, for custom frameworks.
	Raw,
}

/// The canonical Nerve email tools, in server registration order.
pub const NERVE_TOOLS: &[ToolDefinition] = &[
	ToolDefinition {
		name: "list_threads",
		description: "List email threads in an inbox. Returns threads sorted by most recent activity. Supports pagination via cursor.",
		parameters: || {
			json!({
				"type": "object",
				"properties": {
					"inbox_id": {"type": "string", "description": "Inbox ID to list threads from"},
					"status": {
						"type": "string",
						"enum": ["open", "closed", "snoozed"],
						"description": "Filter by thread status (optional)",
					},
					"limit": {
						"type": "integer",
						"description": "Max threads to return (default 50, max 200)",
						"default": 50,
					},
					"cursor": {
						"type": "string",
						"description": "Pagination cursor from previous response's next_cursor (optional)",
					},
				},
			})
		},
		required: &["inbox_id"],
	},
	ToolDefinition {
		name: "get_thread",
		description: "Fetch a complete email thread with all messages. Use to read full email conversations.",
		parameters: || {
			json!({
				"type": "object",
				"properties": {
					"thread_id": {"type": "string", "description": "Thread ID to fetch"},
				},
			})
		},
		required: &["thread_id"],
	},
	ToolDefinition {
		name: "search_inbox",
		description: "Semantic search over an email inbox. Finds emails matching a natural language query. Supports pagination via cursor.",
		parameters: || {
			json!({
				"type": "object",
				"properties": {
					"inbox_id": {"type": "string", "description": "Inbox ID to search"},
					"query": {"type": "string", "description": "Natural language search query"},
					"top_k": {
						"type": "integer",
						"description": "Number of results (default 10, max 50)",
						"default": 10,
					},
					"cursor": {
						"type": "string",
						"description": "Pagination cursor from previous response (optional)",
					},
				},
			})
		},
		required: &["inbox_id", "query"],
	},
	ToolDefinition {
		name: "triage_message",
		description: "Classify an email message by intent, urgency, and sentiment. Use to prioritize responses.",
		parameters: || {
			json!({
				"type": "object",
				"properties": {
					"message_id": {"type": "string", "description": "Message ID to classify"},
				},
			})
		},
		required: &["message_id"],
	},
	ToolDefinition {
		name: "extract_to_schema",
		description: "Extract structured data from an email using a predefined schema (e.g., extract appointment request details).",
		parameters: || {
			json!({
				"type": "object",
				"properties": {
					"message_id": {"type": "string", "description": "Message ID to extract from"},
					"schema_id": {"type": "string", "description": "Schema ID defining the extraction format"},
				},
			})
		},
		required: &["message_id", "schema_id"],
	},
	ToolDefinition {
		name: "draft_reply_with_policy",
		description: "Draft an email reply constrained by a response policy. Returns the draft with risk flags and approval status.",
		parameters: || {
			json!({
				"type": "object",
				"properties": {
					"thread_id": {"type": "string", "description": "Thread ID to reply to"},
					"goal": {"type": "string", "description": "What the reply should accomplish (e.g., 'Confirm the appointment and ask for insurance info')"},
				},
			})
		},
		required: &["thread_id", "goal"],
	},
	ToolDefinition {
		name: "send_reply",
		description: "Send an email reply to a thread. Only call after the user has confirmed the draft in conversation.",
		parameters: || {
			json!({
				"type": "object",
				"properties": {
					"thread_id": {"type": "string", "description": "Thread ID to reply to"},
					"body_or_draft_id": {
						"type": "string",
						"description": "Email body text OR a draft_id from draft_reply_with_policy",
					},
					"needs_human_approval": {
						"type": "boolean",
						"description": "If true, flags for human review. Set false when user already confirmed in chat.",
						"default": false,
					},
				},
			})
		},
		required: &["thread_id", "body_or_draft_id"],
	},
];

/// Returns all tool definitions rendered for the given framework.
///
/// `prefix` is prepended to every tool name to avoid collisions when the
/// tools are registered next to other tool sets (e.g. `"email_"`).
pub fn tool_definitions(format: ToolFormat, prefix: &str) -> Vec<Value> {
	NERVE_TOOLS
		.iter()
		.map(|tool| render(tool, format, prefix))
		.collect()
}

fn render(tool: &ToolDefinition, format: ToolFormat, prefix: &str) -> Value {
	let name = format!("{prefix}{}", tool.name);
	let schema = tool.schema();
	match format {
		ToolFormat::Claude => json!({
			"name": name,
			"description": tool.description,
			"input_schema": schema,
		}),
		ToolFormat::OpenAi => json!({
			"type": "function",
			"function": {
				"name": name,
				"description": tool.description,
				"parameters": schema,
			},
		}),
		ToolFormat::Raw => json!({
			"name": name,
			"description": tool.description,
			"parameters": schema,
		}),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn send_reply_is_the_only_non_idempotent_tool() {
		assert!(!is_idempotent("send_reply"));
		for tool in NERVE_TOOLS {
			if tool.name != "send_reply" {
				assert!(is_idempotent(tool.name), "{} should be idempotent", tool.name);
			}
		}
		// Unknown names default to idempotent.
		assert!(is_idempotent("some_future_tool"));
	}

	#[test]
	fn claude_format_uses_input_schema() {
		let tools = tool_definitions(ToolFormat::Claude, "email_");
		assert_eq!(tools.len(), NERVE_TOOLS.len());
		let list_threads = &tools[0];
		assert_eq!(list_threads["name"], "email_list_threads");
		assert_eq!(list_threads["input_schema"]["type"], "object");
		assert_eq!(list_threads["input_schema"]["required"][0], "inbox_id");
	}

	#[test]
	fn openai_format_wraps_in_function() {
		let tools = tool_definitions(ToolFormat::OpenAi, "");
		let send = tools
			.iter()
			.find(|t| t["function"]["name"] == "send_reply")
			.unwrap();
		assert_eq!(send["type"], "function");
		let required = send["function"]["parameters"]["required"].as_array().unwrap();
		assert_eq!(required.len(), 2);
	}

	#[test]
	fn raw_format_keeps_parameters_key() {
		let tools = tool_definitions(ToolFormat::Raw, "");
		let triage = tools
			.iter()
			.find(|t| t["name"] == "triage_message")
			.unwrap();
		assert!(triage["parameters"]["properties"]["message_id"].is_object());
		assert!(triage.get("input_schema").is_none());
	}
}
