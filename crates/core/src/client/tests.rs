use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use super::*;
use crate::transport::{RpcHttpResponse, Transport};

/// One recorded round trip: the request body and the attached session id.
#[derive(Debug, Clone)]
struct RecordedCall {
	body: Value,
	session_id: Option<String>,
}

impl RecordedCall {
	fn method(&self) -> &str {
		self.body["method"].as_str().unwrap_or("")
	}

	fn id(&self) -> u64 {
		self.body["id"].as_u64().unwrap()
	}
}

type Handler = Box<dyn Fn(&RecordedCall) -> crate::Result<RpcHttpResponse> + Send + Sync>;

/// Scripted transport: records every call and answers via a closure,
/// mirroring how the server under test would behave.
struct ScriptedTransport {
	calls: Mutex<Vec<RecordedCall>>,
	handler: Handler,
}

impl ScriptedTransport {
	fn new(
		handler: impl Fn(&RecordedCall) -> crate::Result<RpcHttpResponse> + Send + Sync + 'static,
	) -> Arc<Self> {
		Arc::new(Self {
			calls: Mutex::new(Vec::new()),
			handler: Box::new(handler),
		})
	}

	fn calls(&self) -> Vec<RecordedCall> {
		self.calls.lock().clone()
	}

	fn count(&self, method: &str) -> usize {
		self.calls().iter().filter(|c| c.method() == method).count()
	}
}

#[async_trait]
impl Transport for ScriptedTransport {
	async fn post_rpc(
		&self,
		body: &Value,
		session_id: Option<&str>,
	) -> crate::Result<RpcHttpResponse> {
		let call = RecordedCall {
			body: body.clone(),
			session_id: session_id.map(|s| s.to_string()),
		};
		self.calls.lock().push(call.clone());
		(self.handler)(&call)
	}
}

fn ok_json(result: Value) -> RpcHttpResponse {
	RpcHttpResponse {
		status: 200,
		session_id: None,
		body: Some(json!({"jsonrpc": "2.0", "id": 0, "result": result})),
	}
}

fn initialized(session: &str) -> RpcHttpResponse {
	RpcHttpResponse {
		status: 200,
		session_id: Some(session.to_string()),
		body: Some(json!({"jsonrpc": "2.0", "id": 0, "result": {"protocolVersion": "2025-11-25"}})),
	}
}

fn rpc_error(code: i64, message: &str, data: Option<Value>) -> RpcHttpResponse {
	let mut error = json!({"code": code, "message": message});
	if let Some(data) = data {
		error["data"] = data;
	}
	RpcHttpResponse {
		status: 200,
		session_id: None,
		body: Some(json!({"jsonrpc": "2.0", "id": 0, "error": error})),
	}
}

fn rate_limited(retry_after_secs: u64) -> RpcHttpResponse {
	rpc_error(
		-32042,
		"Rate limited",
		Some(json!({"retry_after_seconds": retry_after_secs})),
	)
}

// ------------------------------------------------------------------
// Session management
// ------------------------------------------------------------------

#[tokio::test]
async fn concurrent_calls_share_one_initialize() {
	let transport = ScriptedTransport::new(|call| {
		Ok(match call.method() {
			"initialize" => initialized("session-concurrent"),
			_ => ok_json(json!({"threads": []})),
		})
	});
	let client = Arc::new(NerveClient::with_transport(transport.clone(), 3));

	let tasks: Vec<_> = (0..10)
		.map(|_| {
			let client = Arc::clone(&client);
			tokio::spawn(async move { client.list_threads("inbox_1", None, 50, None).await })
		})
		.collect();
	for task in tasks {
		task.await.unwrap().unwrap();
	}

	assert_eq!(transport.count("initialize"), 1);
	// Every tool call carried the one established session.
	for call in transport.calls() {
		if call.method() == "tools/call" {
			assert_eq!(call.session_id.as_deref(), Some("session-concurrent"));
		}
	}
}

#[tokio::test]
async fn sequence_ids_are_distinct_and_ordered() {
	let transport = ScriptedTransport::new(|call| {
		Ok(match call.method() {
			"initialize" => initialized("s"),
			_ => ok_json(json!({})),
		})
	});
	let client = NerveClient::with_transport(transport.clone(), 3);

	for _ in 0..5 {
		client.get_thread("thread_1").await.unwrap();
	}

	// Strictly increasing implies pairwise distinct.
	let ids: Vec<u64> = transport.calls().iter().map(|c| c.id()).collect();
	assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids observed in assignment order: {ids:?}");
}

#[tokio::test]
async fn missing_session_header_fails_establishment() {
	let transport = ScriptedTransport::new(|_| Ok(ok_json(json!({}))));
	let client = NerveClient::with_transport(transport.clone(), 3);

	let err = client.list_inboxes().await.unwrap_err();
	assert!(matches!(err, Error::Session(_)), "got {err:?}");

	// Nothing cached: the next call re-attempts establishment.
	let _ = client.list_inboxes().await.unwrap_err();
	assert_eq!(transport.count("initialize"), 2);
}

#[tokio::test]
async fn session_expiry_recovers_once_transparently() {
	let expiries = Arc::new(AtomicUsize::new(0));
	let transport = {
		let expiries = Arc::clone(&expiries);
		ScriptedTransport::new(move |call| {
			Ok(match call.method() {
				"initialize" => initialized(if expiries.load(Ordering::SeqCst) == 0 {
					"session-old"
				} else {
					"session-new"
				}),
				_ => {
					if call.session_id.as_deref() == Some("session-old") {
						expiries.fetch_add(1, Ordering::SeqCst);
						rpc_error(-32000, "Session expired", None)
					} else {
						ok_json(json!({"threads": []}))
					}
				}
			})
		})
	};
	let client = NerveClient::with_transport(transport.clone(), 3);

	let result = client.list_threads("inbox_1", None, 50, None).await.unwrap();
	assert_eq!(result, json!({"threads": []}));

	// Exactly one extra establishment, and the replay carried the fresh id.
	assert_eq!(transport.count("initialize"), 2);
	let tool_calls: Vec<_> = transport
		.calls()
		.into_iter()
		.filter(|c| c.method() == "tools/call")
		.collect();
	assert_eq!(tool_calls.len(), 2);
	assert_eq!(tool_calls[0].session_id.as_deref(), Some("session-old"));
	assert_eq!(tool_calls[1].session_id.as_deref(), Some("session-new"));
	// Replay reuses the same request id.
	assert_eq!(tool_calls[0].id(), tool_calls[1].id());
}

#[tokio::test]
async fn second_expiry_after_recovery_is_surfaced() {
	let transport = ScriptedTransport::new(|call| {
		Ok(match call.method() {
			"initialize" => initialized("s"),
			_ => rpc_error(-32000, "Session expired", None),
		})
	});
	let client = NerveClient::with_transport(transport.clone(), 3);

	let err = client.get_thread("thread_1").await.unwrap_err();
	assert!(matches!(err, Error::Session(_)), "got {err:?}");
	// Initial attempt + one replay, no more.
	assert_eq!(transport.count("tools/call"), 2);
}

// ------------------------------------------------------------------
// Retry logic
// ------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn rate_limit_retries_then_succeeds() {
	let attempts = Arc::new(AtomicUsize::new(0));
	let transport = {
		let attempts = Arc::clone(&attempts);
		ScriptedTransport::new(move |call| {
			Ok(match call.method() {
				"initialize" => initialized("s"),
				_ => {
					if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
						rate_limited(1)
					} else {
						ok_json(json!({"threads": []}))
					}
				}
			})
		})
	};
	let client = NerveClient::with_transport(transport.clone(), 3);

	let result = client.list_threads("inbox_1", None, 50, None).await.unwrap();
	assert_eq!(result, json!({"threads": []}));
	assert_eq!(transport.count("tools/call"), 3);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_exhaustion_reports_last_hint() {
	let attempts = Arc::new(AtomicUsize::new(0));
	let transport = {
		let attempts = Arc::clone(&attempts);
		ScriptedTransport::new(move |call| {
			Ok(match call.method() {
				"initialize" => initialized("s"),
				// Increasing hints; the surfaced error must carry the last.
				_ => rate_limited(attempts.fetch_add(1, Ordering::SeqCst) as u64 + 1),
			})
		})
	};
	let client = NerveClient::with_transport(transport.clone(), 3);

	let err = client.get_thread("thread_1").await.unwrap_err();
	// max_retries = 3 means exactly 4 attempts.
	assert_eq!(transport.count("tools/call"), 4);
	match err {
		Error::RateLimited { retry_after, .. } => {
			assert_eq!(retry_after, Duration::from_secs(4));
		}
		other => panic!("expected RateLimited, got {other:?}"),
	}
}

#[tokio::test]
async fn send_reply_never_retries_on_rate_limit() {
	let transport = ScriptedTransport::new(|call| {
		Ok(match call.method() {
			"initialize" => initialized("s"),
			_ => rate_limited(5),
		})
	});
	let client = NerveClient::with_transport(transport.clone(), 3);

	let err = client.send_reply("t1", "draft_1", false).await.unwrap_err();
	assert_eq!(transport.count("tools/call"), 1);
	match err {
		Error::RateLimited { retry_after, .. } => {
			assert_eq!(retry_after, Duration::from_secs(5));
		}
		other => panic!("expected RateLimited, got {other:?}"),
	}
}

#[tokio::test(start_paused = true)]
async fn no_rate_limit_retry_after_session_recovery() {
	// Expire the first tool call, then rate limit the replay. The rate
	// limit must surface immediately: the post-recovery replay gets no
	// retry budget.
	let initializes = Arc::new(AtomicUsize::new(0));
	let transport = {
		let initializes = Arc::clone(&initializes);
		ScriptedTransport::new(move |call| {
			Ok(match call.method() {
				"initialize" => {
					let n = initializes.fetch_add(1, Ordering::SeqCst);
					initialized(if n == 0 { "stale" } else { "fresh" })
				}
				_ => {
					if call.session_id.as_deref() == Some("stale") {
						rpc_error(-32000, "Session expired", None)
					} else {
						rate_limited(1)
					}
				}
			})
		})
	};
	let client = NerveClient::with_transport(transport.clone(), 3);

	let err = client.get_thread("thread_1").await.unwrap_err();
	assert!(matches!(err, Error::RateLimited { .. }), "got {err:?}");
	// Original attempt plus exactly one replay.
	assert_eq!(transport.count("tools/call"), 2);
}

// ------------------------------------------------------------------
// Error handling
// ------------------------------------------------------------------

#[tokio::test]
async fn http_401_maps_to_auth_error() {
	// Body would parse as a success; the status must win.
	let transport = ScriptedTransport::new(|_| {
		Ok(RpcHttpResponse {
			status: 401,
			session_id: Some("ignored".into()),
			body: Some(json!({"jsonrpc": "2.0", "id": 0, "result": {}})),
		})
	});
	let client = NerveClient::with_transport(transport.clone(), 3);

	let err = client.list_threads("inbox_1", None, 50, None).await.unwrap_err();
	assert!(matches!(err, Error::Auth(_)), "got {err:?}");
	assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn http_403_maps_to_auth_error() {
	let transport = ScriptedTransport::new(|_| {
		Ok(RpcHttpResponse {
			status: 403,
			session_id: None,
			body: Some(rate_limited(1).body.unwrap()),
		})
	});
	let client = NerveClient::with_transport(transport.clone(), 3);

	let err = client.get_thread("t").await.unwrap_err();
	assert!(matches!(err, Error::Auth(_)), "got {err:?}");
}

#[tokio::test]
async fn quota_and_subscription_fail_fast() {
	for (code, check) in [
		(-32040_i64, true),
		(-32041_i64, false),
	] {
		let transport = ScriptedTransport::new(move |call| {
			Ok(match call.method() {
				"initialize" => initialized("s"),
				_ => rpc_error(code, "tenant gate", None),
			})
		});
		let client = NerveClient::with_transport(transport.clone(), 3);

		let err = client.get_thread("t").await.unwrap_err();
		if check {
			assert!(matches!(err, Error::QuotaExceeded(_)), "got {err:?}");
		} else {
			assert!(matches!(err, Error::SubscriptionInactive(_)), "got {err:?}");
		}
		// First occurrence fails; zero additional round trips.
		assert_eq!(transport.count("tools/call"), 1);
	}
}

#[tokio::test]
async fn unknown_code_surfaces_as_remote() {
	let transport = ScriptedTransport::new(|call| {
		Ok(match call.method() {
			"initialize" => initialized("s"),
			_ => rpc_error(-32601, "method not found", None),
		})
	});
	let client = NerveClient::with_transport(transport, 3);

	let err = client.execute_tool("bogus_tool", json!({})).await.unwrap_err();
	match err {
		Error::Remote { code, message } => {
			assert_eq!(code, -32601);
			assert_eq!(message, "method not found");
		}
		other => panic!("expected Remote, got {other:?}"),
	}
}

#[tokio::test]
async fn null_result_is_success() {
	let transport = ScriptedTransport::new(|call| {
		Ok(match call.method() {
			"initialize" => initialized("s"),
			_ => RpcHttpResponse {
				status: 200,
				session_id: None,
				body: Some(json!({"jsonrpc": "2.0", "id": 0})),
			},
		})
	});
	let client = NerveClient::with_transport(transport, 3);

	let result = client.triage_message("msg_1").await.unwrap();
	assert_eq!(result, Value::Null);
}

// ------------------------------------------------------------------
// Readiness / lifecycle
// ------------------------------------------------------------------

#[tokio::test]
async fn health_check_swallows_transport_errors() {
	let transport =
		ScriptedTransport::new(|_| Err(Error::Transport("connection refused".into())));
	let client = NerveClient::with_transport(transport, 3);
	assert!(!client.health_check().await);
}

#[tokio::test]
async fn health_check_swallows_auth_errors() {
	let transport = ScriptedTransport::new(|_| {
		Ok(RpcHttpResponse {
			status: 401,
			session_id: None,
			body: None,
		})
	});
	let client = NerveClient::with_transport(transport, 3);
	assert!(!client.health_check().await);
}

#[tokio::test]
async fn health_check_true_when_session_establishes() {
	let transport = ScriptedTransport::new(|call| {
		Ok(match call.method() {
			"initialize" => initialized("s"),
			_ => ok_json(json!({})),
		})
	});
	let client = NerveClient::with_transport(transport, 3);
	assert!(client.health_check().await);
}

#[tokio::test]
async fn close_is_idempotent_and_fails_later_calls() {
	let transport = ScriptedTransport::new(|call| {
		Ok(match call.method() {
			"initialize" => initialized("s"),
			_ => ok_json(json!({})),
		})
	});
	let client = NerveClient::with_transport(transport, 3);

	client.close();
	client.close();

	let err = client.get_thread("t").await.unwrap_err();
	assert!(matches!(err, Error::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn list_tools_unwraps_tool_array() {
	let transport = ScriptedTransport::new(|call| {
		Ok(match call.method() {
			"initialize" => initialized("s"),
			"tools/list" => ok_json(json!({"tools": [{"name": "list_threads"}, {"name": "send_reply"}]})),
			_ => ok_json(json!({})),
		})
	});
	let client = NerveClient::with_transport(transport, 3);

	let tools = client.list_tools().await.unwrap();
	assert_eq!(tools.len(), 2);
	assert_eq!(tools[0]["name"], "list_threads");
}

#[tokio::test]
async fn tool_arguments_pass_through_unchanged() {
	let transport = ScriptedTransport::new(|call| {
		Ok(match call.method() {
			"initialize" => initialized("s"),
			_ => ok_json(json!({})),
		})
	});
	let client = NerveClient::with_transport(transport.clone(), 3);

	client
		.search_inbox("inbox_1", "refund", 10, Some("page2"))
		.await
		.unwrap();

	let call = transport
		.calls()
		.into_iter()
		.find(|c| c.method() == "tools/call")
		.unwrap();
	assert_eq!(call.body["params"]["name"], "search_inbox");
	let args = &call.body["params"]["arguments"];
	assert_eq!(args["query"], "refund");
	assert_eq!(args["cursor"], "page2");
	assert_eq!(args["top_k"], 10);
}

#[tokio::test]
async fn draft_reply_forwards_attachments_only_when_present() {
	let transport = ScriptedTransport::new(|call| {
		Ok(match call.method() {
			"initialize" => initialized("s"),
			_ => ok_json(json!({"draft": "Hi"})),
		})
	});
	let client = NerveClient::with_transport(transport.clone(), 3);

	client.draft_reply("t1", "confirm the appointment", None).await.unwrap();
	client.draft_reply("t1", "confirm the appointment", Some(&[])).await.unwrap();
	let files = [json!({"filename": "intake.pdf"})];
	client
		.draft_reply("t1", "confirm the appointment", Some(&files))
		.await
		.unwrap();

	let args: Vec<Value> = transport
		.calls()
		.into_iter()
		.filter(|c| c.method() == "tools/call")
		.map(|c| c.body["params"]["arguments"].clone())
		.collect();
	assert_eq!(args.len(), 3);
	// Absent and empty both leave the key out entirely.
	assert!(args[0].get("attachments").is_none());
	assert!(args[1].get("attachments").is_none());
	assert_eq!(args[2]["attachments"][0]["filename"], "intake.pdf");
	assert_eq!(args[2]["thread_id"], "t1");
}
