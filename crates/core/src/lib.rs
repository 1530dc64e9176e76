//! Async Rust client for the Nerve email server.
//!
//! Nerve exposes email operations (threads, search, triage, drafting,
//! sending) as MCP tools over JSON-RPC/HTTP, plus a REST control plane
//! for tenant administration. This crate provides:
//!
//! - [`NerveClient`]: the data-plane MCP client with transparent session
//!   management, bounded rate-limit retries for idempotent tools, and
//!   one-shot recovery from mid-flight session expiry
//! - [`NerveAdmin`]: the control-plane client for orgs, domains, inboxes,
//!   and credential issuance
//! - [`Error`]: the typed failure taxonomy both clients surface
//!
//! Wire-level types and the static tool catalog live in `nerve-protocol`
//! and are re-exported under [`protocol`].
//!
//! ```no_run
//! use nerve::NerveClient;
//!
//! # async fn run() -> nerve::Result<()> {
//! let client = NerveClient::builder("https://nerve.example.com")
//!     .api_key("nerve_sk_...")
//!     .build()?;
//! let threads = client.list_threads("inbox_123", Some("open"), 20, None).await?;
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod client;
pub mod error;
pub mod session;
pub mod transport;

pub use nerve_protocol as protocol;

pub use admin::{NerveAdmin, NerveAdminBuilder};
pub use client::{NerveClient, NerveClientBuilder};
pub use error::{Error, Result};
pub use session::SessionManager;
pub use transport::{Credentials, HttpTransport, RpcHttpResponse, Transport};
