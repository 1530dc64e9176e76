//! Wire types for the Nerve email MCP protocol.
//!
//! This crate contains the serde-serializable types used for communication
//! with the Nerve server over JSON-RPC. These types represent the
//! "protocol layer" - the shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! - **Pure data**: No behavior beyond serialization/deserialization
//! - **1:1 with protocol**: Match the server's JSON-RPC error contract
//! - **Stable**: Changes only when the wire protocol changes
//!
//! The ergonomic client API is built on top of these types in `nerve-rs`.

pub mod jsonrpc;
pub mod tools;
pub mod types;

pub use jsonrpc::*;
pub use tools::{ToolDefinition, ToolFormat, is_idempotent, tool_definitions};
pub use types::*;

/// JSON-RPC version tag attached to every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision this client speaks.
pub const MCP_PROTOCOL_VERSION: &str = "2025-11-25";

/// Client name reported in the `initialize` handshake.
pub const CLIENT_NAME: &str = "nerve-email-rust";

/// Client version reported in the `initialize` handshake.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Header carrying the server-issued session identifier.
pub const SESSION_ID_HEADER: &str = "MCP-Session-Id";

/// Header carrying the protocol revision.
pub const PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";

/// Header carrying a Nerve Cloud API key.
pub const CLOUD_KEY_HEADER: &str = "X-Nerve-Cloud-Key";

/// Header carrying the bootstrap admin key on the control plane.
pub const ADMIN_KEY_HEADER: &str = "X-API-Key";
