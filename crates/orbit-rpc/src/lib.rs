//! JSON-RPC tool protocol for ORBIT.
//!
//! Every ORBIT service (data store, blob storage, AI analysis, metadata
//! embedding, notifications) exposes its operations as named *tools* behind
//! a JSON-RPC 2.0 endpoint. This crate provides both sides of that protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ConnectionPool                                             │
//! │  - One Arc<RpcClient> per service name                      │
//! │  - ping_all / initialize_all / list_all_tools               │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  RpcClient                                                  │
//! │  - initialize, tools/list, tools/call, ping, batches        │
//! │  - Monotonic request ids, timeout + transport retries       │
//! └─────────────────────────────────────────────────────────────┘
//!                           │  HTTP POST (bearer auth)
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  RpcServer                                                  │
//! │  - CORS preflight, bearer auth with audit log               │
//! │  - Single and batch dispatch, schema validation             │
//! │  - Tool handlers isolated from panics                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use orbit_rpc::{CallOptions, RpcClient, ServiceConfig};
//!
//! let client = RpcClient::connect(
//!     ServiceConfig::new("ai", "http://localhost:8082/rpc").with_bearer_token(token),
//! )?;
//! let result = client
//!     .call_tool("ai_analyze_image", Some(json!({"image_url": url})), CallOptions::default())
//!     .await?;
//! if result.is_error() {
//!     eprintln!("analysis failed: {:?}", result.text());
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use auth::{AuthError, CredentialVerifier, StaticTokenVerifier};
pub use client::{BatchCall, CallOptions, RpcClient, ServiceConfig};
pub use error::{Result, RpcError};
pub use pool::{ConnectionPool, PoolDefaults};
pub use protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, PingResult, RequestId,
    ServerCapabilities, ServerInfo, ToolContent, ToolInfo, ToolsCapability,
};
pub use registry::{
    FieldType, InputSchema, ToolDefinition, ToolError, ToolHandler, ToolOutput, ToolRegistry,
    ValidationError,
};
pub use server::{InboundRequest, MethodHandler, OutboundResponse, RpcServer};
pub use transport::{HttpTransport, HttpTransportConfig};
