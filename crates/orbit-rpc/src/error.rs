//! Error types for RPC operations.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::JsonRpcError;

/// Result type for RPC operations.
pub type Result<T> = std::result::Result<T, RpcError>;

/// Error type for RPC operations.
///
/// Variants fall into the classes callers care about: transport failures
/// (retried within the client's budget), protocol failures (the request
/// itself is wrong, never retried), authentication rejections (surfaced
/// immediately), and local misconfiguration.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Network-level failure talking to the remote service.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote service answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// Status code returned by the service.
        status: u16,
        /// Response body, truncated for logging.
        body: String,
    },

    /// The response body could not be decoded as a JSON-RPC envelope.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The call exceeded its configured timeout and was aborted.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The remote service rejected our credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The exchange violated the protocol (e.g. batch cardinality mismatch).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Server returned an error envelope.
    #[error("server error {code}: {message}")]
    Server {
        /// Error code from the server.
        code: i64,
        /// Error message from the server.
        message: String,
        /// Optional additional data.
        data: Option<serde_json::Value>,
    },

    /// Invalid local configuration (bad URL, bad header value).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A tool or method with this name is already registered.
    #[error("'{0}' is already registered")]
    AlreadyRegistered(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The client was torn down by its pool.
    #[error("connection closed")]
    ConnectionClosed,
}

impl RpcError {
    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a malformed-response error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a server error from an error response.
    pub fn server_error(
        code: i64,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self::Server {
            code,
            message: message.into(),
            data,
        }
    }

    /// The error a client reports when a tool is missing from the catalog.
    pub fn method_not_found(name: &str) -> Self {
        Self::server_error(
            JsonRpcError::METHOD_NOT_FOUND,
            format!("tool not found: {name}"),
            None,
        )
    }

    /// Whether the client should retry the request that produced this error.
    ///
    /// Only transport-class failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::HttpStatus { .. } | Self::MalformedResponse(_) | Self::Timeout(_)
        )
    }

    /// Whether this is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// JSON-RPC code associated with this error, when there is one.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Server { code, .. } => Some(*code),
            Self::Authentication(_) => Some(JsonRpcError::AUTHENTICATION_ERROR),
            Self::MalformedResponse(_) | Self::Json(_) => Some(JsonRpcError::PARSE_ERROR),
            Self::Protocol(_) => Some(JsonRpcError::INVALID_REQUEST),
            _ => None,
        }
    }

    /// Whether the service could be reached at all.
    ///
    /// A server-side rejection proves the service is alive even though the
    /// call failed.
    pub fn service_reachable(&self) -> bool {
        matches!(
            self,
            Self::Server { .. } | Self::Authentication(_) | Self::Protocol(_)
        )
    }
}

impl From<JsonRpcError> for RpcError {
    fn from(err: JsonRpcError) -> Self {
        Self::Server {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}
