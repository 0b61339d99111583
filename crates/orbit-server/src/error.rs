//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Authentication failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Workflow error.
    #[error("Workflow error: {0}")]
    Workflow(#[from] orbit_workflow::WorkflowError),

    /// RPC setup error.
    #[error("RPC error: {0}")]
    Rpc(#[from] orbit_rpc::RpcError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] orbit_config::ConfigError),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ServerError::Workflow(_) => (StatusCode::INTERNAL_SERVER_ERROR, "workflow_error"),
            ServerError::Rpc(_) => (StatusCode::INTERNAL_SERVER_ERROR, "rpc_error"),
            ServerError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
        };

        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, code, error = %message, "Client error");
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let bad = ServerError::BadRequest("orderId is required".into()).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let unauthorized = ServerError::Unauthorized("Invalid token".into()).into_response();
        assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);

        let workflow: ServerError =
            orbit_workflow::WorkflowError::Configuration("no bucket".into()).into();
        assert_eq!(workflow.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
