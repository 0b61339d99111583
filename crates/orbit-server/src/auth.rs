//! Bearer authentication for the HTTP API.
//!
//! Verification and audit logging are shared with the RPC endpoint, so
//! both surfaces accept the same secret and record attempts on the
//! `orbit::audit` target.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use orbit_rpc::auth;

use crate::error::ServerError;
use crate::state::AppState;

/// Reject requests without the configured bearer token.
///
/// With no token configured every request passes (local development).
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    if let Some(verifier) = state.verifier() {
        auth::authenticate(verifier.as_ref(), request.headers(), "http")
            .map_err(|e| ServerError::Unauthorized(e.to_string()))?;
    }
    Ok(next.run(request).await)
}
