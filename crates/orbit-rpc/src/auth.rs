//! Bearer authentication for inbound RPC calls.
//!
//! Every attempt, accepted or rejected, is recorded on the `orbit::audit`
//! tracing target. Credentials themselves are never logged.
//!
//! # Security
//!
//! Token comparison uses constant-time comparison to prevent timing attacks.

use http::HeaderMap;
use http::header::AUTHORIZATION;
use subtle::ConstantTimeEq;

/// Tracing target for authentication audit events.
pub const AUDIT_TARGET: &str = "orbit::audit";

/// Authentication error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Missing authorization header.
    #[error("Missing authorization token")]
    MissingToken,
    /// Header present but not `Bearer <token>`.
    #[error("Invalid authorization format")]
    InvalidFormat,
    /// Token validation failed.
    #[error("Invalid token")]
    InvalidToken,
}

/// Decides whether a bearer credential is acceptable.
pub trait CredentialVerifier: Send + Sync {
    /// Return true if `token` is valid.
    fn verify(&self, token: &str) -> bool;
}

/// Accepts exactly one shared secret.
pub struct StaticTokenVerifier {
    token: String,
}

impl StaticTokenVerifier {
    /// Create a verifier for `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenVerifier")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl CredentialVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> bool {
        constant_time_eq(token, &self.token)
    }
}

/// Compare two strings in constant time.
///
/// Strings of different length still run a comparison so the time taken
/// does not reveal how much of the prefix matched.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    if a_bytes.len() == b_bytes.len() {
        a_bytes.ct_eq(b_bytes).into()
    } else {
        let _ = a_bytes.ct_eq(a_bytes);
        false
    }
}

/// Extract the bearer token from request headers.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers.get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
    let value = header.to_str().map_err(|_| AuthError::InvalidFormat)?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidFormat)
}

/// Verify the request's bearer credential and audit the outcome.
pub fn authenticate(
    verifier: &dyn CredentialVerifier,
    headers: &HeaderMap,
    context: &str,
) -> Result<(), AuthError> {
    let outcome = bearer_token(headers).and_then(|token| {
        if verifier.verify(token) {
            Ok(())
        } else {
            Err(AuthError::InvalidToken)
        }
    });

    match &outcome {
        Ok(()) => tracing::info!(target: AUDIT_TARGET, context, outcome = "accepted", "authentication"),
        Err(e) => tracing::warn!(
            target: AUDIT_TARGET,
            context,
            outcome = "rejected",
            reason = %e,
            "authentication"
        ),
    }

    outcome
}
