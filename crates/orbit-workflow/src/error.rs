//! Error taxonomy for the workflow.
//!
//! Failures raised inside the workflow carry their [`ErrorKind`] from the
//! point they are created. Text classification ([`classify_message`]) is
//! only used for failures reported by remote tools, whose messages the
//! workflow does not control.

use std::fmt;
use std::str::FromStr;

use orbit_rpc::{JsonRpcError, RpcError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Category of a workflow failure. Each kind has its own retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Remote AI analysis failed.
    AiService,
    /// Blob store unreachable or an artifact is missing.
    StorageAccess,
    /// Remote metadata embedding failed.
    MetadataEmbedding,
    /// Order/unit records could not be read or written.
    DataStore,
    /// Completion notification failed.
    Notification,
    /// Missing settings, credentials, or deployments. Never self-resolves.
    Configuration,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; 7] = [
        Self::AiService,
        Self::StorageAccess,
        Self::MetadataEmbedding,
        Self::DataStore,
        Self::Notification,
        Self::Configuration,
        Self::Unknown,
    ];

    /// Kebab-case name used in config keys and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AiService => "ai-service",
            Self::StorageAccess => "storage-access",
            Self::MetadataEmbedding => "metadata-embedding",
            Self::DataStore => "data-store",
            Self::Notification => "notification",
            Self::Configuration => "configuration",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| WorkflowError::Configuration(format!("unknown error kind '{s}'")))
    }
}

/// A classified workflow failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// AI analysis failure.
    #[error("AI service error: {0}")]
    AiService(String),
    /// Blob store failure.
    #[error("storage access error: {0}")]
    StorageAccess(String),
    /// Metadata embedding failure.
    #[error("metadata embedding error: {0}")]
    MetadataEmbedding(String),
    /// Data store failure.
    #[error("data store error: {0}")]
    DataStore(String),
    /// Notification failure.
    #[error("notification error: {0}")]
    Notification(String),
    /// Configuration or deployment problem.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Unclassified failure.
    #[error("{0}")]
    Unknown(String),
}

impl WorkflowError {
    /// Build an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::AiService => Self::AiService(message),
            ErrorKind::StorageAccess => Self::StorageAccess(message),
            ErrorKind::MetadataEmbedding => Self::MetadataEmbedding(message),
            ErrorKind::DataStore => Self::DataStore(message),
            ErrorKind::Notification => Self::Notification(message),
            ErrorKind::Configuration => Self::Configuration(message),
            ErrorKind::Unknown => Self::Unknown(message),
        }
    }

    /// The structured kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AiService(_) => ErrorKind::AiService,
            Self::StorageAccess(_) => ErrorKind::StorageAccess,
            Self::MetadataEmbedding(_) => ErrorKind::MetadataEmbedding,
            Self::DataStore(_) => ErrorKind::DataStore,
            Self::Notification(_) => ErrorKind::Notification,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// The message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::AiService(m)
            | Self::StorageAccess(m)
            | Self::MetadataEmbedding(m)
            | Self::DataStore(m)
            | Self::Notification(m)
            | Self::Configuration(m)
            | Self::Unknown(m) => m,
        }
    }

    /// Convert a failed RPC exchange with a service playing `role`.
    ///
    /// Rejected credentials, local misconfiguration, and requests the
    /// service refused as malformed (parse errors, bad shape, unknown
    /// tools, invalid arguments) are configuration problems and are never
    /// retried. Transport failures and server-side execution failures are
    /// attributed to the role.
    pub fn from_rpc(role: ErrorKind, err: &RpcError) -> Self {
        let kind = match err {
            RpcError::Authentication(_)
            | RpcError::InvalidConfig(_)
            | RpcError::AlreadyRegistered(_)
            | RpcError::Protocol(_)
            | RpcError::Json(_) => ErrorKind::Configuration,
            RpcError::Server { code, .. } if is_rejected_request(*code) => ErrorKind::Configuration,
            _ => role,
        };
        Self::new(kind, err.to_string())
    }

    /// Convert an error-flagged tool result from a service playing `role`.
    ///
    /// The tool's text is classified; anything that reads as a deployment
    /// or configuration problem is reported as such, otherwise the role
    /// decides.
    pub fn from_tool_failure(role: ErrorKind, tool: &str, text: &str) -> Self {
        let kind = match classify_message(text) {
            ErrorKind::Configuration => ErrorKind::Configuration,
            _ => role,
        };
        Self::new(kind, format!("{tool}: {text}"))
    }
}

/// Codes meaning the service refused the request itself; resending it
/// unchanged cannot succeed.
fn is_rejected_request(code: i64) -> bool {
    matches!(
        code,
        JsonRpcError::PARSE_ERROR
            | JsonRpcError::INVALID_REQUEST
            | JsonRpcError::METHOD_NOT_FOUND
            | JsonRpcError::INVALID_PARAMS
            | JsonRpcError::VALIDATION_ERROR
            | JsonRpcError::AUTHENTICATION_ERROR
    )
}

const CLASSIFIERS: &[(ErrorKind, &[&str])] = &[
    (
        ErrorKind::Configuration,
        &[
            "not configured",
            "missing config",
            "configuration",
            "not deployed",
            "deployment",
            "environment variable",
            "unauthorized",
            "forbidden",
            "invalid api key",
            "credentials",
        ],
    ),
    (
        ErrorKind::MetadataEmbedding,
        &["metadata", "embed", "exif", "xmp", "iptc"],
    ),
    (
        ErrorKind::AiService,
        &["ai analysis", "ai service", "analyze", "analysis", "gemini", "vision", "model"],
    ),
    (
        ErrorKind::Notification,
        &["notification", "notify", "email", "smtp", "mail"],
    ),
    (
        ErrorKind::DataStore,
        &["database", "data store", "sql", "query", "record", "transaction"],
    ),
    (
        ErrorKind::StorageAccess,
        &["storage", "bucket", "blob", "file not found", "upload", "download", "signed url"],
    ),
];

/// Classify free-form failure text. Checked in priority order, first match
/// wins; text matching nothing is [`ErrorKind::Unknown`].
pub fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    CLASSIFIERS
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map(|(kind, _)| *kind)
        .unwrap_or(ErrorKind::Unknown)
}
