//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [server]                      # HTTP surface
//! [logging]                     # log level and JSON log files
//! [workflow]                    # orchestration settings
//! [workflow.services]           # which pooled service plays which role
//! [workflow.retry.storage-access]
//! [[services]]                  # remote tool services
//! ```

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Environment variable holding the server's bearer secret.
pub const AUTH_TOKEN_ENV: &str = "ORBIT_AUTH_TOKEN";
/// Environment variable holding the default outbound bearer token.
pub const SERVICE_TOKEN_ENV: &str = "ORBIT_SERVICE_TOKEN";
/// Environment variable toggling mock mode.
pub const MOCK_MODE_ENV: &str = "ORBIT_MOCK_MODE";
/// Environment variable overriding the storage bucket.
pub const STORAGE_BUCKET_ENV: &str = "ORBIT_STORAGE_BUCKET";

/// Error kinds that accept a `[workflow.retry.<kind>]` override.
pub const RETRY_KINDS: &[&str] = &[
    "ai-service",
    "storage-access",
    "metadata-embedding",
    "data-store",
    "notification",
    "configuration",
    "unknown",
];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    /// HTTP server settings.
    pub server: Option<ServerConfig>,

    /// Logging settings.
    pub logging: Option<LoggingConfig>,

    /// Workflow settings.
    pub workflow: Option<WorkflowConfig>,

    /// Remote tool services.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceEntry>,
}

impl OrbitConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Services are merged by name: a later entry replaces an earlier one
    /// with the same name, new names are appended.
    pub fn merge(&mut self, other: OrbitConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }

        if other.workflow.is_some() {
            self.workflow = other.workflow;
        }

        for service in other.services {
            match self.services.iter_mut().find(|s| s.name == service.name) {
                Some(existing) => *existing = service,
                None => self.services.push(service),
            }
        }
    }

    /// Effective server settings.
    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// Effective logging settings.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Effective workflow settings.
    pub fn workflow(&self) -> WorkflowConfig {
        self.workflow.clone().unwrap_or_default()
    }

    /// Look up a service entry by name.
    pub fn service(&self, name: &str) -> Option<&ServiceEntry> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Apply `ORBIT_*` environment overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (used by tests).
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty(AUTH_TOKEN_ENV) {
            self.server.get_or_insert_with(ServerConfig::default).auth_token = Some(token);
        }

        if let Some(token) = non_empty(SERVICE_TOKEN_ENV) {
            self.workflow.get_or_insert_with(WorkflowConfig::default).service_token = Some(token);
        }

        if let Some(raw) = non_empty(MOCK_MODE_ENV) {
            let enabled = parse_bool(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: MOCK_MODE_ENV.to_string(),
                value: raw.clone(),
            })?;
            self.workflow.get_or_insert_with(WorkflowConfig::default).mock_mode = enabled;
        }

        if let Some(bucket) = non_empty(STORAGE_BUCKET_ENV) {
            self.workflow.get_or_insert_with(WorkflowConfig::default).storage_bucket = bucket;
        }

        Ok(())
    }

    /// Check the config, returning every problem found.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let logging = self.logging();
        let workflow = self.workflow();

        if !LOG_LEVELS.contains(&logging.level.to_ascii_lowercase().as_str()) {
            problems.push(format!("[logging] unknown level '{}'", logging.level));
        }

        if workflow.storage_bucket.trim().is_empty() {
            problems.push("[workflow] storage_bucket must not be empty".to_string());
        }
        if workflow.unit_concurrency == 0 {
            problems.push("[workflow] unit_concurrency must be at least 1".to_string());
        }
        if !(1..=100).contains(&workflow.compression_quality) {
            problems.push(format!(
                "[workflow] compression_quality must be 1-100, got {}",
                workflow.compression_quality
            ));
        }
        if workflow.signed_url_ttl_secs == 0 {
            problems.push("[workflow] signed_url_ttl_secs must be positive".to_string());
        }

        for (kind, policy) in &workflow.retry {
            if !RETRY_KINDS.contains(&kind.as_str()) {
                problems.push(format!("[workflow.retry.{kind}] is not a known error kind"));
            }
            if policy.multiplier.is_some_and(|m| m < 1.0) {
                problems.push(format!("[workflow.retry.{kind}] multiplier must be >= 1.0"));
            }
            if let (Some(base), Some(max)) = (policy.base_delay_ms, policy.max_delay_ms)
                && max < base
            {
                problems.push(format!(
                    "[workflow.retry.{kind}] max_delay_ms ({max}) is below base_delay_ms ({base})"
                ));
            }
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            if !seen.insert(service.name.as_str()) {
                problems.push(format!("[[services]] duplicate name '{}'", service.name));
            }
            match url::Url::parse(&service.url) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                Ok(url) => problems.push(format!(
                    "[[services]] '{}' uses unsupported scheme '{}'",
                    service.name,
                    url.scheme()
                )),
                Err(e) => problems.push(format!(
                    "[[services]] '{}' has invalid url '{}': {}",
                    service.name, service.url, e
                )),
            }
            if service.timeout_secs == 0 {
                problems.push(format!("[[services]] '{}' timeout_secs must be positive", service.name));
            }
        }

        for name in &workflow.required_services {
            if self.service(name).is_some() {
                continue;
            }
            if workflow.mock_mode && workflow.services.is_mockable(name) {
                continue;
            }
            problems.push(format!("required service '{name}' is not configured in [[services]]"));
        }

        problems
    }

    /// Validate, converting any problems into an error.
    pub fn ensure_valid(&self) -> Result<()> {
        let problems = self.validate();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// Warnings about secrets stored in plain text.
    pub fn plaintext_token_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.as_ref().is_some_and(|s| s.auth_token.is_some()) {
            warnings.push(format!(
                "[server] contains a plaintext auth_token. Consider setting {AUTH_TOKEN_ENV} instead."
            ));
        }

        if self.workflow.as_ref().is_some_and(|w| w.service_token.is_some()) {
            warnings.push(format!(
                "[workflow] contains a plaintext service_token. Consider setting {SERVICE_TOKEN_ENV} instead."
            ));
        }

        for service in &self.services {
            if service.bearer_token.is_some() {
                warnings.push(format!(
                    "[[services]] '{}' contains a plaintext bearer_token. \
                     Consider setting {SERVICE_TOKEN_ENV} instead.",
                    service.name
                ));
            }
        }

        warnings
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP server configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
    /// Bearer secret required on protected routes. `None` leaves them open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Enable permissive CORS.
    pub cors: bool,
    /// Enable request tracing.
    pub request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
            auth_token: None,
            cors: true,
            request_logging: true,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("cors", &self.cors)
            .field("request_logging", &self.request_logging)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for daily-rotated JSON log files. Unset disables file logs.
    pub json_dir: Option<PathBuf>,
    /// File name prefix for JSON logs.
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_dir: None,
            file_prefix: "orbit".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Workflow Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of analysis requested from the AI service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    /// Scene and mood oriented.
    #[default]
    Lifestyle,
    /// Product-catalog oriented.
    Product,
}

impl AnalysisType {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lifestyle => "lifestyle",
            Self::Product => "product",
        }
    }
}

/// Workflow configuration section.
///
/// ```toml
/// [workflow]
/// storage_bucket = "orbit-images"
/// unit_concurrency = 1
/// analysis_type = "lifestyle"
///
/// [workflow.retry.storage-access]
/// max_retries = 8
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Blob store bucket holding order folders.
    pub storage_bucket: String,
    /// Subfolder of an order holding the uploaded originals.
    pub original_folder: String,
    /// Subfolder of an order holding processed artifacts.
    pub processed_folder: String,
    /// Units processed at once. 1 means strictly sequential.
    pub unit_concurrency: usize,
    /// Analysis flavour passed to the AI service.
    pub analysis_type: AnalysisType,
    /// Quality passed to the metadata embedding service.
    pub compression_quality: u8,
    /// Lifetime of signed URLs handed to the AI service.
    pub signed_url_ttl_secs: u64,
    /// Host deterministic AI/embedding tools locally.
    pub mock_mode: bool,
    /// Default bearer token for services without their own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_token: Option<String>,
    /// Services that must be configured for pre-flight to pass.
    pub required_services: Vec<String>,
    /// Role-to-service bindings.
    pub services: ServiceRoles,
    /// Per-kind retry overrides, keyed by error kind.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub retry: BTreeMap<String, RetryPolicyConfig>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        let services = ServiceRoles::default();
        Self {
            storage_bucket: "orbit-images".to_string(),
            original_folder: "original".to_string(),
            processed_folder: "processed".to_string(),
            unit_concurrency: 1,
            analysis_type: AnalysisType::default(),
            compression_quality: 95,
            signed_url_ttl_secs: 3600,
            mock_mode: false,
            service_token: None,
            required_services: services.all(),
            services,
            retry: BTreeMap::new(),
        }
    }
}

impl std::fmt::Debug for WorkflowConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowConfig")
            .field("storage_bucket", &self.storage_bucket)
            .field("original_folder", &self.original_folder)
            .field("processed_folder", &self.processed_folder)
            .field("unit_concurrency", &self.unit_concurrency)
            .field("analysis_type", &self.analysis_type)
            .field("compression_quality", &self.compression_quality)
            .field("signed_url_ttl_secs", &self.signed_url_ttl_secs)
            .field("mock_mode", &self.mock_mode)
            .field("service_token", &self.service_token.as_ref().map(|_| "<redacted>"))
            .field("required_services", &self.required_services)
            .field("services", &self.services)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Names of the pooled services that fill each workflow role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceRoles {
    /// Order and unit records.
    pub data_store: String,
    /// Blob storage.
    pub storage: String,
    /// AI image analysis.
    pub ai: String,
    /// Metadata embedding.
    pub metadata: String,
    /// Completion notifications.
    pub notifications: String,
}

impl Default for ServiceRoles {
    fn default() -> Self {
        Self {
            data_store: "data".to_string(),
            storage: "storage".to_string(),
            ai: "ai".to_string(),
            metadata: "metadata".to_string(),
            notifications: "notifications".to_string(),
        }
    }
}

impl ServiceRoles {
    /// Every bound service name.
    pub fn all(&self) -> Vec<String> {
        vec![
            self.data_store.clone(),
            self.storage.clone(),
            self.ai.clone(),
            self.metadata.clone(),
            self.notifications.clone(),
        ]
    }

    /// Whether mock mode can stand in for this service locally.
    pub fn is_mockable(&self, name: &str) -> bool {
        name == self.ai || name == self.metadata
    }
}

/// Partial retry policy; unset fields keep the built-in default for the kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicyConfig {
    /// Retries after the first attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Delay before the first retry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_delay_ms: Option<u64>,
    /// Growth factor per retry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
    /// Upper bound on any single delay.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Services
// ─────────────────────────────────────────────────────────────────────────────

/// One remote tool service.
///
/// ```toml
/// [[services]]
/// name = "storage"
/// url = "https://storage.internal/rpc"
/// timeout_secs = 60
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceEntry {
    /// Unique service name.
    pub name: String,
    /// JSON-RPC endpoint.
    pub url: String,
    /// Per-call timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Transport retries per call.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Base delay between transport retries.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Extra HTTP headers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Bearer token for this service only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

impl ServiceEntry {
    /// Entry with default timeout and retry settings.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            headers: BTreeMap::new(),
            bearer_token: None,
        }
    }
}

impl std::fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("timeout_secs", &self.timeout_secs)
            .field("retries", &self.retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_config() -> OrbitConfig {
        let mut config = OrbitConfig::new();
        for name in ServiceRoles::default().all() {
            config
                .services
                .push(ServiceEntry::new(&name, format!("http://localhost:9000/{name}")));
        }
        config
    }

    #[test]
    fn test_parse_full_config() {
        let config = OrbitConfig::from_toml(
            r#"
[server]
port = 9090
auth_token = "secret"

[logging]
level = "debug"
json_dir = "/var/log/orbit"

[workflow]
storage_bucket = "prod-images"
unit_concurrency = 4
analysis_type = "product"

[workflow.services]
ai = "vision"

[workflow.retry.storage-access]
max_retries = 8

[[services]]
name = "vision"
url = "https://vision.internal/rpc"
timeout_secs = 90

[services.headers]
x-tenant = "acme"
"#,
        )
        .unwrap();

        let server = config.server();
        assert_eq!(server.port, 9090);
        assert_eq!(server.bind, "127.0.0.1");
        assert_eq!(server.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.logging().level, "debug");

        let workflow = config.workflow();
        assert_eq!(workflow.storage_bucket, "prod-images");
        assert_eq!(workflow.unit_concurrency, 4);
        assert_eq!(workflow.analysis_type, AnalysisType::Product);
        assert_eq!(workflow.services.ai, "vision");
        assert_eq!(workflow.services.storage, "storage");
        assert_eq!(workflow.retry["storage-access"].max_retries, Some(8));
        assert_eq!(workflow.retry["storage-access"].base_delay_ms, None);

        let vision = config.service("vision").unwrap();
        assert_eq!(vision.timeout_secs, 90);
        assert_eq!(vision.retries, 3);
        assert_eq!(vision.headers["x-tenant"], "acme");
    }

    #[test]
    fn test_defaults() {
        let config = OrbitConfig::new();
        let workflow = config.workflow();
        assert_eq!(workflow.unit_concurrency, 1);
        assert_eq!(workflow.compression_quality, 95);
        assert_eq!(workflow.analysis_type, AnalysisType::Lifestyle);
        assert_eq!(workflow.required_services.len(), 5);
        assert_eq!(config.server().port, 8080);
    }

    #[test]
    fn test_merge_services_by_name() {
        let mut base = full_config();
        let mut overlay = OrbitConfig::new();
        overlay
            .services
            .push(ServiceEntry::new("storage", "https://storage.prod/rpc"));
        overlay
            .services
            .push(ServiceEntry::new("audit", "https://audit.prod/rpc"));
        overlay.server = Some(ServerConfig {
            port: 3000,
            ..ServerConfig::default()
        });

        base.merge(overlay);
        assert_eq!(base.services.len(), 6);
        assert_eq!(base.service("storage").unwrap().url, "https://storage.prod/rpc");
        assert_eq!(base.server().port, 3000);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (AUTH_TOKEN_ENV, "server-secret"),
            (SERVICE_TOKEN_ENV, "svc-secret"),
            (MOCK_MODE_ENV, "yes"),
            (STORAGE_BUCKET_ENV, "staging-images"),
        ]);
        let mut config = OrbitConfig::new();
        config
            .apply_overrides_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server().auth_token.as_deref(), Some("server-secret"));
        let workflow = config.workflow();
        assert_eq!(workflow.service_token.as_deref(), Some("svc-secret"));
        assert!(workflow.mock_mode);
        assert_eq!(workflow.storage_bucket, "staging-images");
    }

    #[test]
    fn test_env_override_rejects_bad_bool() {
        let mut config = OrbitConfig::new();
        let err = config
            .apply_overrides_from(|key| (key == MOCK_MODE_ENV).then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = OrbitConfig::new();
        config
            .apply_overrides_from(|_| Some("  ".to_string()))
            .unwrap();
        assert!(config.server.is_none());
        assert!(config.workflow.is_none());
    }

    #[test]
    fn test_validate_complete_config() {
        assert!(full_config().validate().is_empty());
        assert!(full_config().ensure_valid().is_ok());
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let mut config = full_config();
        config.services.push(ServiceEntry::new("storage", "ftp://x"));
        config.services.push(ServiceEntry::new("broken", "not a url"));
        config.workflow = Some(WorkflowConfig {
            storage_bucket: " ".to_string(),
            unit_concurrency: 0,
            compression_quality: 0,
            ..WorkflowConfig::default()
        });
        let mut retry = RetryPolicyConfig::default();
        retry.multiplier = Some(0.5);
        config
            .workflow
            .as_mut()
            .unwrap()
            .retry
            .insert("gremlins".to_string(), retry);

        let problems = config.validate();
        assert!(problems.iter().any(|p| p.contains("storage_bucket")));
        assert!(problems.iter().any(|p| p.contains("unit_concurrency")));
        assert!(problems.iter().any(|p| p.contains("compression_quality")));
        assert!(problems.iter().any(|p| p.contains("duplicate name 'storage'")));
        assert!(problems.iter().any(|p| p.contains("unsupported scheme 'ftp'")));
        assert!(problems.iter().any(|p| p.contains("invalid url")));
        assert!(problems.iter().any(|p| p.contains("gremlins")));
        assert!(problems.iter().any(|p| p.contains("multiplier")));

        let err = config.ensure_valid().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref list) if list.len() == problems.len()));
    }

    #[test]
    fn test_required_services_and_mock_mode() {
        let config = OrbitConfig::new();
        let problems = config.validate();
        assert_eq!(
            problems.iter().filter(|p| p.contains("required service")).count(),
            5
        );

        let mut mock = OrbitConfig::new();
        mock.workflow = Some(WorkflowConfig {
            mock_mode: true,
            ..WorkflowConfig::default()
        });
        let problems = mock.validate();
        assert_eq!(
            problems.iter().filter(|p| p.contains("required service")).count(),
            3
        );
        assert!(!problems.iter().any(|p| p.contains("'ai'")));
    }

    #[test]
    fn test_plaintext_warnings() {
        let mut config = full_config();
        config.server = Some(ServerConfig {
            auth_token: Some("t".into()),
            ..ServerConfig::default()
        });
        config.services[0].bearer_token = Some("svc".into());

        let warnings = config.plaintext_token_warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("[server]"));
        assert!(warnings[1].contains("'data'"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut entry = ServiceEntry::new("data", "http://x");
        entry.bearer_token = Some("hunter2".into());
        assert!(!format!("{entry:?}").contains("hunter2"));

        let server = ServerConfig {
            auth_token: Some("hunter2".into()),
            ..ServerConfig::default()
        };
        assert!(!format!("{server:?}").contains("hunter2"));
    }

    #[test]
    fn test_toml_round_trip_keeps_services() {
        let config = full_config();
        let text = config.to_toml().unwrap();
        let parsed = OrbitConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.services.len(), 5);
    }
}
