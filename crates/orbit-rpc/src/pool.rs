//! Connection pool: one shared client per named service.
//!
//! Callers ask for a service by name and get back an `Arc<RpcClient>`;
//! repeated requests for the same name return the same client, so the
//! handshake and tool catalog are shared across the process.
//!
//! # Example
//!
//! ```rust,ignore
//! use orbit_rpc::{ConnectionPool, ServiceConfig};
//!
//! let pool = ConnectionPool::new();
//! pool.register(ServiceConfig::new("storage", "http://localhost:8081/rpc"))?;
//!
//! let storage = pool.get("storage").expect("registered");
//! let files = storage.call_tool("storage_list_files", Some(args), Default::default()).await?;
//!
//! for (name, outcome) in pool.ping_all().await {
//!     println!("{name}: {}", if outcome.is_ok() { "up" } else { "down" });
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::RwLock;

use crate::client::{DEFAULT_RETRIES, DEFAULT_TIMEOUT, RpcClient, ServiceConfig};
use crate::error::Result;
use crate::protocol::{InitializeResult, PingResult, ToolInfo};

/// Settings applied to clients created through [`ConnectionPool::get_client`].
#[derive(Clone)]
pub struct PoolDefaults {
    /// Bearer token sent to every service.
    pub bearer_token: Option<String>,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Transport retries per call.
    pub retries: u32,
}

impl Default for PoolDefaults {
    fn default() -> Self {
        Self {
            bearer_token: None,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
        }
    }
}

impl std::fmt::Debug for PoolDefaults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolDefaults")
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .finish()
    }
}

/// Process-wide registry of service clients keyed by name.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    defaults: PoolDefaults,
    clients: RwLock<HashMap<String, Arc<RpcClient>>>,
}

static GLOBAL: OnceLock<Arc<ConnectionPool>> = OnceLock::new();

impl ConnectionPool {
    /// Create an empty pool with default client settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty pool whose lazily-created clients use `defaults`.
    pub fn with_defaults(defaults: PoolDefaults) -> Self {
        Self {
            defaults,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide pool.
    pub fn global() -> Arc<ConnectionPool> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ConnectionPool::new())))
    }

    /// Get the client for `name`, creating it for `url` on first use.
    ///
    /// An existing client is returned as-is even if `url` differs.
    pub fn get_client(&self, name: &str, url: &str) -> Result<Arc<RpcClient>> {
        if let Some(client) = self.clients.read().get(name) {
            if client.url() != url {
                tracing::debug!(service = %name, existing = %client.url(), requested = %url, "keeping existing client");
            }
            return Ok(Arc::clone(client));
        }

        let mut clients = self.clients.write();
        if let Some(client) = clients.get(name) {
            return Ok(Arc::clone(client));
        }

        let mut config = ServiceConfig::new(name, url)
            .with_timeout(self.defaults.timeout)
            .with_retries(self.defaults.retries);
        if let Some(token) = &self.defaults.bearer_token {
            config = config.with_bearer_token(token.clone());
        }
        let client = Arc::new(RpcClient::connect(config)?);
        clients.insert(name.to_string(), Arc::clone(&client));
        Ok(client)
    }

    /// Register a fully specified service, replacing (and closing) any
    /// previous client with the same name.
    pub fn register(&self, config: ServiceConfig) -> Result<Arc<RpcClient>> {
        let client = Arc::new(RpcClient::connect(config)?);
        let previous = self
            .clients
            .write()
            .insert(client.name().to_string(), Arc::clone(&client));
        if let Some(previous) = previous {
            tracing::debug!(service = %client.name(), "replaced pooled client");
            previous.close();
        }
        Ok(client)
    }

    /// Client for `name`, if registered.
    pub fn get(&self, name: &str) -> Option<Arc<RpcClient>> {
        self.clients.read().get(name).cloned()
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.clients.read().contains_key(name)
    }

    /// Registered service names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    /// Remove and close one client. Returns whether it existed.
    pub fn remove(&self, name: &str) -> bool {
        match self.clients.write().remove(name) {
            Some(client) => {
                client.close();
                true
            }
            None => false,
        }
    }

    /// Close and drop every client.
    pub fn close(&self) {
        let drained: Vec<Arc<RpcClient>> = self.clients.write().drain().map(|(_, c)| c).collect();
        for client in &drained {
            client.close();
        }
        tracing::info!(count = drained.len(), "connection pool closed");
    }

    /// Handshake with every service concurrently.
    pub async fn initialize_all(&self) -> BTreeMap<String, Result<InitializeResult>> {
        self.for_each(|client| async move { client.initialize().await })
            .await
    }

    /// Ping every service concurrently. One failure never aborts the others.
    pub async fn ping_all(&self) -> BTreeMap<String, Result<PingResult>> {
        let results = self.for_each(|client| async move { client.ping().await }).await;
        for (name, outcome) in &results {
            if let Err(e) = outcome {
                tracing::warn!(service = %name, error = %e, "ping failed");
            }
        }
        results
    }

    /// Fetch every service's tool catalog concurrently.
    pub async fn list_all_tools(&self) -> BTreeMap<String, Result<Vec<ToolInfo>>> {
        self.for_each(|client| async move { client.list_tools().await })
            .await
    }

    async fn for_each<T, F, Fut>(&self, op: F) -> BTreeMap<String, Result<T>>
    where
        F: Fn(Arc<RpcClient>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let clients: Vec<Arc<RpcClient>> = self.clients.read().values().cloned().collect();
        let names: Vec<String> = clients.iter().map(|c| c.name().to_string()).collect();
        let outcomes = futures::future::join_all(clients.into_iter().map(op)).await;
        names.into_iter().zip(outcomes).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RpcError;
    use crate::test_support::{RpcResponder, init_result, tools_result};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn healthy_service(name: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "initialize"})))
            .respond_with(RpcResponder::result(init_result(name)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "tools/list"})))
            .respond_with(RpcResponder::result(tools_result(&["storage_list_files"])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "ping"})))
            .respond_with(RpcResponder::result(
                json!({"status": "ok", "timestamp": "2026-01-01T00:00:00Z"}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_same_name_same_client() {
        let pool = ConnectionPool::new();
        let a = pool.get_client("storage", "http://localhost:1/rpc").unwrap();
        let b = pool.get_client("storage", "http://localhost:2/rpc").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.url(), "http://localhost:1/rpc");
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_invalid_url_is_not_pooled() {
        let pool = ConnectionPool::new();
        assert!(matches!(
            pool.get_client("bad", "not a url"),
            Err(RpcError::InvalidConfig(_))
        ));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_register_replaces_and_closes() {
        let pool = ConnectionPool::new();
        let old = pool
            .register(ServiceConfig::new("ai", "http://localhost:1/rpc"))
            .unwrap();
        let new = pool
            .register(ServiceConfig::new("ai", "http://localhost:2/rpc"))
            .unwrap();
        assert!(old.is_closed());
        assert!(!new.is_closed());
        assert!(Arc::ptr_eq(&pool.get("ai").unwrap(), &new));
    }

    #[test]
    fn test_remove_and_close() {
        let pool = ConnectionPool::new();
        let storage = pool.get_client("storage", "http://localhost:1/rpc").unwrap();
        pool.get_client("ai", "http://localhost:2/rpc").unwrap();
        assert_eq!(pool.names(), vec!["ai".to_string(), "storage".to_string()]);

        assert!(pool.remove("storage"));
        assert!(!pool.remove("storage"));
        assert!(storage.is_closed());
        assert!(!pool.contains("storage"));

        pool.close();
        assert!(pool.is_empty());
    }

    #[test]
    fn test_defaults_apply_to_new_clients() {
        let pool = ConnectionPool::with_defaults(PoolDefaults {
            bearer_token: Some("svc".into()),
            timeout: Duration::from_secs(5),
            retries: 1,
        });
        let client = pool.get_client("db", "http://localhost:1/rpc").unwrap();
        assert_eq!(client.config().timeout, Duration::from_secs(5));
        assert_eq!(client.config().retries, 1);
        assert_eq!(client.config().bearer_token.as_deref(), Some("svc"));
        assert!(!format!("{:?}", PoolDefaults::default()).contains("svc"));
    }

    #[test]
    fn test_global_pool_is_shared() {
        assert!(Arc::ptr_eq(&ConnectionPool::global(), &ConnectionPool::global()));
    }

    #[tokio::test]
    async fn test_ping_all_reports_each_service() {
        let up = healthy_service("storage").await;
        let down = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&down)
            .await;

        let pool = ConnectionPool::new();
        pool.register(ServiceConfig::new("storage", format!("{}/rpc", up.uri())))
            .unwrap();
        pool.register(
            ServiceConfig::new("ai", format!("{}/rpc", down.uri()))
                .with_retries(0),
        )
        .unwrap();

        let results = pool.ping_all().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results["storage"].as_ref().unwrap().status, "ok");
        assert!(matches!(
            results["ai"],
            Err(RpcError::HttpStatus { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_list_all_tools_initializes_each_client() {
        let server = healthy_service("storage").await;
        let pool = ConnectionPool::new();
        let client = pool
            .get_client("storage", &format!("{}/rpc", server.uri()))
            .unwrap();

        let catalogs = pool.list_all_tools().await;
        let tools = catalogs["storage"].as_ref().unwrap();
        assert_eq!(tools[0].name, "storage_list_files");
        assert!(client.is_initialized());

        let handshakes = pool.initialize_all().await;
        assert_eq!(
            handshakes["storage"].as_ref().unwrap().server_info.name,
            "storage"
        );
    }
}
