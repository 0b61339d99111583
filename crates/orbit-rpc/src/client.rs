//! RPC client for communicating with ORBIT tool services.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, RpcError};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, PingResult, RequestId, ServerInfo, ToolInfo,
    methods,
};
use crate::transport::{HttpTransport, HttpTransportConfig};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of transport retries after the first attempt.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default base delay between transport retries.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Configuration for one named remote service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Unique name for this service within a pool.
    pub name: String,
    /// Endpoint URL.
    pub url: String,
    /// HTTP headers sent with every call.
    pub headers: Vec<(String, String)>,
    /// Bearer token for the service.
    pub bearer_token: Option<String>,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Transport retries after the first attempt.
    pub retries: u32,
    /// Base delay; attempt `n` waits `retry_delay * n` before retrying.
    pub retry_delay: Duration,
}

impl ServiceConfig {
    /// Create a config with default timeout and retry policy.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            headers: Vec::new(),
            bearer_token: None,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Add an HTTP header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set the bearer token.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of retries.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the base retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn transport_config(&self) -> HttpTransportConfig {
        let mut config = HttpTransportConfig::new(&self.url);
        config.headers = self.headers.clone();
        config.bearer_token = self.bearer_token.clone();
        config
    }
}

/// Per-call overrides of the client's timeout and retry budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallOptions {
    /// Timeout for this call.
    pub timeout: Option<Duration>,
    /// Retries for this call.
    pub retries: Option<u32>,
}

impl CallOptions {
    /// Override the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the retry count.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }
}

/// One entry of a batch call.
#[derive(Debug, Clone)]
pub struct BatchCall {
    /// Method name.
    pub method: String,
    /// Parameters.
    pub params: Option<Value>,
}

impl BatchCall {
    /// Create a batch entry.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// Client for one remote tool service.
///
/// Shared as `Arc<RpcClient>` by the [`ConnectionPool`](crate::ConnectionPool);
/// every method takes `&self`. The handshake is serialized so concurrent
/// first calls perform it once. The tool catalog is read concurrently and
/// replaced wholesale on refresh.
pub struct RpcClient {
    config: ServiceConfig,
    transport: HttpTransport,
    request_id: AtomicU64,
    handshake: tokio::sync::Mutex<()>,
    negotiated: RwLock<Option<InitializeResult>>,
    catalog: RwLock<Option<Vec<ToolInfo>>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("name", &self.config.name)
            .field("url", &self.config.url)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl RpcClient {
    /// Create an uninitialized client. No network traffic happens here.
    pub fn connect(config: ServiceConfig) -> Result<Self> {
        let transport = HttpTransport::connect(config.transport_config())?;

        tracing::info!(
            service = %config.name,
            url = %config.url,
            timeout_ms = config.timeout.as_millis() as u64,
            retries = config.retries,
            "created RPC client"
        );

        Ok(Self {
            config,
            transport,
            request_id: AtomicU64::new(1),
            handshake: tokio::sync::Mutex::new(()),
            negotiated: RwLock::new(None),
            catalog: RwLock::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Service name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Service URL.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Configuration this client was built from.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Whether the handshake has completed.
    pub fn is_initialized(&self) -> bool {
        self.negotiated.read().is_some()
    }

    /// Server identity from the handshake.
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.negotiated
            .read()
            .as_ref()
            .map(|r| r.server_info.clone())
    }

    /// Cached tool catalog, if it has been fetched.
    pub fn cached_tools(&self) -> Option<Vec<ToolInfo>> {
        self.catalog.read().clone()
    }

    /// Whether the pool has torn this client down.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Tear down: forget negotiated state and refuse further calls.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        *self.negotiated.write() = None;
        *self.catalog.write() = None;
        tracing::debug!(service = %self.config.name, "RPC client closed");
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Protocol operations
    // ─────────────────────────────────────────────────────────────────────

    /// Perform the capability handshake.
    ///
    /// Idempotent: once initialized, returns the negotiated result without
    /// touching the network.
    pub async fn initialize(&self) -> Result<InitializeResult> {
        let cached = self.negotiated.read().clone();
        if let Some(result) = cached {
            return Ok(result);
        }

        let _guard = self.handshake.lock().await;
        let cached = self.negotiated.read().clone();
        if let Some(result) = cached {
            return Ok(result);
        }

        let params = serde_json::to_value(InitializeParams::default())?;
        let result: InitializeResult = self
            .request(methods::INITIALIZE, Some(params), CallOptions::default())
            .await?;

        tracing::info!(
            service = %self.config.name,
            server = %result.server_info.name,
            version = %result.server_info.version,
            protocol = %result.protocol_version,
            "RPC service initialized"
        );

        if let Err(e) = self
            .send_notification(methods::INITIALIZED, None, CallOptions::default())
            .await
        {
            tracing::warn!(
                service = %self.config.name,
                error = %e,
                "initialized notification failed"
            );
        }

        *self.negotiated.write() = Some(result.clone());
        Ok(result)
    }

    /// Fetch and cache the tool catalog, initializing first if needed.
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        self.initialize().await?;

        let result: ListToolsResult = self
            .request(methods::TOOLS_LIST, None, CallOptions::default())
            .await?;

        tracing::debug!(
            service = %self.config.name,
            tool_count = result.tools.len(),
            "listed tools"
        );

        *self.catalog.write() = Some(result.tools.clone());
        Ok(result.tools)
    }

    /// Call a tool.
    ///
    /// A name missing from the cached catalog triggers one catalog refresh
    /// before the call fails with a method-not-found error. A tool that ran
    /// and failed comes back as `Ok` with `is_error()` set.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
        options: CallOptions,
    ) -> Result<CallToolResult> {
        let known = self
            .catalog
            .read()
            .as_ref()
            .is_some_and(|tools| tools.iter().any(|t| t.name == name));

        if !known {
            tracing::debug!(service = %self.config.name, tool = %name, "tool not in catalog, refreshing");
            let tools = self.list_tools().await?;
            if !tools.iter().any(|t| t.name == name) {
                return Err(RpcError::method_not_found(name));
            }
        }

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let result: CallToolResult = self
            .request(methods::TOOLS_CALL, Some(serde_json::to_value(&params)?), options)
            .await?;

        if result.is_error() {
            tracing::warn!(
                service = %self.config.name,
                tool = %name,
                error = %result.text().unwrap_or_default(),
                "tool call returned error"
            );
        } else {
            tracing::debug!(service = %self.config.name, tool = %name, "tool call succeeded");
        }

        Ok(result)
    }

    /// Liveness probe. Does not require a handshake.
    pub async fn ping(&self) -> Result<PingResult> {
        self.request(methods::PING, None, CallOptions::default())
            .await
    }

    /// Send several requests as one array payload.
    ///
    /// Responses are returned in request order. Per-entry failures are
    /// error responses in the returned vector, not an `Err`.
    pub async fn send_batch(&self, calls: Vec<BatchCall>) -> Result<Vec<JsonRpcResponse>> {
        self.ensure_open()?;
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let requests: Vec<JsonRpcRequest> = calls
            .into_iter()
            .map(|c| JsonRpcRequest::new(self.next_request_id(), c.method, c.params))
            .collect();
        let ids: Vec<RequestId> = requests.iter().filter_map(|r| r.id.clone()).collect();
        let payload = serde_json::to_value(&requests)?;

        tracing::debug!(service = %self.config.name, size = ids.len(), "sending batch");

        self.send_with_retry(&payload, "batch", CallOptions::default(), |body| {
            decode_batch(body, &ids)
        })
        .await
    }

    /// Fire-and-forget call.
    pub async fn send_notification(
        &self,
        method: &str,
        params: Option<Value>,
        options: CallOptions,
    ) -> Result<()> {
        self.ensure_open()?;
        let payload = serde_json::to_value(JsonRpcNotification::new(method, params))?;
        self.send_with_retry(&payload, method, options, |_| Ok(()))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(RpcError::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        options: CallOptions,
    ) -> Result<T> {
        self.ensure_open()?;
        let request = JsonRpcRequest::new(self.next_request_id(), method, params);
        let id = request.id.clone().unwrap_or(RequestId::Number(0));
        let payload = serde_json::to_value(&request)?;

        let value = self
            .send_with_retry(&payload, method, options, |body| decode_single(body, &id))
            .await?;

        serde_json::from_value(value)
            .map_err(|e| RpcError::malformed(format!("unexpected '{method}' result: {e}")))
    }

    /// Send `payload`, retrying transport-class failures with linear backoff.
    ///
    /// The same envelope (same id) is retransmitted on each attempt. The
    /// last attempt's error is the one returned.
    async fn send_with_retry<T>(
        &self,
        payload: &Value,
        label: &str,
        options: CallOptions,
        decode: impl Fn(Option<Value>) -> Result<T>,
    ) -> Result<T> {
        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let retries = options.retries.unwrap_or(self.config.retries);
        let mut attempt: u32 = 1;

        loop {
            let outcome = match self.transport.post(payload, timeout).await {
                Ok(body) => decode(body),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt <= retries => {
                    let delay = self.config.retry_delay * attempt;
                    tracing::warn!(
                        service = %self.config.name,
                        method = %label,
                        attempt,
                        retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "RPC call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt > 1 {
                        tracing::error!(
                            service = %self.config.name,
                            method = %label,
                            attempts = attempt,
                            error = %e,
                            "RPC call failed"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}

fn decode_single(body: Option<Value>, id: &RequestId) -> Result<Value> {
    let body = body.ok_or_else(|| RpcError::malformed("empty response body"))?;
    if body.is_array() {
        return Err(RpcError::protocol("array response to a single request"));
    }
    let response: JsonRpcResponse = serde_json::from_value(body)
        .map_err(|e| RpcError::malformed(format!("invalid response envelope: {e}")))?;
    if !response.is_well_formed() {
        return Err(RpcError::malformed(
            "response must carry exactly one of result or error",
        ));
    }
    // Error envelopes for unparseable requests carry a null id.
    if response.id.as_ref().is_some_and(|r| r != id) {
        return Err(RpcError::malformed(format!(
            "response id {:?} does not match request id {}",
            response.id, id
        )));
    }
    response.into_result().map_err(RpcError::from)
}

fn decode_batch(body: Option<Value>, ids: &[RequestId]) -> Result<Vec<JsonRpcResponse>> {
    let body = body.ok_or_else(|| RpcError::malformed("empty response body"))?;
    let Value::Array(entries) = body else {
        return Err(RpcError::protocol("batch response is not an array"));
    };
    if entries.len() != ids.len() {
        return Err(RpcError::protocol(format!(
            "batch of {} requests got {} responses",
            ids.len(),
            entries.len()
        )));
    }

    let mut by_id: HashMap<RequestId, JsonRpcResponse> = HashMap::with_capacity(entries.len());
    let mut anonymous = Vec::new();
    for entry in entries {
        let response: JsonRpcResponse = serde_json::from_value(entry)
            .map_err(|e| RpcError::malformed(format!("invalid batch entry: {e}")))?;
        match response.id.clone() {
            Some(id) => {
                by_id.insert(id, response);
            }
            None => anonymous.push(response),
        }
    }

    // Entries the server could not attribute (null id) fill the gaps in order.
    let mut anonymous = anonymous.into_iter();
    ids.iter()
        .map(|id| {
            by_id
                .remove(id)
                .or_else(|| anonymous.next())
                .ok_or_else(|| RpcError::protocol(format!("no response for request id {id}")))
        })
        .collect()
}
