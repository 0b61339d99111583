//! Collaborators backed by pooled JSON-RPC tool services.
//!
//! Each collaborator names the pooled service it uses and the
//! [`ErrorKind`] its failures are attributed to. Transport failures and
//! error-flagged tool results are converted into [`WorkflowError`]s here,
//! so the phases only ever see classified errors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orbit_config::{AnalysisType, WorkflowConfig};
use orbit_rpc::{CallOptions, ConnectionPool, RpcClient};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::collaborators::{
    BlobEntry, BlobStore, Collaborators, CompletionNotice, DataStore, EmbedRequest, EmbedResult,
    ImageAnalysis, ImageServices, Notifier,
};
use crate::error::{ErrorKind, Result, WorkflowError};
use crate::mock::MockImageServices;
use crate::model::{ImageUnit, Order, OrderUpdate, UnitUpdate};

/// Tool names used by the RPC-backed collaborators.
pub mod tools {
    pub const ORDERS_GET: &str = "orders_get";
    pub const UNITS_LIST: &str = "units_list";
    pub const UNIT_UPDATE: &str = "unit_update";
    pub const ORDER_UPDATE: &str = "order_update";
    pub const ORDERS_COUNT_PENDING: &str = "orders_count_pending";
    pub const STORAGE_LIST_FILES: &str = "storage_list_files";
    pub const STORAGE_VERIFY_FILE: &str = "storage_verify_file";
    pub const STORAGE_DELETE_FILE: &str = "storage_delete_file";
    pub const STORAGE_COPY_FILE: &str = "storage_copy_file";
    pub const STORAGE_CREATE_SIGNED_URL: &str = "storage_create_signed_url";
    pub const NOTIFY_ORDER_COMPLETED: &str = "notify_order_completed";
    pub const AI_ANALYZE_IMAGE: &str = "ai_analyze_image";
    pub const EMBED_METADATA: &str = "embed_metadata";
}

/// Calls tools on one named pooled service.
#[derive(Clone)]
struct ToolCaller {
    pool: Arc<ConnectionPool>,
    service: String,
    role: ErrorKind,
}

impl ToolCaller {
    fn new(pool: Arc<ConnectionPool>, service: impl Into<String>, role: ErrorKind) -> Self {
        Self {
            pool,
            service: service.into(),
            role,
        }
    }

    fn client(&self) -> Result<Arc<RpcClient>> {
        self.pool.get(&self.service).ok_or_else(|| {
            WorkflowError::Configuration(format!(
                "service '{}' is not configured in the connection pool",
                self.service
            ))
        })
    }

    async fn ping(&self) -> Result<()> {
        self.client()?
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| WorkflowError::from_rpc(self.role, &e))
    }

    /// One tool call with no transport-level retries. The workflow's
    /// [`RetryExecutor`](crate::retry::RetryExecutor) owns the retry budget,
    /// per error kind.
    async fn call_value(&self, tool: &str, arguments: Value) -> Result<Value> {
        let client = self.client()?;
        let result = client
            .call_tool(tool, Some(arguments), CallOptions::default().with_retries(0))
            .await
            .map_err(|e| WorkflowError::from_rpc(self.role, &e))?;

        if result.is_error() {
            let text = result.text().unwrap_or_else(|| "tool reported an error".to_string());
            return Err(WorkflowError::from_tool_failure(self.role, tool, &text));
        }

        match result.text() {
            None => Ok(Value::Null),
            Some(text) => Ok(serde_json::from_str(&text).unwrap_or(Value::String(text))),
        }
    }

    async fn call<T: DeserializeOwned>(&self, tool: &str, arguments: Value) -> Result<T> {
        let value = self.call_value(tool, arguments).await?;
        serde_json::from_value(value).map_err(|e| {
            WorkflowError::new(
                self.role,
                format!("{tool} on '{}' returned an unexpected payload: {e}", self.service),
            )
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Data store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

/// [`DataStore`] over the `orders_*` / `units_*` tools.
pub struct RpcDataStore {
    caller: ToolCaller,
}

impl RpcDataStore {
    /// Use the pooled service `service`.
    pub fn new(pool: Arc<ConnectionPool>, service: impl Into<String>) -> Self {
        Self {
            caller: ToolCaller::new(pool, service, ErrorKind::DataStore),
        }
    }
}

#[async_trait]
impl DataStore for RpcDataStore {
    async fn ping(&self) -> Result<()> {
        self.caller.ping().await
    }

    async fn get_order(&self, order_id: &str) -> Result<Option<Order>> {
        self.caller
            .call(tools::ORDERS_GET, json!({ "order_id": order_id }))
            .await
    }

    async fn list_units(&self, order_id: &str) -> Result<Vec<ImageUnit>> {
        self.caller
            .call(tools::UNITS_LIST, json!({ "order_id": order_id }))
            .await
    }

    async fn update_unit(&self, unit_id: &str, update: &UnitUpdate) -> Result<()> {
        self.caller
            .call_value(tools::UNIT_UPDATE, json!({ "unit_id": unit_id, "update": update }))
            .await
            .map(|_| ())
    }

    async fn update_order(&self, order_id: &str, update: &OrderUpdate) -> Result<()> {
        self.caller
            .call_value(tools::ORDER_UPDATE, json!({ "order_id": order_id, "update": update }))
            .await
            .map(|_| ())
    }

    async fn count_pending_orders(&self) -> Result<u64> {
        let response: CountResponse = self
            .caller
            .call(tools::ORDERS_COUNT_PENDING, json!({}))
            .await?;
        Ok(response.count)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Blob store
// ─────────────────────────────────────────────────────────────────────────────

/// [`BlobStore`] over the `storage_*` tools, scoped to one bucket.
pub struct RpcBlobStore {
    caller: ToolCaller,
    bucket: String,
}

#[derive(Deserialize)]
struct VerifyResponse {
    exists: bool,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    signed_url: String,
}

impl RpcBlobStore {
    /// Use the pooled service `service` and the bucket `bucket`.
    pub fn new(pool: Arc<ConnectionPool>, service: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            caller: ToolCaller::new(pool, service, ErrorKind::StorageAccess),
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl BlobStore for RpcBlobStore {
    async fn ping(&self) -> Result<()> {
        self.caller.ping().await
    }

    async fn list(&self, folder: &str) -> Result<Vec<BlobEntry>> {
        self.caller
            .call(
                tools::STORAGE_LIST_FILES,
                json!({ "bucket_name": self.bucket, "folder_path": folder }),
            )
            .await
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let response: VerifyResponse = self
            .caller
            .call(
                tools::STORAGE_VERIFY_FILE,
                json!({ "bucket_name": self.bucket, "file_path": path }),
            )
            .await?;
        Ok(response.exists)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.caller
            .call_value(
                tools::STORAGE_DELETE_FILE,
                json!({ "bucket_name": self.bucket, "file_path": path }),
            )
            .await
            .map(|_| ())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<()> {
        self.caller
            .call_value(
                tools::STORAGE_COPY_FILE,
                json!({
                    "bucket_name": self.bucket,
                    "source_path": from,
                    "destination_path": to,
                }),
            )
            .await
            .map(|_| ())
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String> {
        let response: SignedUrlResponse = self
            .caller
            .call(
                tools::STORAGE_CREATE_SIGNED_URL,
                json!({
                    "bucket_name": self.bucket,
                    "file_path": path,
                    "expires_in": ttl.as_secs(),
                }),
            )
            .await?;
        Ok(response.signed_url)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Notifier
// ─────────────────────────────────────────────────────────────────────────────

/// [`Notifier`] over `notify_order_completed`.
pub struct RpcNotifier {
    caller: ToolCaller,
}

impl RpcNotifier {
    /// Use the pooled service `service`.
    pub fn new(pool: Arc<ConnectionPool>, service: impl Into<String>) -> Self {
        Self {
            caller: ToolCaller::new(pool, service, ErrorKind::Notification),
        }
    }
}

#[async_trait]
impl Notifier for RpcNotifier {
    async fn order_completed(&self, notice: &CompletionNotice) -> Result<()> {
        let arguments = serde_json::to_value(notice)
            .map_err(|e| WorkflowError::Notification(e.to_string()))?;
        self.caller
            .call_value(tools::NOTIFY_ORDER_COMPLETED, arguments)
            .await
            .map(|_| ())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Image services
// ─────────────────────────────────────────────────────────────────────────────

/// [`ImageServices`] over `ai_analyze_image` and `embed_metadata`, which
/// may live on different services.
pub struct RpcImageServices {
    ai: ToolCaller,
    metadata: ToolCaller,
}

impl RpcImageServices {
    /// Use `ai_service` for analysis and `metadata_service` for embedding.
    pub fn new(
        pool: Arc<ConnectionPool>,
        ai_service: impl Into<String>,
        metadata_service: impl Into<String>,
    ) -> Self {
        Self {
            ai: ToolCaller::new(pool.clone(), ai_service, ErrorKind::AiService),
            metadata: ToolCaller::new(pool, metadata_service, ErrorKind::MetadataEmbedding),
        }
    }
}

#[async_trait]
impl ImageServices for RpcImageServices {
    async fn analyze(&self, image_url: &str, analysis_type: AnalysisType) -> Result<ImageAnalysis> {
        self.ai
            .call(
                tools::AI_ANALYZE_IMAGE,
                json!({ "image_url": image_url, "analysis_type": analysis_type }),
            )
            .await
    }

    async fn embed(&self, request: &EmbedRequest) -> Result<EmbedResult> {
        let arguments = serde_json::to_value(request)
            .map_err(|e| WorkflowError::MetadataEmbedding(e.to_string()))?;
        self.metadata.call(tools::EMBED_METADATA, arguments).await
    }
}

impl Collaborators {
    /// Collaborators that reach every role through `pool`, using the
    /// service names and bucket from `config`.
    ///
    /// In mock mode image services run locally against the pooled blob
    /// store instead.
    pub fn rpc(pool: Arc<ConnectionPool>, config: &WorkflowConfig) -> Self {
        let roles = &config.services;
        let blobs: Arc<dyn BlobStore> = Arc::new(RpcBlobStore::new(
            pool.clone(),
            &roles.storage,
            &config.storage_bucket,
        ));
        let images: Arc<dyn ImageServices> = if config.mock_mode {
            Arc::new(MockImageServices::new(blobs.clone()))
        } else {
            Arc::new(RpcImageServices::new(pool.clone(), &roles.ai, &roles.metadata))
        };
        Self {
            data: Arc::new(RpcDataStore::new(pool.clone(), &roles.data_store)),
            blobs,
            notifier: Arc::new(RpcNotifier::new(pool, &roles.notifications)),
            images,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryExecutor;
    use orbit_rpc::ServiceConfig;
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Answers the handshake, catalog, and one tool's calls, echoing ids.
    struct ToolService {
        tool: &'static str,
        payload: Value,
        is_error: bool,
    }

    impl Respond for ToolService {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
            let Some(id) = body.get("id").cloned() else {
                return ResponseTemplate::new(202);
            };
            let result = match body["method"].as_str() {
                Some("initialize") => json!({
                    "protocolVersion": orbit_rpc::protocol::PROTOCOL_VERSION,
                    "capabilities": {},
                    "serverInfo": {"name": "fake", "version": "0.0.0"}
                }),
                Some("tools/list") => json!({
                    "tools": [{"name": self.tool, "inputSchema": {"type": "object"}}]
                }),
                _ => json!({
                    "content": [{"type": "text", "text": self.payload.to_string()}],
                    "isError": self.is_error,
                }),
            };
            ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": result,
            }))
        }
    }

    /// Completes the handshake, then answers every `tools/call` with a
    /// JSON-RPC error envelope or, without one, a bare HTTP status.
    struct FailingToolService {
        tool: &'static str,
        error: Option<Value>,
        status: u16,
    }

    impl Respond for FailingToolService {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
            let Some(id) = body.get("id").cloned() else {
                return ResponseTemplate::new(202);
            };
            let result = match body["method"].as_str() {
                Some("initialize") => json!({
                    "protocolVersion": orbit_rpc::protocol::PROTOCOL_VERSION,
                    "capabilities": {},
                    "serverInfo": {"name": "fake", "version": "0.0.0"}
                }),
                Some("tools/list") => json!({
                    "tools": [{"name": self.tool, "inputSchema": {"type": "object"}}]
                }),
                _ => {
                    return match &self.error {
                        Some(error) => ResponseTemplate::new(200).set_body_json(json!({
                            "jsonrpc": "2.0",
                            "id": id,
                            "error": error,
                        })),
                        None => ResponseTemplate::new(self.status),
                    };
                }
            };
            ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": result,
            }))
        }
    }

    async fn failing_service(service: FailingToolService) -> (MockServer, Arc<ConnectionPool>) {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::method("POST"))
            .respond_with(service)
            .mount(&server)
            .await;

        let pool = Arc::new(ConnectionPool::new());
        pool.register(
            ServiceConfig::new("svc", format!("{}/rpc", server.uri()))
                .with_retries(3)
                .with_retry_delay(Duration::from_millis(1)),
        )
        .unwrap();
        (server, pool)
    }

    async fn tool_calls(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| {
                serde_json::from_slice::<Value>(&r.body)
                    .map(|b| b["method"] == "tools/call")
                    .unwrap_or(false)
            })
            .count()
    }

    async fn service_with_tool(
        tool: &'static str,
        payload: Value,
        is_error: bool,
    ) -> (MockServer, Arc<ConnectionPool>) {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::method("POST"))
            .respond_with(ToolService {
                tool,
                payload,
                is_error,
            })
            .mount(&server)
            .await;

        let pool = Arc::new(ConnectionPool::new());
        pool.register(ServiceConfig::new("svc", format!("{}/rpc", server.uri())).with_retries(0))
            .unwrap();
        (server, pool)
    }

    #[tokio::test]
    async fn test_missing_service_is_configuration_error() {
        let store = RpcDataStore::new(Arc::new(ConnectionPool::new()), "data");
        let err = store.get_order("o1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_list_files_decodes_entries() {
        let (_server, pool) = service_with_tool(
            tools::STORAGE_LIST_FILES,
            json!([{ "name": "a.jpg", "path": "o1/original/a.jpg", "size": 10 }]),
            false,
        )
        .await;

        let blobs = RpcBlobStore::new(pool, "svc", "bucket");
        let entries = blobs.list("o1/original").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a.jpg");
    }

    #[tokio::test]
    async fn test_count_pending_orders_decodes_count() {
        let (_server, pool) =
            service_with_tool(tools::ORDERS_COUNT_PENDING, json!({ "count": 4 }), false).await;

        let store = RpcDataStore::new(pool, "svc");
        assert_eq!(store.count_pending_orders().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_tool_error_is_attributed_to_role() {
        let (_server, pool) =
            service_with_tool(tools::EMBED_METADATA, json!("disk full"), true).await;

        let images = RpcImageServices::new(pool, "svc", "svc");
        let err = images
            .embed(&EmbedRequest {
                source_path: "a".into(),
                output_path: "b".into(),
                metadata: json!({}),
                compression_quality: 95,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MetadataEmbedding);
        assert!(err.message().starts_with("embed_metadata:"));
    }

    #[tokio::test]
    async fn test_unexpected_payload_keeps_role() {
        let (_server, pool) =
            service_with_tool(tools::ORDERS_GET, json!({ "unexpected": true }), false).await;

        let store = RpcDataStore::new(pool, "svc");
        let err = store.get_order("o1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataStore);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_configuration_error() {
        let (_server, pool) = service_with_tool("something_else", json!(null), false).await;

        let notifier = RpcNotifier::new(pool, "svc");
        let err = notifier
            .order_completed(&CompletionNotice {
                order_id: "o1".into(),
                customer_email: "c@example.com".into(),
                status: crate::model::OrderStatus::Completed,
                processed: 1,
                total: 1,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_invalid_params_is_attempted_once() {
        let (server, pool) = failing_service(FailingToolService {
            tool: tools::ORDERS_GET,
            error: Some(json!({"code": -32602, "message": "Invalid params: order_id"})),
            status: 200,
        })
        .await;

        let store = RpcDataStore::new(pool, "svc");
        let outcome = RetryExecutor::default()
            .run("get_order", || store.get_order("o1"))
            .await;

        let err = outcome.result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(outcome.retries, 0);
        assert_eq!(tool_calls(&server).await, 1);
    }

    #[tokio::test]
    async fn test_tool_call_skips_transport_retries() {
        let (server, pool) = failing_service(FailingToolService {
            tool: tools::STORAGE_LIST_FILES,
            error: None,
            status: 503,
        })
        .await;

        let blobs = RpcBlobStore::new(pool, "svc", "bucket");
        let err = blobs.list("o1/original").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::StorageAccess);
        assert_eq!(tool_calls(&server).await, 1);
    }
}
