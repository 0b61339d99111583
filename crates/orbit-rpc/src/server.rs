//! Transport-agnostic JSON-RPC server.
//!
//! ```text
//! InboundRequest
//!   │ OPTIONS ──────────────► 204 + CORS headers, no body
//!   │ non-POST ─────────────► 405
//!   ▼
//! authenticate (bearer) ───► 401 AuthenticationError   (audited)
//!   ▼
//! parse body ──────────────► ParseError
//!   ▼
//! single | batch (each entry independently)
//!   ▼
//! route lookup ────────────► MethodNotFound
//!   ▼
//! tools/call: schema check ► InvalidParams (names the fields)
//!   ▼
//! handler (panics and errors become isError results)
//! ```
//!
//! The HTTP framework binding lives with the caller; this module works on
//! plain `http` types so it can be mounted anywhere.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE, ALLOW,
};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::{Value, json};

use crate::auth::{self, CredentialVerifier};
use crate::error::{Result, RpcError};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION, PingResult, RequestId, ServerCapabilities,
    ServerInfo, ToolsCapability, methods,
};
use crate::registry::{ToolDefinition, ToolRegistry};

/// A custom JSON-RPC method.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Handle the call. Errors are returned to the caller as-is.
    async fn handle(&self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError>;
}

/// Dispatch target for a method name.
#[derive(Clone)]
enum Route {
    Initialize,
    Initialized,
    ListTools,
    CallTool,
    Ping,
    Custom(Arc<dyn MethodHandler>),
}

/// An HTTP request as seen by the server.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// HTTP method.
    pub method: Method,
    /// Request headers.
    pub headers: HeaderMap,
    /// Raw body.
    pub body: Bytes,
}

impl InboundRequest {
    /// A POST with the given body and no headers.
    pub fn post(body: impl Into<Bytes>) -> Self {
        Self {
            method: Method::POST,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: http::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// The HTTP response the server wants sent.
#[derive(Debug, Clone)]
pub struct OutboundResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers (always includes CORS headers).
    pub headers: HeaderMap,
    /// JSON body; `None` means an empty body.
    pub body: Option<Value>,
}

impl OutboundResponse {
    fn new(status: StatusCode, body: Option<Value>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, OPTIONS"),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("authorization, content-type, x-correlation-id"),
        );
        Self {
            status,
            headers,
            body,
        }
    }

    fn preflight() -> Self {
        let mut response = Self::new(StatusCode::NO_CONTENT, None);
        response
            .headers
            .insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
        response
    }

    fn method_not_allowed() -> Self {
        let mut response = Self::new(StatusCode::METHOD_NOT_ALLOWED, None);
        response
            .headers
            .insert(ALLOW, HeaderValue::from_static("POST, OPTIONS"));
        response
    }
}

/// JSON-RPC server over a [`ToolRegistry`].
///
/// Built and populated at startup (`&mut self`), then shared read-only
/// (typically behind an `Arc`) while serving.
pub struct RpcServer {
    info: ServerInfo,
    registry: ToolRegistry,
    routes: HashMap<String, Route>,
    verifier: Option<Arc<dyn CredentialVerifier>>,
}

impl std::fmt::Debug for RpcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcServer")
            .field("info", &self.info)
            .field("tools", &self.registry.names())
            .field("authenticated", &self.verifier.is_some())
            .finish()
    }
}

impl RpcServer {
    /// Create a server with the built-in methods and no tools.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let routes = HashMap::from([
            (methods::INITIALIZE.to_string(), Route::Initialize),
            (methods::INITIALIZED.to_string(), Route::Initialized),
            (methods::TOOLS_LIST.to_string(), Route::ListTools),
            (methods::TOOLS_CALL.to_string(), Route::CallTool),
            (methods::PING.to_string(), Route::Ping),
        ]);
        Self {
            info: ServerInfo {
                name: name.into(),
                version: version.into(),
            },
            registry: ToolRegistry::new(),
            routes,
            verifier: None,
        }
    }

    /// Require a bearer credential accepted by `verifier` on every request.
    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Register a tool.
    pub fn register_tool(&mut self, tool: ToolDefinition) -> Result<()> {
        self.registry.register(tool)
    }

    /// Register a custom method. Built-in method names cannot be replaced.
    pub fn register_method_handler(
        &mut self,
        method: impl Into<String>,
        handler: Arc<dyn MethodHandler>,
    ) -> Result<()> {
        let method = method.into();
        if self.routes.contains_key(&method) {
            return Err(RpcError::AlreadyRegistered(method));
        }
        self.routes.insert(method, Route::Custom(handler));
        Ok(())
    }

    /// Server identity.
    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Registered tools.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle one HTTP exchange.
    pub async fn handle_request(&self, request: InboundRequest) -> OutboundResponse {
        if request.method == Method::OPTIONS {
            return OutboundResponse::preflight();
        }
        if request.method != Method::POST {
            return OutboundResponse::method_not_allowed();
        }

        if let Some(verifier) = &self.verifier
            && let Err(e) = auth::authenticate(verifier.as_ref(), &request.headers, "rpc")
        {
            let body = JsonRpcResponse::failure(None, JsonRpcError::authentication(e.to_string()));
            return OutboundResponse::new(StatusCode::UNAUTHORIZED, to_json(&body));
        }

        match self.handle_message(&request.body).await {
            Some(body) => OutboundResponse::new(StatusCode::OK, Some(body)),
            None => OutboundResponse::new(StatusCode::ACCEPTED, None),
        }
    }

    /// Handle a raw JSON-RPC payload (single or batch).
    ///
    /// Returns `None` when nothing needs to be sent back (notifications only).
    pub async fn handle_message(&self, body: &[u8]) -> Option<Value> {
        let parsed: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "unparseable RPC payload");
                return to_json(&JsonRpcResponse::failure(None, JsonRpcError::parse_error(e)));
            }
        };

        match parsed {
            Value::Array(entries) if entries.is_empty() => to_json(&JsonRpcResponse::failure(
                None,
                JsonRpcError::invalid_request("empty batch"),
            )),
            Value::Array(entries) => {
                tracing::debug!(size = entries.len(), "dispatching batch");
                let responses: Vec<JsonRpcResponse> =
                    futures::future::join_all(entries.into_iter().map(|e| self.dispatch_entry(e)))
                        .await
                        .into_iter()
                        .flatten()
                        .collect();
                if responses.is_empty() {
                    None
                } else {
                    to_json(&responses)
                }
            }
            single => self
                .dispatch_entry(single)
                .await
                .and_then(|response| to_json(&response)),
        }
    }

    async fn dispatch_entry(&self, entry: Value) -> Option<JsonRpcResponse> {
        let id_hint = entry
            .get("id")
            .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());

        let request: JsonRpcRequest = match serde_json::from_value(entry) {
            Ok(request) => request,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    id_hint,
                    JsonRpcError::invalid_request(format!("invalid request: {e}")),
                ));
            }
        };

        if let Err(e) = request.validate() {
            return Some(JsonRpcResponse::failure(request.id, e));
        }

        let outcome = self.dispatch(&request.method, request.params).await;

        if request.id.is_none() {
            if let Err(e) = outcome {
                tracing::debug!(method = %request.method, error = %e.message, "notification failed");
            }
            return None;
        }

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(error) => JsonRpcResponse::failure(request.id, error),
        })
    }

    async fn dispatch(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> std::result::Result<Value, JsonRpcError> {
        let Some(route) = self.routes.get(method) else {
            tracing::debug!(method, "unknown method");
            return Err(JsonRpcError::method_not_found(method));
        };

        match route {
            Route::Initialize => self.initialize(params),
            Route::Initialized => Ok(Value::Null),
            Route::ListTools => Ok(json!({ "tools": self.registry.list() })),
            Route::CallTool => self.call_tool(params).await,
            Route::Ping => serde_json::to_value(PingResult::ok())
                .map_err(|e| JsonRpcError::internal(e.to_string())),
            Route::Custom(handler) => {
                match AssertUnwindSafe(handler.handle(params)).catch_unwind().await {
                    Ok(result) => result,
                    Err(panic) => {
                        let message = panic_message(&*panic);
                        tracing::error!(method, panic = %message, "method handler panicked");
                        Err(JsonRpcError::internal(format!("method '{method}' failed: {message}")))
                    }
                }
            }
        }
    }

    fn initialize(&self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        if let Some(params) = params {
            let params: InitializeParams = serde_json::from_value(params)
                .map_err(|e| JsonRpcError::invalid_params(format!("invalid initialize params: {e}")))?;
            tracing::info!(
                client = %params.client_info.name,
                client_version = %params.client_info.version,
                protocol = %params.protocol_version,
                "client initialized"
            );
        }

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
                experimental: None,
            },
            server_info: self.info.clone(),
        };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal(e.to_string()))
    }

    async fn call_tool(&self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError> {
        let params: CallToolParams = params
            .ok_or_else(|| JsonRpcError::invalid_params("tools/call requires params"))
            .and_then(|p| {
                serde_json::from_value(p)
                    .map_err(|e| JsonRpcError::invalid_params(format!("invalid tools/call params: {e}")))
            })?;

        let Some(tool) = self.registry.get(&params.name) else {
            tracing::debug!(tool = %params.name, "unknown tool");
            return Err(JsonRpcError::method_not_found(&params.name));
        };

        if let Err(e) = tool.schema().validate(params.arguments.as_ref()) {
            tracing::debug!(tool = %params.name, error = %e, "tool arguments rejected");
            return Err(JsonRpcError::invalid_params(e.to_string()).with_data(e.to_data()));
        }

        let handler = tool.handler();
        let arguments = params.arguments.unwrap_or(Value::Null);
        let result = match AssertUnwindSafe(handler.call(arguments)).catch_unwind().await {
            Ok(Ok(output)) => {
                tracing::debug!(tool = %params.name, "tool call succeeded");
                CallToolResult::from(output)
            }
            Ok(Err(e)) => {
                tracing::warn!(tool = %params.name, error = %e, "tool call failed");
                CallToolResult::error(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(&*panic);
                tracing::error!(tool = %params.name, panic = %message, "tool handler panicked");
                CallToolResult::error(format!("tool '{}' failed: {}", params.name, message))
            }
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal(e.to_string()))
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode RPC response");
            Some(json!({
                "jsonrpc": "2.0",
                "id": null,
                "error": {"code": JsonRpcError::INTERNAL_ERROR, "message": "failed to encode response"}
            }))
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenVerifier;
    use crate::registry::{FieldType, InputSchema, ToolError, ToolOutput};
    use http::header::AUTHORIZATION;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Deserialize)]
    struct AnalyzeArgs {
        image_url: String,
    }

    fn test_server() -> RpcServer {
        let mut server = RpcServer::new("orbit-test", "0.1.0");
        server
            .register_tool(ToolDefinition::typed(
                "ai_analyze_image",
                "Analyze an image",
                InputSchema::new()
                    .required("image_url", FieldType::String, "Image URL")
                    .optional("quality", FieldType::Integer, "Quality hint"),
                |args: AnalyzeArgs| async move {
                    Ok(ToolOutput::Json(json!({"analyzed": args.image_url})))
                },
            ))
            .unwrap();
        server
            .register_tool(ToolDefinition::typed(
                "always_fails",
                "Fails",
                InputSchema::new(),
                |_: Value| async move { Err(ToolError::failed("storage quota exceeded")) },
            ))
            .unwrap();
        server
            .register_tool(ToolDefinition::typed(
                "panics",
                "Panics",
                InputSchema::new(),
                |_: Value| async move {
                    if true {
                        panic!("boom");
                    }
                    Ok(ToolOutput::Text(String::new()))
                },
            ))
            .unwrap();
        server
    }

    async fn call(server: &RpcServer, body: Value) -> Value {
        server
            .handle_message(body.to_string().as_bytes())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_preflight_short_circuits() {
        let server = test_server().with_verifier(Arc::new(StaticTokenVerifier::new("s")));
        let request = InboundRequest {
            method: Method::OPTIONS,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };
        let response = server.handle_request(request).await;
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert!(response.body.is_none());
        assert_eq!(response.headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_non_post_rejected() {
        let server = test_server();
        let request = InboundRequest {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };
        let response = server.handle_request(request).await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers[ALLOW], "POST, OPTIONS");
    }

    #[tokio::test]
    async fn test_authentication_fails_closed_before_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut server = RpcServer::new("orbit-test", "0.1.0")
            .with_verifier(Arc::new(StaticTokenVerifier::new("secret")));
        server
            .register_tool(ToolDefinition::typed(
                "count",
                "Counts calls",
                InputSchema::new(),
                move |_: Value| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(ToolOutput::Text("counted".into()))
                    }
                },
            ))
            .unwrap();

        let body = json!({"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"count"}});
        let response = server
            .handle_request(InboundRequest::post(body.to_string()))
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.body.unwrap()["error"]["code"],
            json!(JsonRpcError::AUTHENTICATION_ERROR)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let response = server
            .handle_request(
                InboundRequest::post(body.to_string())
                    .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer secret")),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_parse_error() {
        let server = test_server();
        let response = server.handle_message(b"{not json").await.unwrap();
        assert_eq!(response["error"]["code"], json!(JsonRpcError::PARSE_ERROR));
        assert_eq!(response["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_invalid_request_shape() {
        let server = test_server();
        let response = call(&server, json!({"jsonrpc":"2.0","id":4})).await;
        assert_eq!(response["error"]["code"], json!(JsonRpcError::INVALID_REQUEST));
        assert_eq!(response["id"], 4);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let server = test_server();
        let response = call(&server, json!({"jsonrpc":"2.0","id":1,"method":"resources/list"})).await;
        assert_eq!(response["error"]["code"], json!(JsonRpcError::METHOD_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_method_not_found() {
        let server = test_server();
        let response = call(
            &server,
            json!({"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"resize"}}),
        )
        .await;
        assert_eq!(response["error"]["code"], json!(JsonRpcError::METHOD_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_invalid_params_name_fields() {
        let server = test_server();
        let response = call(
            &server,
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": {"name": "ai_analyze_image", "arguments": {"quality": "high"}}
            }),
        )
        .await;
        assert_eq!(response["error"]["code"], json!(JsonRpcError::INVALID_PARAMS));
        assert_eq!(
            response["error"]["data"]["fields"],
            json!(["image_url", "quality"])
        );
    }

    #[tokio::test]
    async fn test_tool_success() {
        let server = test_server();
        let response = call(
            &server,
            json!({
                "jsonrpc": "2.0",
                "id": "a",
                "method": "tools/call",
                "params": {"name": "ai_analyze_image", "arguments": {"image_url": "u1"}}
            }),
        )
        .await;
        assert_eq!(response["id"], "a");
        let result: CallToolResult = serde_json::from_value(response["result"].clone()).unwrap();
        assert!(!result.is_error());
        let payload: Value = result.json().unwrap();
        assert_eq!(payload["analyzed"], "u1");
    }

    #[tokio::test]
    async fn test_tool_failure_is_error_result_not_envelope_error() {
        let server = test_server();
        let response = call(
            &server,
            json!({"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"always_fails"}}),
        )
        .await;
        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["isError"], true);
        assert_eq!(response["result"]["content"][0]["text"], "storage quota exceeded");
    }

    #[tokio::test]
    async fn test_tool_panic_is_contained() {
        let server = test_server();
        let response = call(
            &server,
            json!({"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"panics"}}),
        )
        .await;
        assert_eq!(response["result"]["isError"], true);
        assert!(
            response["result"]["content"][0]["text"]
                .as_str()
                .unwrap()
                .contains("boom")
        );

        // The server keeps serving.
        let response = call(&server, json!({"jsonrpc":"2.0","id":2,"method":"ping"})).await;
        assert_eq!(response["result"]["status"], "ok");
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_cardinality() {
        let server = test_server();
        let response = call(
            &server,
            json!([
                {"jsonrpc":"2.0","id":1,"method":"ping"},
                {"jsonrpc":"2.0","id":2,"method":"nope"},
                {"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"always_fails"}},
                {"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"ai_analyze_image"}},
                {"jsonrpc":"2.0","id":5,"method":"tools/list"}
            ]),
        )
        .await;

        let entries = response.as_array().unwrap();
        assert_eq!(entries.len(), 5);
        let ids: Vec<i64> = entries.iter().map(|e| e["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(entries[0].get("result").is_some());
        assert_eq!(entries[1]["error"]["code"], json!(JsonRpcError::METHOD_NOT_FOUND));
        assert_eq!(entries[2]["result"]["isError"], true);
        assert_eq!(entries[3]["error"]["code"], json!(JsonRpcError::INVALID_PARAMS));
        assert_eq!(entries[4]["result"]["tools"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_batch_is_invalid() {
        let server = test_server();
        let response = call(&server, json!([])).await;
        assert_eq!(response["error"]["code"], json!(JsonRpcError::INVALID_REQUEST));
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let server = test_server();
        let body = json!({"jsonrpc":"2.0","method":"notifications/initialized"});
        assert!(server.handle_message(body.to_string().as_bytes()).await.is_none());

        let response = server
            .handle_request(InboundRequest::post(body.to_string()))
            .await;
        assert_eq!(response.status, StatusCode::ACCEPTED);
        assert!(response.body.is_none());
    }

    #[tokio::test]
    async fn test_initialize_reports_server_info() {
        let server = test_server();
        let params = serde_json::to_value(InitializeParams::default()).unwrap();
        let response = call(
            &server,
            json!({"jsonrpc":"2.0","id":1,"method":"initialize","params":params}),
        )
        .await;
        let result: InitializeResult = serde_json::from_value(response["result"].clone()).unwrap();
        assert_eq!(result.server_info.name, "orbit-test");
        assert_eq!(result.protocol_version, PROTOCOL_VERSION);
        assert!(result.capabilities.tools.is_some());
    }

    struct Echo;

    #[async_trait]
    impl MethodHandler for Echo {
        async fn handle(&self, params: Option<Value>) -> std::result::Result<Value, JsonRpcError> {
            Ok(params.unwrap_or(Value::Null))
        }
    }

    #[tokio::test]
    async fn test_custom_method_handler() {
        let mut server = test_server();
        server
            .register_method_handler("workflow/echo", Arc::new(Echo))
            .unwrap();
        let response = call(
            &server,
            json!({"jsonrpc":"2.0","id":1,"method":"workflow/echo","params":{"x":1}}),
        )
        .await;
        assert_eq!(response["result"]["x"], 1);
    }

    #[test]
    fn test_builtin_methods_cannot_be_replaced() {
        let mut server = test_server();
        let err = server
            .register_method_handler("ping", Arc::new(Echo))
            .unwrap_err();
        assert!(matches!(err, RpcError::AlreadyRegistered(_)));
    }
}
