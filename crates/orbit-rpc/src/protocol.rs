//! JSON-RPC 2.0 envelope and tool protocol types.
//!
//! Every ORBIT service speaks the same envelope over HTTP POST. Requests
//! carry an id when they expect a reply; a request without an id is a
//! notification and gets no response entry.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Tool protocol version negotiated during `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Method names understood by every ORBIT server.
pub mod methods {
    /// Capability handshake.
    pub const INITIALIZE: &str = "initialize";
    /// Sent by the client after a successful handshake.
    pub const INITIALIZED: &str = "notifications/initialized";
    /// Tool catalog.
    pub const TOOLS_LIST: &str = "tools/list";
    /// Tool invocation.
    pub const TOOLS_CALL: &str = "tools/call";
    /// Liveness probe.
    pub const PING: &str = "ping";
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON-RPC Base Types
// ─────────────────────────────────────────────────────────────────────────────

/// A request identifier. Clients in this crate always use numbers, but
/// servers echo whatever the caller sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id.
    Number(u64),
    /// String id.
    String(String),
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// A JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request ID for correlating responses. Absent for notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    /// Method name to call.
    pub method: String,
    /// Method parameters (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(RequestId::Number(id)),
            method: method.into(),
            params,
        }
    }

    /// Whether this request is a notification (no reply expected).
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Structural validation performed before dispatch.
    pub fn validate(&self) -> Result<(), JsonRpcError> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(JsonRpcError::invalid_request(format!(
                "unsupported jsonrpc version '{}'",
                self.jsonrpc
            )));
        }
        if self.method.trim().is_empty() {
            return Err(JsonRpcError::invalid_request("method must not be empty"));
        }
        Ok(())
    }
}

/// A JSON-RPC notification (no id, no response expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Method parameters (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new notification.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC response.
///
/// `id` serializes as `null` when the request id could not be determined
/// (e.g. a parse error).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request ID this response is for.
    #[serde(default)]
    pub id: Option<RequestId>,
    /// Result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Build a success response.
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    pub fn failure(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Check if this is an error response.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Check the "exactly one of result/error" invariant.
    pub fn is_well_formed(&self) -> bool {
        self.jsonrpc == JSONRPC_VERSION && (self.result.is_some() != self.error.is_some())
    }

    /// Get the result, or return an error if this is an error response.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        if let Some(error) = self.error {
            Err(error)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error Object
// ─────────────────────────────────────────────────────────────────────────────

/// A JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Optional additional data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC error codes
impl JsonRpcError {
    /// Parse error - Invalid JSON.
    pub const PARSE_ERROR: i64 = -32700;
    /// Invalid Request - Not a valid Request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Method not found. Also used for unregistered tool names.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid params.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal error.
    pub const INTERNAL_ERROR: i64 = -32603;
}

// Domain error codes (-32000..=-32099)
impl JsonRpcError {
    /// Missing or rejected bearer credential.
    pub const AUTHENTICATION_ERROR: i64 = -32001;
    /// A tool handler failed outside the tool-result channel.
    pub const TOOL_EXECUTION_ERROR: i64 = -32002;
    /// Domain-level validation failure.
    pub const VALIDATION_ERROR: i64 = -32003;
    /// Caller is being throttled.
    pub const RATE_LIMITED: i64 = -32004;
    /// Method requires a completed handshake.
    pub const NOT_INITIALIZED: i64 = -32005;
}

/// Coarse classification of an error code by range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCodeClass {
    /// Reserved JSON-RPC codes (-32768..=-32000 minus the domain range).
    Standard,
    /// ORBIT domain codes (-32099..=-32000).
    Domain,
    /// Anything else (application-defined by a third party).
    Other,
}

impl ErrorCodeClass {
    /// Classify a code.
    pub fn of(code: i64) -> Self {
        match code {
            -32099..=-32000 => Self::Domain,
            -32768..=-32100 => Self::Standard,
            _ => Self::Other,
        }
    }
}

impl JsonRpcError {
    /// Create an error with no data.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured data.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Body could not be parsed as JSON.
    pub fn parse_error(detail: impl std::fmt::Display) -> Self {
        Self::new(Self::PARSE_ERROR, format!("Parse error: {detail}"))
    }

    /// Envelope is structurally invalid.
    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::new(Self::INVALID_REQUEST, detail)
    }

    /// Unknown method or tool.
    pub fn method_not_found(name: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("Method not found: {name}"))
    }

    /// Arguments failed validation.
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, detail)
    }

    /// Unexpected server failure.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL_ERROR, detail)
    }

    /// Credential missing or rejected.
    pub fn authentication(detail: impl Into<String>) -> Self {
        Self::new(Self::AUTHENTICATION_ERROR, detail)
    }

    /// Range classification of this error's code.
    pub fn class(&self) -> ErrorCodeClass {
        ErrorCodeClass::of(self.code)
    }

    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        is_retryable_code(self.code)
    }
}

/// Whether a server-reported error code is worth retrying.
pub fn is_retryable_code(code: i64) -> bool {
    matches!(code, JsonRpcError::RATE_LIMITED | JsonRpcError::INTERNAL_ERROR)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handshake Types
// ─────────────────────────────────────────────────────────────────────────────

/// Client capabilities sent during initialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Experimental capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,
}

/// Client info sent during initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "orbit".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol version.
    pub protocol_version: String,
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: ClientCapabilities,
    /// Client info.
    pub client_info: ClientInfo,
}

impl Default for InitializeParams {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo::default(),
        }
    }
}

/// Server capabilities returned during initialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tools capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
    /// Experimental capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,
}

/// Tools capability details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    /// Whether the server's tool set may change at runtime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Server info returned during initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

/// Result of the initialize request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol version.
    pub protocol_version: String,
    /// Server capabilities.
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    /// Server info.
    pub server_info: ServerInfo,
}

/// Result of `ping`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResult {
    /// Always "ok" from a healthy server.
    pub status: String,
    /// Server clock at the time of the ping.
    pub timestamp: DateTime<Utc>,
}

impl PingResult {
    /// A fresh "ok" result stamped now.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Types
// ─────────────────────────────────────────────────────────────────────────────

/// A tool definition as advertised by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    /// Tool name (unique within a service).
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

/// Result of the tools/list request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// List of available tools.
    pub tools: Vec<ToolInfo>,
}

/// Parameters for the tools/call request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments to pass to the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// Content item in a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
    /// Image content (base64 encoded).
    Image {
        /// Base64-encoded image data.
        data: String,
        /// MIME type of the image.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Resource reference.
    Resource {
        /// Resource URI.
        uri: String,
        /// Optional resource text.
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        /// Optional MIME type.
        #[serde(skip_serializing_if = "Option::is_none", rename = "mimeType")]
        mime_type: Option<String>,
    },
}

/// Result of the tools/call request.
///
/// A tool that ran but failed is still a *successful* envelope; the failure
/// is carried by `isError`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool call resulted in an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    /// A successful result with a single text item.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: Some(false),
        }
    }

    /// A successful result carrying a JSON payload as text.
    pub fn from_json(value: &Value) -> Self {
        Self::from_text(value.to_string())
    }

    /// An error-flagged result.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: Some(true),
        }
    }

    /// Concatenated text content, if any.
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|c| match c {
                ToolContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    /// Decode the first text item as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let text = self
            .content
            .iter()
            .find_map(|c| match c {
                ToolContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .unwrap_or("null");
        serde_json::from_str(text)
    }

    /// Check if the tool call was an error.
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let req = JsonRpcRequest::new(1, "initialize", Some(json!({"test": true})));
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"id\":1"));
        assert!(json.contains("\"method\":\"initialize\""));
    }

    #[test]
    fn test_notification_has_no_id() {
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .unwrap();
        assert!(req.is_notification());
    }

    #[test]
    fn test_string_ids_round_trip_through_responses() {
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":"abc","method":"ping"}"#).unwrap();
        let resp = JsonRpcResponse::success(req.id.clone(), json!({}));
        let text = serde_json::to_string(&resp).unwrap();
        assert!(text.contains("\"id\":\"abc\""));
    }

    #[test]
    fn test_validate_rejects_wrong_version() {
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#).unwrap();
        let err = req.validate().unwrap_err();
        assert_eq!(err.code, JsonRpcError::INVALID_REQUEST);
    }

    #[test]
    fn test_validate_rejects_empty_method() {
        let req: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"method":"  "}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_parse_error_response_has_null_id() {
        let resp = JsonRpcResponse::failure(None, JsonRpcError::parse_error("eof"));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["id"], Value::Null);
        assert_eq!(value["error"]["code"], json!(JsonRpcError::PARSE_ERROR));
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_response_well_formed() {
        assert!(JsonRpcResponse::success(Some(1.into()), json!(1)).is_well_formed());
        let mut both = JsonRpcResponse::success(Some(1.into()), json!(1));
        both.error = Some(JsonRpcError::internal("x"));
        assert!(!both.is_well_formed());
    }

    #[test]
    fn test_error_response() {
        let json =
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"Invalid Request"}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        assert!(resp.is_error());
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code, JsonRpcError::INVALID_REQUEST);
    }

    #[test]
    fn test_error_code_classes() {
        assert_eq!(ErrorCodeClass::of(JsonRpcError::PARSE_ERROR), ErrorCodeClass::Standard);
        assert_eq!(
            ErrorCodeClass::of(JsonRpcError::METHOD_NOT_FOUND),
            ErrorCodeClass::Standard
        );
        assert_eq!(
            ErrorCodeClass::of(JsonRpcError::AUTHENTICATION_ERROR),
            ErrorCodeClass::Domain
        );
        assert_eq!(ErrorCodeClass::of(JsonRpcError::RATE_LIMITED), ErrorCodeClass::Domain);
        assert_eq!(ErrorCodeClass::of(42), ErrorCodeClass::Other);
    }

    #[test]
    fn test_retryable_codes() {
        assert!(is_retryable_code(JsonRpcError::RATE_LIMITED));
        assert!(is_retryable_code(JsonRpcError::INTERNAL_ERROR));
        assert!(!is_retryable_code(JsonRpcError::INVALID_PARAMS));
        assert!(!is_retryable_code(JsonRpcError::AUTHENTICATION_ERROR));
    }

    #[test]
    fn test_initialize_params() {
        let params = InitializeParams::default();
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("protocolVersion"));
        assert!(json.contains("clientInfo"));
        assert!(json.contains(PROTOCOL_VERSION));
    }

    #[test]
    fn test_tool_info_deserialization() {
        let json = r#"{
            "name": "ai_analyze_image",
            "description": "Analyze an image",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "image_url": {"type": "string"}
                },
                "required": ["image_url"]
            }
        }"#;
        let tool: ToolInfo = serde_json::from_str(json).unwrap();
        assert_eq!(tool.name, "ai_analyze_image");
        assert!(tool.description.is_some());
        assert!(tool.input_schema.is_some());
    }

    #[test]
    fn test_call_tool_result_text_and_json() {
        let result = CallToolResult::from_json(&json!({"processed_path": "o/p.jpg"}));
        assert!(!result.is_error());
        let payload: Value = result.json().unwrap();
        assert_eq!(payload["processed_path"], "o/p.jpg");
    }

    #[test]
    fn test_call_tool_result_error_flag() {
        let json = r#"{"content":[{"type":"text","text":"disk full"}],"isError":true}"#;
        let result: CallToolResult = serde_json::from_str(json).unwrap();
        assert!(result.is_error());
        assert_eq!(result.text().as_deref(), Some("disk full"));
    }

    #[test]
    fn test_text_none_without_text_content() {
        let result = CallToolResult {
            content: vec![ToolContent::Image {
                data: "AA==".into(),
                mime_type: "image/png".into(),
            }],
            is_error: None,
        };
        assert!(result.text().is_none());
        assert!(!result.is_error());
    }
}
