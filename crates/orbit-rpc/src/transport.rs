//! HTTP transport for JSON-RPC envelopes.
//!
//! One POST per attempt. Retry policy lives in [`RpcClient`](crate::RpcClient);
//! the transport only classifies what went wrong so the client can decide.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::error::{Result, RpcError};
use crate::protocol::JsonRpcResponse;

/// Longest response body echoed into an error message.
const MAX_ERROR_BODY: usize = 512;

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Endpoint of the remote service.
    pub url: String,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
    /// Bearer token for the `Authorization` header.
    pub bearer_token: Option<String>,
}

impl HttpTransportConfig {
    /// Create a new HTTP transport config with the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            bearer_token: None,
        }
    }

    /// Add a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set the bearer token.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

/// Async HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: url::Url,
}

impl HttpTransport {
    /// Build a transport, validating the URL and headers up front.
    pub fn connect(config: HttpTransportConfig) -> Result<Self> {
        let url = url::Url::parse(&config.url)
            .map_err(|e| RpcError::InvalidConfig(format!("invalid URL '{}': {}", config.url, e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| RpcError::InvalidConfig(format!("invalid header '{key}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| RpcError::InvalidConfig(format!("invalid header '{key}': {e}")))?;
            headers.insert(name, value);
        }
        if let Some(token) = &config.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| RpcError::InvalidConfig(format!("invalid bearer token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .pool_max_idle_per_host(5)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| RpcError::transport(format!("failed to build HTTP client: {e}")))?;

        tracing::debug!(url = %url, "created HTTP transport");

        Ok(Self { client, url })
    }

    /// The endpoint this transport posts to.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// POST a payload and return the decoded JSON body.
    ///
    /// `Ok(None)` means the service acknowledged with an empty body (the
    /// normal answer to a notification). The whole exchange, including
    /// reading the body, is bounded by `timeout`; on expiry the in-flight
    /// request is dropped.
    pub async fn post(&self, payload: &Value, timeout: Duration) -> Result<Option<Value>> {
        tracing::trace!(url = %self.url, payload = %payload, "sending RPC request");

        let exchange = async {
            let response = self
                .client
                .post(self.url.clone())
                .json(payload)
                .send()
                .await
                .map_err(|e| classify_reqwest(e, timeout))?;

            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|e| classify_reqwest(e, timeout))?;
            Ok::<_, RpcError>((status, body))
        };

        let (status, body) = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| RpcError::Timeout(timeout))??;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RpcError::Authentication(auth_message(status, &body)));
        }

        if !status.is_success() {
            return Err(RpcError::HttpStatus {
                status: status.as_u16(),
                body: truncate(&String::from_utf8_lossy(&body)),
            });
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let value: Value = serde_json::from_slice(&body).map_err(|e| {
            RpcError::malformed(format!(
                "{e}: {}",
                truncate(&String::from_utf8_lossy(&body))
            ))
        })?;

        tracing::trace!(url = %self.url, response = %value, "received RPC response");
        Ok(Some(value))
    }
}

fn classify_reqwest(err: reqwest::Error, timeout: Duration) -> RpcError {
    if err.is_timeout() {
        RpcError::Timeout(timeout)
    } else if err.is_decode() || err.is_body() {
        RpcError::malformed(err.to_string())
    } else {
        RpcError::transport(err.to_string())
    }
}

/// Prefer the server's JSON-RPC error message over the raw status line.
fn auth_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<JsonRpcResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .map(|e| e.message)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_ERROR_BODY {
        return text.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_http_transport_config() {
        let config = HttpTransportConfig::new("http://localhost:8080/rpc")
            .with_header("X-Trace", "1")
            .with_bearer_token("secret");
        assert_eq!(config.url, "http://localhost:8080/rpc");
        assert_eq!(config.headers.len(), 1);
        assert_eq!(config.bearer_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_http_transport_invalid_url() {
        let err = HttpTransport::connect(HttpTransportConfig::new("not a valid url")).unwrap_err();
        assert!(matches!(err, RpcError::InvalidConfig(_)));
    }

    #[test]
    fn test_http_transport_invalid_header() {
        let config =
            HttpTransportConfig::new("http://localhost:8080/rpc").with_header("bad header", "x");
        let err = HttpTransport::connect(config).unwrap_err();
        assert!(matches!(err, RpcError::InvalidConfig(_)));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let long = "é".repeat(MAX_ERROR_BODY);
        let cut = truncate(&long);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= MAX_ERROR_BODY + 3);
    }

    #[tokio::test]
    async fn test_post_sends_bearer_and_decodes_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"jsonrpc":"2.0","id":1,"result":{}})),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::connect(
            HttpTransportConfig::new(server.uri()).with_bearer_token("secret"),
        )
        .unwrap();
        let body = transport
            .post(&json!({"jsonrpc":"2.0","id":1,"method":"ping"}), Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body["id"], 1);
    }

    #[tokio::test]
    async fn test_post_empty_body_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let transport = HttpTransport::connect(HttpTransportConfig::new(server.uri())).unwrap();
        let body = transport
            .post(&json!({"jsonrpc":"2.0","method":"notifications/initialized"}), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_post_classifies_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": null,
                "error": {"code": -32001, "message": "Invalid token"}
            })))
            .mount(&server)
            .await;

        let transport = HttpTransport::connect(HttpTransportConfig::new(server.uri())).unwrap();
        let err = transport
            .post(&json!({}), Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            RpcError::Authentication(message) => assert_eq!(message, "Invalid token"),
            other => panic!("expected authentication error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_post_non_json_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let transport = HttpTransport::connect(HttpTransportConfig::new(server.uri())).unwrap();
        let err = transport
            .post(&json!({}), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_post_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let transport = HttpTransport::connect(HttpTransportConfig::new(server.uri())).unwrap();
        let err = transport
            .post(&json!({}), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
