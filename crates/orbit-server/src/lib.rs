//! HTTP surface for ORBIT.
//!
//! # Routes
//!
//! | Route                          | Auth | Purpose                            |
//! |--------------------------------|------|------------------------------------|
//! | `GET /health`                  | no   | Liveness                           |
//! | `GET /api/v1/health`           | yes  | Dependency probe                   |
//! | `POST /api/v1/orders/process`  | yes  | Run the workflow for one order     |
//! | `POST, OPTIONS /rpc`           | yes  | JSON-RPC endpoint hosting ORBIT tools |
//!
//! Auth applies only when a token is configured.
//!
//! # Example
//!
//! ```ignore
//! use orbit_server::{AppState, Server};
//!
//! let state = AppState::new(orchestrator, config.server(), workflow.mock_mode)?;
//! Server::from_state(state).run().await?;
//! ```

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;
pub mod tools;

pub use auth::auth_middleware;
pub use error::{Result, ServerError};
pub use routes::HealthResponse;
pub use state::AppState;

use std::net::SocketAddr;

use axum::{Router, middleware};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The ORBIT HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server from application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        use axum::routing::any;

        let mut router = Router::new()
            .merge(routes::health_routes())
            // The RPC server authenticates on its own so JSON-RPC clients
            // get JSON-RPC error envelopes.
            .route("/rpc", any(routes::rpc_handler))
            .nest("/api/v1", self.api_routes());

        if self.state.config.request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }
        if self.state.config.cors {
            router = router.layer(CorsLayer::permissive());
        }
        router.with_state(self.state.clone())
    }

    /// API routes (v1), behind the auth middleware.
    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::{get, post};

        Router::new()
            .route("/health", get(routes::health::health_detailed))
            .route("/orders/process", post(routes::process_order_handler))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth::auth_middleware,
            ))
    }

    /// Configured listen address.
    pub fn bind_address(&self) -> Result<SocketAddr> {
        let config = self.state.config();
        format!("{}:{}", config.bind, config.port)
            .parse()
            .map_err(|e| ServerError::Internal(format!("Invalid bind address: {}", e)))
    }

    /// Run the server on the configured address.
    pub async fn run(self) -> Result<()> {
        let addr = self.bind_address()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let router = self.router();
        if let Ok(addr) = listener.local_addr() {
            info!("Starting server on {}", addr);
        }

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use orbit_config::ServerConfig;
    use orbit_rpc::ConnectionPool;
    use orbit_workflow::testing::Fixture;
    use orbit_workflow::{Orchestrator, WorkflowSettings};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn server(fixture: &Fixture, token: Option<&str>) -> Server {
        let orchestrator = Orchestrator::new(
            Arc::new(ConnectionPool::new()),
            fixture.collaborators(),
            WorkflowSettings::default(),
        );
        let config = ServerConfig {
            auth_token: token.map(str::to_string),
            ..ServerConfig::default()
        };
        Server::from_state(AppState::new(orchestrator, config, false).unwrap())
    }

    fn process(body: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/orders/process")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_process_success_returns_200() {
        let fixture = Fixture::new().with_order("o1", &["a.jpg"]);
        let app = server(&fixture, None).router();

        let response = app
            .oneshot(process(r#"{"orderId":"o1","correlationId":"c-1"}"#, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["correlationId"], "c-1");
        assert_eq!(body["phases"]["email-and-cleanup"], "completed");
    }

    #[tokio::test]
    async fn test_process_failure_returns_500_with_report() {
        let fixture = Fixture::new();
        let app = server(&fixture, None).router();

        let response = app
            .oneshot(process(r#"{"orderId":"missing"}"#, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["phases"]["order-discovery"], "failed");
        assert_eq!(body["errors"][0]["kind"], "data-store");
    }

    #[tokio::test]
    async fn test_malformed_body_returns_400() {
        let fixture = Fixture::new();
        let app = server(&fixture, None).router();

        let response = app
            .clone()
            .oneshot(process(r#"{"order":"o1"}"#, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(process("not json", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_process_requires_token_when_configured() {
        let fixture = Fixture::new().with_order("o1", &["a.jpg"]);
        let app = server(&fixture, Some("secret")).router();

        let response = app
            .clone()
            .oneshot(process(r#"{"orderId":"o1"}"#, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(process(r#"{"orderId":"o1"}"#, Some("wrong")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(process(r#"{"orderId":"o1"}"#, Some("secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rpc_endpoint_lists_tools() {
        let fixture = Fixture::new();
        let app = server(&fixture, None).router();

        let request = Request::builder()
            .method("POST")
            .uri("/rpc")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"}).to_string(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["id"], 7);
        let names: Vec<&str> = body["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        assert!(names.contains(&tools::PROCESS_ORDER));
    }

    #[tokio::test]
    async fn test_rpc_endpoint_rejects_get() {
        let fixture = Fixture::new();
        let app = server(&fixture, None).router();

        let request = Request::builder()
            .method("GET")
            .uri("/rpc")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(response.headers().contains_key(header::ALLOW));
    }
}
