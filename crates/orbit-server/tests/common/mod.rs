//! Common test utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use reqwest::Client;
use tokio::task::JoinHandle;

use orbit_config::ServerConfig;
use orbit_rpc::ConnectionPool;
use orbit_server::{AppState, Server};
use orbit_workflow::testing::Fixture;
use orbit_workflow::{Orchestrator, WorkflowSettings};

/// A test server that runs in the background over in-memory collaborators.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// The auth token for the server.
    pub token: String,
    /// HTTP client for this server.
    pub client: Client,
    /// In-memory stores behind the server.
    pub fixture: Fixture,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server in mock mode over `fixture`.
    pub async fn start(fixture: Fixture) -> Result<Self> {
        let token = "test-token".to_string();
        let orchestrator = Orchestrator::new(
            Arc::new(ConnectionPool::new()),
            fixture.collaborators(),
            WorkflowSettings::default(),
        );
        let config = ServerConfig {
            auth_token: Some(token.clone()),
            request_logging: false,
            ..ServerConfig::default()
        };
        let state = AppState::new(orchestrator, config, true)?;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = Server::from_state(state);
        let handle = tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        Ok(Self {
            addr,
            token,
            client: Client::new(),
            fixture,
            _handle: handle,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of the JSON-RPC endpoint.
    pub fn rpc_url(&self) -> String {
        format!("{}/rpc", self.base_url())
    }

    /// Get an authenticated POST request builder.
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url(), path))
            .bearer_auth(&self.token)
    }
}
