//! Application state shared across handlers.

use std::sync::Arc;

use orbit_config::ServerConfig;
use orbit_rpc::{CredentialVerifier, RpcServer, StaticTokenVerifier};
use orbit_workflow::Orchestrator;

use crate::error::Result;
use crate::tools;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Runs orders.
    pub orchestrator: Arc<Orchestrator>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// JSON-RPC endpoint hosting the ORBIT tools.
    pub rpc: Arc<RpcServer>,

    verifier: Option<Arc<dyn CredentialVerifier>>,
}

impl AppState {
    /// Build state over `orchestrator`. With `mock_mode` the RPC endpoint
    /// also serves deterministic analysis and embedding tools.
    pub fn new(orchestrator: Orchestrator, config: ServerConfig, mock_mode: bool) -> Result<Self> {
        let orchestrator = Arc::new(orchestrator);
        let verifier: Option<Arc<dyn CredentialVerifier>> = config
            .auth_token
            .as_ref()
            .map(|token| Arc::new(StaticTokenVerifier::new(token.as_str())) as _);

        let mut rpc = tools::build_rpc_server(orchestrator.clone(), mock_mode)?;
        if let Some(verifier) = &verifier {
            rpc = rpc.with_verifier(verifier.clone());
        }

        Ok(Self {
            orchestrator,
            config: Arc::new(config),
            rpc: Arc::new(rpc),
            verifier,
        })
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Verifier for protected routes, if a token is configured.
    pub fn verifier(&self) -> Option<&Arc<dyn CredentialVerifier>> {
        self.verifier.as_ref()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("rpc", &self.rpc)
            .field("authenticated", &self.verifier.is_some())
            .finish_non_exhaustive()
    }
}
