//! CLI command handlers.

pub mod config;
pub mod health;
pub mod process;
pub mod serve;
pub mod tools;

use std::sync::Arc;

use anyhow::Result;
use orbit_config::{LoadedConfig, OrbitConfig};
use orbit_rpc::ConnectionPool;
use orbit_workflow::Orchestrator;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration and where it came from.
    pub loaded: LoadedConfig,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// The merged configuration.
    pub fn config(&self) -> &OrbitConfig {
        &self.loaded.config
    }

    /// Pool of every configured service.
    pub fn pool(&self) -> Result<Arc<ConnectionPool>> {
        Ok(Arc::new(orbit_workflow::connect_pool(self.config())?))
    }

    /// Orchestrator over the configured services, after validation.
    pub fn orchestrator(&self) -> Result<Orchestrator> {
        self.config().ensure_valid()?;
        let pool = self.pool()?;
        Ok(Orchestrator::from_config(pool, &self.config().workflow())?)
    }
}
