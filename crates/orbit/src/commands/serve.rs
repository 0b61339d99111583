//! Serve command - runs the HTTP server.

use anyhow::Result;
use clap::Args;
use orbit_server::{AppState, Server};

use super::Context;

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides config)
    #[arg(long)]
    pub bind: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;

    let mut server_config = ctx.config().server();
    if let Some(bind) = args.bind {
        server_config.bind = bind;
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }
    if server_config.auth_token.is_none() {
        tracing::warn!("no auth token configured; API and RPC endpoints are open");
    }

    let workflow = ctx.config().workflow();
    if workflow.mock_mode {
        tracing::info!("mock mode: analysis and embedding are served locally");
    }

    let state = AppState::new(orchestrator, server_config, workflow.mock_mode)?;
    Server::from_state(state).run().await?;
    Ok(())
}
