//! ORBIT - image enrichment workflow
//!
//! Main entry point for the ORBIT CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod logging;

use commands::{config, health, process, serve, tools};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// ORBIT - image enrichment workflow
#[derive(Parser)]
#[command(name = "orbit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Load only this config file instead of discovering layers
    #[arg(long, global = true, env = "ORBIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write JSON logs to daily-rotated files
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve(serve::ServeArgs),

    /// Run the workflow for one order and print the report
    Process(process::ProcessArgs),

    /// Probe the stores and every configured service
    Health(health::HealthArgs),

    /// List the tools of every configured service
    Tools(tools::ToolsArgs),

    /// Show the merged configuration and any problems
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = orbit_config::load(cli.config.as_deref())?;
    let _guard = logging::init(cli.verbose, cli.json_logs, &loaded.config.logging())?;
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        loaded,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::Process(args) => process::run(args, &ctx).await,
        Commands::Health(args) => health::run(args, &ctx).await,
        Commands::Tools(args) => tools::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
