//! Config command - shows the merged configuration.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::{Style, style};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the merged configuration and validation problems (default)
    Show,

    /// Show which config files were checked and loaded
    Which,

    /// Write a config file with defaults
    Init {
        /// Create project-local config (./orbit.toml) instead of user config
        #[arg(long)]
        local: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => show(ctx),
        ConfigCommand::Which => which(ctx),
        ConfigCommand::Init { local } => init(local),
    }
}

fn show(ctx: &Context) -> Result<()> {
    let config = ctx.config();
    let mut effective = config.clone();
    effective.server = Some(config.server());
    effective.logging = Some(config.logging());
    effective.workflow = Some(config.workflow());
    redact(&mut effective);
    println!("{}", effective.to_toml()?);

    let problems = config.validate();
    let dim = Style::new().dim();
    if problems.is_empty() {
        eprintln!("{}", style("Configuration is valid.").green());
    } else {
        eprintln!("{}", style("Problems:").red().bold());
        for problem in &problems {
            eprintln!("  - {}", problem);
        }
    }
    for warning in &ctx.loaded.warnings {
        eprintln!("{} {}", style("warning:").yellow(), dim.apply_to(warning));
    }
    Ok(())
}

fn redact(config: &mut orbit_config::OrbitConfig) {
    const REDACTED: &str = "<redacted>";
    if let Some(server) = &mut config.server
        && server.auth_token.is_some()
    {
        server.auth_token = Some(REDACTED.to_string());
    }
    if let Some(workflow) = &mut config.workflow
        && workflow.service_token.is_some()
    {
        workflow.service_token = Some(REDACTED.to_string());
    }
    for service in &mut config.services {
        if service.bearer_token.is_some() {
            service.bearer_token = Some(REDACTED.to_string());
        }
    }
}

fn which(ctx: &Context) -> Result<()> {
    let dim = Style::new().dim();
    println!("{}", style("Config sources (lowest precedence first)").bold());
    for source in &ctx.loaded.sources {
        let marker = if source.loaded {
            style("●").green()
        } else {
            style("○").dim()
        };
        println!("  {} {}", marker, source.path.display());
    }
    println!("  {} {}", style("●").green(), dim.apply_to("ORBIT_* environment"));
    Ok(())
}

fn init(local: bool) -> Result<()> {
    let path = if local {
        std::path::PathBuf::from("orbit.toml")
    } else {
        orbit_config::user_config_path()
            .ok_or_else(|| anyhow::anyhow!("could not determine the user config directory"))?
    };
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }

    let mut config = orbit_config::OrbitConfig::new();
    config.server = Some(Default::default());
    config.logging = Some(Default::default());
    config.workflow = Some(Default::default());
    orbit_config::save_config(&config, &path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
