//! Health command - probes the stores and every configured service.

use anyhow::{Result, bail};
use clap::Args;
use console::{Style, style};
use orbit_workflow::HealthStatus;

use super::Context;

/// Arguments for the health command.
#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the health command. Fails when the report is unhealthy.
pub async fn run(args: HealthArgs, ctx: &Context) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;
    let report = orchestrator.health_check().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let dim = Style::new().dim();
        let overall = match report.status {
            HealthStatus::Healthy => style("healthy").green(),
            HealthStatus::Degraded => style("degraded").yellow(),
            HealthStatus::Unhealthy => style("unhealthy").red(),
        };

        println!();
        println!("{} {}", style("ORBIT Health").bold(), overall);
        println!("{}", dim.apply_to("─".repeat(40)));
        for (name, component) in &report.components {
            let marker = if component.healthy {
                style("●").green()
            } else {
                style("●").red()
            };
            println!(
                "  {} {:<16} {}",
                marker,
                name,
                dim.apply_to(format!("{} ms", component.latency_ms))
            );
            if let Some(detail) = &component.detail
                && (!component.healthy || ctx.verbose)
            {
                println!("      {}", dim.apply_to(detail));
            }
        }
        println!();
    }

    if report.status == HealthStatus::Unhealthy {
        bail!("unhealthy: {}", report.failing().join(", "));
    }
    Ok(())
}
