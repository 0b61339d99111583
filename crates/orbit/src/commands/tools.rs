//! Tools command - lists every configured service's tool catalog.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde_json::{Map, Value, json};

use super::Context;

/// Arguments for the tools command.
#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Only this service
    #[arg(short, long)]
    pub service: Option<String>,

    /// Print catalogs as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the tools command.
pub async fn run(args: ToolsArgs, ctx: &Context) -> Result<()> {
    let pool = ctx.pool()?;
    let mut catalogs = pool.list_all_tools().await;
    if let Some(only) = &args.service {
        catalogs.retain(|name, _| name == only);
        if catalogs.is_empty() {
            anyhow::bail!("service '{}' is not configured", only);
        }
    }

    if args.json {
        let mut out = Map::new();
        for (name, outcome) in &catalogs {
            let value = match outcome {
                Ok(tools) => serde_json::to_value(tools)?,
                Err(e) => json!({ "error": e.to_string() }),
            };
            out.insert(name.clone(), value);
        }
        println!("{}", serde_json::to_string_pretty(&Value::Object(out))?);
        return Ok(());
    }

    let dim = Style::new().dim();
    for (name, outcome) in &catalogs {
        println!();
        println!("{}", style(name).bold());
        match outcome {
            Ok(tools) if tools.is_empty() => println!("  {}", dim.apply_to("(no tools)")),
            Ok(tools) => {
                for tool in tools {
                    let description = tool.description.as_deref().unwrap_or("");
                    println!("  {:<28} {}", tool.name, dim.apply_to(description));
                }
            }
            Err(e) => println!("  {} {}", style("unavailable:").red(), e),
        }
    }
    if catalogs.is_empty() {
        println!("{}", dim.apply_to("No services configured."));
    }
    println!();
    Ok(())
}
