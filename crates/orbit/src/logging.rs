//! Tracing setup: human console output plus optional rotating JSON files.

use std::path::PathBuf;

use anyhow::Result;
use orbit_config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const CRATES: [&str; 5] = ["orbit", "orbit_server", "orbit_workflow", "orbit_rpc", "orbit_config"];

fn directives(crate_level: &str, fallback: &str) -> String {
    let mut parts: Vec<String> = CRATES.iter().map(|c| format!("{c}={crate_level}")).collect();
    parts.push(fallback.to_string());
    parts.join(",")
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over everything for the console. JSON files are written
/// when `json_logs` is set or `[logging] json_dir` is configured; the
/// returned guard must live as long as the process.
pub fn init(verbose: bool, json_logs: bool, config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new(directives("debug", "info"))
        } else {
            EnvFilter::new(directives(&config.level, "warn"))
        }
    });

    let json_dir = match (&config.json_dir, json_logs) {
        (Some(dir), _) => Some(dir.clone()),
        (None, true) => Some(default_log_dir()),
        (None, false) => None,
    };

    let mut guard = None;
    let json_layer = match json_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            let appender =
                tracing_appender::rolling::daily(&dir, format!("{}.log", config.file_prefix));
            let (writer, worker_guard) = tracing_appender::non_blocking(appender);
            guard = Some(worker_guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_filter(EnvFilter::new(directives("trace", "info"))),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(json_layer)
        .try_init()?;

    Ok(guard)
}

fn default_log_dir() -> PathBuf {
    orbit_config::user_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}
