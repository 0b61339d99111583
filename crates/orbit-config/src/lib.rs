//! Configuration system for the ORBIT image-enrichment workflow.
//!
//! Provides TOML-based configuration with:
//! - Server, logging, and workflow sections
//! - Named remote tool services (`[[services]]`) and the roles they fill
//! - Per-error-kind retry policy overrides
//! - Config file layering (user config dir + project-local `orbit.toml`)
//! - `ORBIT_*` environment overrides for secrets and deployment toggles
//! - Validation that reports every problem at once

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load, load_config, load_config_file, load_config_with_options,
    save_config, user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
