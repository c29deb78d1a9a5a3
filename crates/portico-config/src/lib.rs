//! Configuration system for the Portico gateway.
//!
//! Provides TOML-based configuration with:
//! - Deployment mode detection (`development`, `ci`, `production`)
//! - Per-service route overrides for browser and server render contexts
//! - Edge guard exemptions and reverse proxy upstreams
//! - Config file layering (XDG user config + project-local overrides)
//!
//! Configuration is read once at startup and is immutable afterwards.

pub mod discovery;
pub mod env;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, data_dir, load_config, load_config_file, load_config_with_options,
    xdg_config_dir, xdg_config_path,
};
pub use env::{Deployment, Environment, RenderContext};
pub use error::{ConfigError, Result};
pub use types::*;
