//! Safe-query configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for the agent configuration file
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation
//!
//! Configuration is an explicit value handed to agents and the search engine
//! at construction time; nothing here is process-global.

pub mod config;
pub mod resolve;
pub mod validate;

pub use config::{
    Config, OracleBackend, OracleConfig, QueryConfig, SearchConfig, UnknownBackend,
};
pub use resolve::{
    load_config, parse_config_str, resolve_config, ConfigError, ConfigFormat, ConfigSource,
    ResolvedConfig,
};
pub use validate::{early_stop_budget, validate_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
