//! Configuration resolution, loading, and path discovery.
//!
//! Resolution order: CLI argument → environment variable → XDG path → defaults.

use crate::config::{Config, UnknownBackend};
use crate::validate::{validate_config, ValidationError};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming a config file directly.
const ENV_CONFIG_PATH: &str = "SQ_CONFIG";
/// Environment variable naming a config directory.
const ENV_CONFIG_DIR: &str = "SQ_CONFIG_DIR";
/// Application name for XDG directories.
const APP_NAME: &str = "safe-query";
/// Candidate file names inside a config directory, in lookup order.
const CONFIG_FILENAMES: [&str; 2] = ["config.toml", "config.json"];

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error(transparent)]
    UnknownBackend(#[from] UnknownBackend),

    #[error("Semantic validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where the configuration came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,
    /// Set via environment variable.
    Environment,
    /// Found in the XDG config directory.
    XdgConfig,
    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// On-disk config syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Infer the format from a file extension. Anything but `.toml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Json,
        }
    }
}

/// A loaded, validated configuration with provenance.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: Config,
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Resolve the configuration file path.
///
/// An explicit CLI path is returned even if it does not exist so that
/// loading reports it as missing instead of silently using defaults.
pub fn resolve_config(cli_path: Option<&Path>) -> (Option<PathBuf>, ConfigSource) {
    if let Some(path) = cli_path {
        return (Some(path.to_path_buf()), ConfigSource::CliArgument);
    }

    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return (Some(path), ConfigSource::Environment);
        }
    }

    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        if let Some(path) = find_in_dir(Path::new(&dir)) {
            return (Some(path), ConfigSource::Environment);
        }
    }

    if let Some(dir) = dirs::config_dir() {
        if let Some(path) = find_in_dir(&dir.join(APP_NAME)) {
            return (Some(path), ConfigSource::XdgConfig);
        }
    }

    (None, ConfigSource::BuiltinDefault)
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Parse configuration text without touching the filesystem.
pub fn parse_config_str(text: &str, format: ConfigFormat) -> Result<Config, String> {
    match format {
        ConfigFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
        ConfigFormat::Toml => toml::from_str(text).map_err(|e| e.to_string()),
    }
}

/// Load and validate configuration using the standard resolution order.
pub fn load_config(cli_path: Option<&Path>) -> Result<ResolvedConfig, ConfigError> {
    let (path, source) = resolve_config(cli_path);

    let Some(path) = path else {
        let config = Config::default();
        validate_config(&config)?;
        return Ok(ResolvedConfig {
            config,
            path: None,
            source,
        });
    };

    if !path.exists() {
        return Err(ConfigError::NotFound { path });
    }

    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::IoError {
        path: path.clone(),
        source,
    })?;

    let config = parse_config_str(&text, ConfigFormat::from_path(&path)).map_err(|message| {
        ConfigError::ParseError {
            path: path.clone(),
            message,
        }
    })?;
    validate_config(&config)?;

    Ok(ResolvedConfig {
        config,
        path: Some(path),
        source,
    })
}
