//! Configuration loading and path resolution
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not fatal: a warning is logged and defaults apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ENV_CONFIG: &str = "DCOMBINE_CONFIG";
pub const ENV_DATABASE: &str = "DCOMBINE_DATABASE";
pub const ENV_SNAPSHOT: &str = "DCOMBINE_SNAPSHOT";
pub const ENV_API_KEY: &str = "DCOMBINE_API_KEY";
pub const ENV_ACCESS_TOKEN: &str = "DCOMBINE_ACCESS_TOKEN";

/// Largest page the remote API will serve
pub const MAX_PAGE_SIZE: u32 = 500;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Path to SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Path to the JSON snapshot cache
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub harvest: HarvestConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote API access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_uri")]
    pub base_uri: String,

    /// Developer API key, sent as the `api_key` query parameter
    #[serde(default)]
    pub api_key: Option<String>,

    /// Account access token, sent as a bearer token
    #[serde(default)]
    pub access_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_uri: default_base_uri(),
            api_key: None,
            access_token: None,
        }
    }
}

/// Harvest request shaping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Contact status filter (ALL, ACTIVE, UNCONFIRMED, OPTOUT, REMOVED, NON_SUBSCRIBER)
    #[serde(default = "default_status")]
    pub status: String,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default = "default_contacts_uri")]
    pub contacts_uri: String,

    #[serde(default = "default_lists_uri")]
    pub lists_uri: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            status: default_status(),
            page_size: default_page_size(),
            contacts_uri: default_contacts_uri(),
            lists_uri: default_lists_uri(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_base_uri() -> String {
    "https://api.constantcontact.com".to_string()
}

fn default_status() -> String {
    "ALL".to_string()
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_contacts_uri() -> String {
    "/v2/contacts".to_string()
}

fn default_lists_uri() -> String {
    "/v2/lists".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Values supplied on the command line; `None` falls through to lower tiers
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub api: ApiConfig,
    pub harvest: HarvestConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Resolve settings from CLI, environment, TOML and compiled defaults
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .or_else(|| env_path(ENV_CONFIG))
            .or_else(default_config_path);

        let toml_config = match config_path {
            Some(ref path) => load_toml_config(path)?,
            None => {
                warn!("No configuration directory available, using defaults");
                TomlConfig::default()
            }
        };

        Self::from_layers(cli, toml_config)
    }

    /// Merge CLI and environment values over an already-loaded TOML config
    pub fn from_layers(cli: &CliOverrides, toml_config: TomlConfig) -> Result<Self> {
        let data_dir = default_data_dir();

        let database_path = cli
            .database
            .clone()
            .or_else(|| env_path(ENV_DATABASE))
            .or(toml_config.database_path)
            .unwrap_or_else(|| data_dir.join("dcombine.db"));

        let snapshot_path = cli
            .snapshot
            .clone()
            .or_else(|| env_path(ENV_SNAPSHOT))
            .or(toml_config.snapshot_path)
            .unwrap_or_else(|| data_dir.join("snapshot.json"));

        let mut api = toml_config.api;
        api.api_key = cli
            .api_key
            .clone()
            .or_else(|| env_string(ENV_API_KEY))
            .or(api.api_key)
            .filter(|k| is_valid_key(k));
        api.access_token = cli
            .access_token
            .clone()
            .or_else(|| env_string(ENV_ACCESS_TOKEN))
            .or(api.access_token)
            .filter(|k| is_valid_key(k));

        let settings = Self {
            database_path,
            snapshot_path,
            api,
            harvest: toml_config.harvest,
            logging: toml_config.logging,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the remote API or local store cannot accept
    pub fn validate(&self) -> Result<()> {
        if self.harvest.page_size == 0 || self.harvest.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "harvest.page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.harvest.page_size
            )));
        }
        if self.api.base_uri.trim().is_empty() {
            return Err(Error::Config("api.base_uri must not be empty".to_string()));
        }
        Ok(())
    }

    /// API key, or a configuration error naming every place it can be set
    pub fn require_api_key(&self) -> Result<&str> {
        self.api.api_key.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "API key not configured. Set one of:\n\
                 1. Command line: --api-key <KEY>\n\
                 2. Environment: {}=<KEY>\n\
                 3. TOML config: [api] api_key = \"<KEY>\"",
                ENV_API_KEY
            ))
        })
    }
}

/// Load a TOML config file; a missing file yields defaults
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found: {} (using defaults)", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Default config file: `<config dir>/dcombine/dcombine.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dcombine").join("dcombine.toml"))
}

/// OS-dependent default data folder
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("dcombine"))
        .unwrap_or_else(|| PathBuf::from("./dcombine_data"))
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_path(name: &str) -> Option<PathBuf> {
    env_string(name).map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_defaults_fill_missing_sections() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config.api.base_uri, "https://api.constantcontact.com");
        assert_eq!(config.harvest.page_size, 500);
        assert_eq!(config.harvest.status, "ALL");
        assert_eq!(config.harvest.contacts_uri, "/v2/contacts");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key("   "));
        assert!(!is_valid_key(""));
    }
}
