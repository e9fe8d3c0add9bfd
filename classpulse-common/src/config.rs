//! Configuration loading
//!
//! Every setting resolves through four tiers, highest priority first:
//! command-line argument, environment variable, TOML config file, compiled
//! default. The alert rule table is special-cased: a malformed `[alerts]`
//! section is logged and degrades to an empty table (alerting goes Idle)
//! instead of failing startup, because a broken advisory policy must never
//! take ingestion down with it.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::alerts::AlertRules;
use crate::{Error, Result};

pub const DEFAULT_PORT: u16 = 5730;
pub const DEFAULT_API_KEY: &str = "devkey";

pub const ENV_PORT: &str = "CLASSPULSE_PORT";
pub const ENV_DATA_DIR: &str = "CLASSPULSE_DATA_DIR";
pub const ENV_API_KEY: &str = "CLASSPULSE_API_KEY";
pub const ENV_CONFIG: &str = "CLASSPULSE_CONFIG";

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    /// Shared secret expected in the X-API-Key header
    pub api_key: String,
    pub alerts: AlertRules,
}

impl ServiceConfig {
    /// Resolve configuration from overrides, environment, file and defaults
    pub fn resolve(overrides: ConfigOverrides) -> Result<ServiceConfig> {
        let file = match locate_config_file(overrides.config_path.as_deref()) {
            Some(path) => {
                info!("Loading config file: {}", path.display());
                let content = std::fs::read_to_string(&path)?;
                parse_config_str(&content)?
            }
            None => FileConfig::default(),
        };

        let port = overrides
            .port
            .or_else(|| env_parsed(ENV_PORT))
            .or(file.port)
            .unwrap_or(DEFAULT_PORT);
        let data_dir = overrides
            .data_dir
            .or_else(|| std::env::var(ENV_DATA_DIR).ok().map(PathBuf::from))
            .or(file.data_dir)
            .unwrap_or_else(default_data_dir);
        let api_key = overrides
            .api_key
            .or_else(|| std::env::var(ENV_API_KEY).ok())
            .or(file.api_key)
            .unwrap_or_else(|| DEFAULT_API_KEY.to_string());
        let alerts = file.alerts.unwrap_or_else(AlertRules::builtin);

        Ok(ServiceConfig {
            port,
            data_dir,
            api_key,
            alerts,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("classpulse.db")
    }
}

/// CLI-provided overrides (highest priority tier)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
    pub api_key: Option<String>,
    pub config_path: Option<PathBuf>,
}

/// Settings parsed from a TOML config file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
    pub api_key: Option<String>,
    /// None when the file has no `[alerts]` section; a malformed section
    /// parses to `Some(empty table)` so alerting degrades to Idle
    pub alerts: Option<AlertRules>,
}

/// Parse config file content
///
/// An unparseable file is a hard error (a typo in the port must not be
/// silently ignored); only the alert table degrades.
pub fn parse_config_str(content: &str) -> Result<FileConfig> {
    let value: toml::Value = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config file: {}", e)))?;

    let port = value
        .get("port")
        .and_then(|v| v.as_integer())
        .and_then(|v| u16::try_from(v).ok());
    let data_dir = value
        .get("data_dir")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let api_key = value
        .get("api_key")
        .and_then(|v| v.as_str())
        .map(String::from);
    let alerts = match value.get("alerts") {
        None => None,
        Some(table) => match table.clone().try_into::<AlertRules>() {
            Ok(rules) => Some(rules),
            Err(e) => {
                error!("Malformed [alerts] table ({}); live alerting disabled", e);
                Some(AlertRules::default())
            }
        },
    };

    Ok(FileConfig {
        port,
        data_dir,
        api_key,
        alerts,
    })
}

fn locate_config_file(cli: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(ENV_CONFIG) {
        return Some(PathBuf::from(path));
    }
    let default = dirs::config_dir()?.join("classpulse").join("config.toml");
    default.exists().then_some(default)
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("classpulse"))
        .unwrap_or_else(|| PathBuf::from("./classpulse_data"))
}
