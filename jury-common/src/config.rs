//! Configuration loading and resolution
//!
//! Priority order for every setting:
//! 1. Command-line argument (highest priority, clap also folds in `JURY_*` env vars)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5780;
/// 24h, same lifetime the original login tokens had
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60 * 24;
/// One year
pub const MAX_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 366;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_LOG_FILTER: &str = "jury_score=info,tower_http=info";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TomlConfig {
    pub database_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub token_ttl_minutes: Option<i64>,
    pub cors_origins: Option<Vec<String>>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string, e.g. `"jury_score=debug"`
    pub filter: Option<String>,
}

/// Values supplied on the command line (or through clap's `env` fallback)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub token_ttl_minutes: Option<i64>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub database_path: PathBuf,
    pub bind_address: String,
    pub port: u16,
    pub token_ttl_minutes: i64,
    pub cors_origins: Vec<String>,
    pub log_filter: String,
}

impl ServiceConfig {
    /// Merge CLI overrides, environment and TOML config over the compiled defaults
    pub fn resolve(overrides: &ConfigOverrides, toml_config: &TomlConfig) -> Result<Self> {
        let database_path = overrides
            .database_path
            .clone()
            .or_else(|| std::env::var("JURY_DATABASE_PATH").ok().map(PathBuf::from))
            .or_else(|| toml_config.database_path.clone())
            .unwrap_or_else(default_database_path);

        let bind_address = overrides
            .bind_address
            .clone()
            .or_else(|| std::env::var("JURY_BIND_ADDRESS").ok())
            .or_else(|| toml_config.bind_address.clone())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let port = match overrides.port {
            Some(port) => port,
            None => match std::env::var("JURY_PORT") {
                Ok(raw) => raw
                    .parse::<u16>()
                    .map_err(|e| Error::Config(format!("Invalid JURY_PORT '{}': {}", raw, e)))?,
                Err(_) => toml_config.port.unwrap_or(DEFAULT_PORT),
            },
        };

        let token_ttl_minutes = match overrides.token_ttl_minutes {
            Some(ttl) => ttl,
            None => match std::env::var("JURY_TOKEN_TTL_MINUTES") {
                Ok(raw) => raw.parse::<i64>().map_err(|e| {
                    Error::Config(format!("Invalid JURY_TOKEN_TTL_MINUTES '{}': {}", raw, e))
                })?,
                Err(_) => toml_config
                    .token_ttl_minutes
                    .unwrap_or(DEFAULT_TOKEN_TTL_MINUTES),
            },
        };
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&token_ttl_minutes) {
            return Err(Error::Config(format!(
                "token_ttl_minutes must be between 1 and {} (got {})",
                MAX_TOKEN_TTL_MINUTES, token_ttl_minutes
            )));
        }

        let cors_origins = toml_config
            .cors_origins
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_CORS_ORIGIN.to_string()]);

        let log_filter = toml_config
            .logging
            .filter
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            database_path,
            bind_address,
            port,
            token_ttl_minutes,
            cors_origins,
            log_filter,
        })
    }

    /// `host:port` string for `TcpListener::bind`
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Load the TOML config.
///
/// An explicit path must exist and parse. Without one, the platform default locations are
/// probed and a missing file yields an empty config.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match find_config_file() {
            Some(path) => path,
            None => {
                debug!("No config file found, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = parse_toml_config(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Parse config file contents
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Probe `~/.config/jury/config.toml`, then `/etc/jury/config.toml` on Linux
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("jury").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/jury/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default database path
pub fn default_database_path() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/jury (or /var/lib/jury for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("jury"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/jury"))
            .join("jury.db")
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("jury"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/jury"))
            .join("jury.db")
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("jury"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\jury"))
            .join("jury.db")
    } else {
        PathBuf::from("./jury_data/jury.db")
    }
}
