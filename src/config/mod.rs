//! Configuration loading for the connectors service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `CONNECTORS_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ENV_PREFIX: &str = "CONNECTORS_";

/// Application configuration derived from `CONNECTORS_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operator_tokens: Vec<String>,
    #[serde(default)]
    pub mysql: MySqlSettings,
}

/// Service-wide defaults for the MySQL connector.
///
/// Callers may override the connect timeout per invocation; the remaining
/// values apply to every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct MySqlSettings {
    /// Per-attempt connect timeout (default: 10000).
    ///
    /// Environment variable: `CONNECTORS_MYSQL_CONNECT_TIMEOUT_MS`
    #[serde(default = "default_mysql_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Total connect attempts for network-class failures (default: 3, range: 1-10).
    ///
    /// Environment variable: `CONNECTORS_MYSQL_CONNECT_MAX_ATTEMPTS`
    #[serde(default = "default_mysql_connect_max_attempts")]
    pub connect_max_attempts: u32,

    /// Backoff before the second attempt; doubles after each failure (default: 500).
    ///
    /// Environment variable: `CONNECTORS_MYSQL_CONNECT_BASE_DELAY_MS`
    #[serde(default = "default_mysql_connect_base_delay_ms")]
    pub connect_base_delay_ms: u64,

    /// Row limit applied to selects that set neither `limit` nor `return_all` (default: 50).
    ///
    /// Environment variable: `CONNECTORS_MYSQL_DEFAULT_SELECT_LIMIT`
    #[serde(default = "default_mysql_default_select_limit")]
    pub default_select_limit: u64,

    /// Timeout for the SSH handshake and authentication (default: 10000).
    ///
    /// Environment variable: `CONNECTORS_MYSQL_SSH_TIMEOUT_MS`
    #[serde(default = "default_mysql_ssh_timeout_ms")]
    pub ssh_timeout_ms: u64,
}

impl Default for MySqlSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_mysql_connect_timeout_ms(),
            connect_max_attempts: default_mysql_connect_max_attempts(),
            connect_base_delay_ms: default_mysql_connect_base_delay_ms(),
            default_select_limit: default_mysql_default_select_limit(),
            ssh_timeout_ms: default_mysql_ssh_timeout_ms(),
        }
    }
}

impl MySqlSettings {
    /// Validate MySQL connector bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=10).contains(&self.connect_max_attempts) {
            return Err(ConfigError::InvalidMySqlConnectAttempts {
                value: self.connect_max_attempts,
            });
        }
        if self.connect_base_delay_ms > 60_000 {
            return Err(ConfigError::InvalidMySqlBaseDelay {
                value: self.connect_base_delay_ms,
            });
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidMySqlTimeout {
                field: "connect timeout".to_string(),
            });
        }
        if self.ssh_timeout_ms == 0 {
            return Err(ConfigError::InvalidMySqlTimeout {
                field: "ssh timeout".to_string(),
            });
        }
        if self.default_select_limit == 0 {
            return Err(ConfigError::InvalidMySqlSelectLimit);
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            operator_tokens: Vec::new(),
            mysql: MySqlSettings::default(),
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if !config.operator_tokens.is_empty() {
            config.operator_tokens = vec!["[REDACTED]".to_string()];
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Local and test profiles may run without operator tokens.
        if !matches!(self.profile.as_str(), "local" | "test") && self.operator_tokens.is_empty() {
            return Err(ConfigError::MissingOperatorTokens);
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        self.mysql.validate()?;

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_mysql_connect_timeout_ms() -> u64 {
    10_000
}

fn default_mysql_connect_max_attempts() -> u32 {
    3
}

fn default_mysql_connect_base_delay_ms() -> u64 {
    500
}

fn default_mysql_default_select_limit() -> u64 {
    50
}

fn default_mysql_ssh_timeout_ms() -> u64 {
    10_000
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error(
        "no operator tokens configured; set CONNECTORS_OPERATOR_TOKEN or CONNECTORS_OPERATOR_TOKENS"
    )]
    MissingOperatorTokens,
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("invalid value for {key}: '{value}'")]
    InvalidNumber { key: String, value: String },
    #[error("mysql connect attempts must be between 1 and 10, got {value}")]
    InvalidMySqlConnectAttempts { value: u32 },
    #[error("mysql connect base delay must not exceed 60000 ms, got {value}")]
    InvalidMySqlBaseDelay { value: u64 },
    #[error("mysql {field} must be positive")]
    InvalidMySqlTimeout { field: String },
    #[error("mysql default select limit must be at least 1")]
    InvalidMySqlSelectLimit,
}

/// Loads configuration using layered `.env` files and `CONNECTORS_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads `.env`, `.env.local`, `.env.{profile}`, `.env.{profile}.local`,
    /// then the process environment, and validates the result.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = layered
            .remove("PROFILE")
            .filter(|v| !v.is_empty())
            .unwrap_or(profile_hint);
        let api_bind_addr = layered
            .remove("API_BIND_ADDR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_api_bind_addr);
        let log_level = layered
            .remove("LOG_LEVEL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_level);
        let log_format = layered
            .remove("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_else(default_log_format);

        // Support both a single token and a comma-separated list
        let operator_tokens = if let Some(tokens) = layered.remove("OPERATOR_TOKENS") {
            tokens
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        } else if let Some(token) = layered
            .remove("OPERATOR_TOKEN")
            .filter(|t| !t.trim().is_empty())
        {
            vec![token.trim().to_string()]
        } else {
            Vec::new()
        };

        let mysql = MySqlSettings {
            connect_timeout_ms: parse_or(
                &mut layered,
                "MYSQL_CONNECT_TIMEOUT_MS",
                default_mysql_connect_timeout_ms,
            )?,
            connect_max_attempts: parse_or(
                &mut layered,
                "MYSQL_CONNECT_MAX_ATTEMPTS",
                default_mysql_connect_max_attempts,
            )?,
            connect_base_delay_ms: parse_or(
                &mut layered,
                "MYSQL_CONNECT_BASE_DELAY_MS",
                default_mysql_connect_base_delay_ms,
            )?,
            default_select_limit: parse_or(
                &mut layered,
                "MYSQL_DEFAULT_SELECT_LIMIT",
                default_mysql_default_select_limit,
            )?,
            ssh_timeout_ms: parse_or(
                &mut layered,
                "MYSQL_SSH_TIMEOUT_MS",
                default_mysql_ssh_timeout_ms,
            )?,
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            operator_tokens,
            mysql,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{}PROFILE", ENV_PREFIX))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a numeric setting; empty values fall back to the default, garbage is an error.
fn parse_or<T: std::str::FromStr>(
    layered: &mut BTreeMap<String, String>,
    key: &str,
    default: fn() -> T,
) -> Result<T, ConfigError> {
    match layered.remove(key).map(|v| v.trim().to_string()) {
        Some(value) if !value.is_empty() => {
            value.parse().map_err(|_| ConfigError::InvalidNumber {
                key: format!("{}{}", ENV_PREFIX, key),
                value,
            })
        }
        _ => Ok(default()),
    }
}
