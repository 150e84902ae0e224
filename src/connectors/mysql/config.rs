//! Credential resolution.
//!
//! Merges the caller's credentials JSON with per-call overrides and the service
//! defaults into a [`ConnectionConfig`]. Every check here runs before any
//! network activity.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::{MySqlError, Result};
use crate::config::MySqlSettings;

/// Secret string wiped from memory on drop and hidden from `Debug`.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Client TLS material; only honored when all three paths are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub ca_cert_path: PathBuf,
    pub client_cert_path: PathBuf,
    pub client_key_path: PathBuf,
}

#[derive(Debug, Clone)]
pub enum SshAuth {
    Password(Secret),
    PrivateKey {
        key: Secret,
        passphrase: Option<Secret>,
    },
}

impl SshAuth {
    pub fn method(&self) -> &'static str {
        match self {
            SshAuth::Password(_) => "password",
            SshAuth::PrivateKey { .. } => "private_key",
        }
    }
}

/// SSH routing record. The tunnel forwards to `(ConnectionConfig::host, mysql_port)`
/// as seen from the SSH server.
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub auth: SshAuth,
    pub mysql_port: u16,
    pub timeout: Duration,
}

/// Bounded retry for the connect step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, doubling from the base delay.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl From<&MySqlSettings> for RetryPolicy {
    fn from(settings: &MySqlSettings) -> Self {
        Self {
            max_attempts: settings.connect_max_attempts.max(1),
            base_delay: Duration::from_millis(settings.connect_base_delay_ms),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Secret,
    pub connect_timeout: Duration,
    /// Logged only; one call never opens more than one connection.
    pub pool_size_hint: Option<u32>,
    pub tls: Option<TlsConfig>,
    pub ssh: Option<SshConfig>,
    pub retry: RetryPolicy,
}

/// Per-call connection overrides read from the invocation parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectionOverrides {
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    #[serde(default, alias = "pool_size")]
    pub pool_size_hint: Option<u32>,
}

impl ConnectionOverrides {
    /// Read overrides from the `options` object of the parameters, if any.
    pub fn from_parameters(parameters: &Value) -> Result<Self> {
        match parameters.get("options") {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(options) => {
                serde_json::from_value(options.clone()).map_err(|e| MySqlError::InvalidInput {
                    field: "options".to_string(),
                    details: e.to_string(),
                })
            }
        }
    }
}

fn string_field(credentials: &Value, key: &str) -> Result<Option<String>> {
    match credentials.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(MySqlError::InvalidInput {
            field: key.to_string(),
            details: format!("expected a string, got {}", other),
        }),
    }
}

/// Non-empty trimmed string, or `None`.
fn present(credentials: &Value, key: &str) -> Result<Option<String>> {
    Ok(string_field(credentials, key)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

fn port_field(credentials: &Value, key: &str) -> Result<Option<u16>> {
    let invalid = |details: String| MySqlError::InvalidInput {
        field: key.to_string(),
        details,
    };
    match credentials.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
            .filter(|p| *p > 0)
            .map(Some)
            .ok_or_else(|| invalid(format!("{} is not a valid port", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|p| *p > 0)
            .map(Some)
            .ok_or_else(|| invalid(format!("'{}' is not a valid port", s))),
        Some(other) => Err(invalid(format!("expected a port number, got {}", other))),
    }
}

fn bool_field(credentials: &Value, key: &str) -> Result<bool> {
    match credentials.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            _ => Err(MySqlError::InvalidInput {
                field: key.to_string(),
                details: format!("'{}' is not a boolean", s),
            }),
        },
        Some(other) => Err(MySqlError::InvalidInput {
            field: key.to_string(),
            details: format!("expected a boolean, got {}", other),
        }),
    }
}

fn resolve_tls(credentials: &Value) -> Result<Option<TlsConfig>> {
    if !bool_field(credentials, "ssl")? {
        return Ok(None);
    }

    let ca = present(credentials, "ca_cert_path")?;
    let cert = present(credentials, "client_cert_path")?;
    let key = present(credentials, "client_key_path")?;

    let missing: Vec<&str> = [
        ("ca_cert_path", ca.is_none()),
        ("client_cert_path", cert.is_none()),
        ("client_key_path", key.is_none()),
    ]
    .iter()
    .filter(|(_, absent)| *absent)
    .map(|(name, _)| *name)
    .collect();

    match (ca, cert, key) {
        (Some(ca), Some(cert), Some(key)) => Ok(Some(TlsConfig {
            ca_cert_path: PathBuf::from(ca),
            client_cert_path: PathBuf::from(cert),
            client_key_path: PathBuf::from(key),
        })),
        _ => Err(MySqlError::MissingSslMaterial {
            missing: missing.join(", "),
        }),
    }
}

fn resolve_ssh(credentials: &Value, timeout: Duration) -> Result<Option<SshConfig>> {
    if !bool_field(credentials, "ssh_tunnel")? {
        return Ok(None);
    }

    let missing = |name: &str| MySqlError::MissingSshMaterial {
        missing: name.to_string(),
    };

    let host = present(credentials, "ssh_host")?.ok_or_else(|| missing("ssh_host"))?;
    let port = port_field(credentials, "ssh_port")?.ok_or_else(|| missing("ssh_port"))?;
    let mysql_port =
        port_field(credentials, "ssh_mysql_port")?.ok_or_else(|| missing("ssh_mysql_port"))?;
    let user = present(credentials, "ssh_user")?.ok_or_else(|| missing("ssh_user"))?;
    let method =
        present(credentials, "ssh_auth_method")?.ok_or_else(|| missing("ssh_auth_method"))?;

    let auth = match method.to_ascii_lowercase().replace('-', "_").as_str() {
        "password" => {
            let password = string_field(credentials, "ssh_password")?
                .filter(|s| !s.is_empty())
                .ok_or_else(|| missing("ssh_password"))?;
            SshAuth::Password(Secret::new(password))
        }
        "private_key" | "privatekey" => {
            let key = string_field(credentials, "ssh_private_key")?
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| missing("ssh_private_key"))?;
            let passphrase = string_field(credentials, "ssh_passphrase")?
                .filter(|s| !s.is_empty())
                .map(Secret::new);
            SshAuth::PrivateKey {
                key: Secret::new(key),
                passphrase,
            }
        }
        _ => {
            return Err(MySqlError::InvalidInput {
                field: "ssh_auth_method".to_string(),
                details: format!("expected 'password' or 'private_key', got '{}'", method),
            });
        }
    };

    Ok(Some(SshConfig {
        host,
        port,
        user,
        auth,
        mysql_port,
        timeout,
    }))
}

/// Build a validated [`ConnectionConfig`].
///
/// Checks run in a fixed order: required fields, TLS material, SSH material.
pub fn resolve(
    credentials: &Value,
    overrides: &ConnectionOverrides,
    defaults: &MySqlSettings,
) -> Result<ConnectionConfig> {
    if !credentials.is_object() {
        return Err(MySqlError::InvalidInput {
            field: "credentials".to_string(),
            details: "expected a JSON object".to_string(),
        });
    }

    let host = present(credentials, "host")?.ok_or_else(|| MySqlError::missing("host"))?;
    let database =
        present(credentials, "database")?.ok_or_else(|| MySqlError::missing("database"))?;
    let user = present(credentials, "user")?.ok_or_else(|| MySqlError::missing("user"))?;
    // An empty password is a valid MySQL credential; only absence is rejected.
    let password =
        string_field(credentials, "password")?.ok_or_else(|| MySqlError::missing("password"))?;
    let port = port_field(credentials, "port")?.ok_or_else(|| MySqlError::missing("port"))?;

    let tls = resolve_tls(credentials)?;
    let ssh = resolve_ssh(credentials, Duration::from_millis(defaults.ssh_timeout_ms))?;

    let connect_timeout_ms = match overrides.connect_timeout_ms {
        Some(0) => {
            return Err(MySqlError::InvalidInput {
                field: "connect_timeout_ms".to_string(),
                details: "must be positive".to_string(),
            });
        }
        Some(ms) => ms,
        None => defaults.connect_timeout_ms,
    };

    Ok(ConnectionConfig {
        host,
        port,
        database,
        user,
        password: Secret::new(password),
        connect_timeout: Duration::from_millis(connect_timeout_ms),
        pool_size_hint: overrides.pool_size_hint,
        tls,
        ssh,
        retry: RetryPolicy::from(defaults),
    })
}
