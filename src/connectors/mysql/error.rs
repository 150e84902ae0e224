//! Error taxonomy for the MySQL connector.
//!
//! Validation errors (`MissingInput`, `MissingSslMaterial`, `MissingSshMaterial`,
//! `InvalidCombinator`, `UnsupportedOperator`, ...) are raised before any network
//! activity. Connection and query errors carry enough context to reproduce the
//! failure.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::statement::Statement;

/// Why a connection could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionErrorKind {
    /// Server rejected the user/password pair. Never retried.
    AuthenticationFailed,
    /// The requested schema does not exist. Never retried.
    DatabaseNotFound,
    /// I/O, protocol or timeout failure. Retried with backoff.
    NetworkError,
    /// TLS handshake, driver configuration or any other server refusal. Never retried.
    ConnectionRejected,
    /// SSH endpoint unreachable, authentication refused or forwarding failed.
    SshSetupError,
}

impl ConnectionErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, ConnectionErrorKind::NetworkError)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionErrorKind::AuthenticationFailed => "authentication_failed",
            ConnectionErrorKind::DatabaseNotFound => "database_not_found",
            ConnectionErrorKind::NetworkError => "network_error",
            ConnectionErrorKind::ConnectionRejected => "connection_rejected",
            ConnectionErrorKind::SshSetupError => "ssh_setup_error",
        }
    }
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure raised by the connection provider.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message} (after {attempts} attempt(s))")]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub attempts: u32,
}

impl ConnectionError {
    pub fn new<S: Into<String>>(kind: ConnectionErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
            attempts: 1,
        }
    }

    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::new(ConnectionErrorKind::NetworkError, message)
    }

    pub fn authentication<S: Into<String>>(message: S) -> Self {
        Self::new(ConnectionErrorKind::AuthenticationFailed, message)
    }

    pub fn database_not_found<S: Into<String>>(message: S) -> Self {
        Self::new(ConnectionErrorKind::DatabaseNotFound, message)
    }

    pub fn ssh<S: Into<String>>(message: S) -> Self {
        Self::new(ConnectionErrorKind::SshSetupError, message)
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Error reported by a [`Session`](super::connection::Session) while running a statement.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DriverError {
    /// Server error code (e.g. `1062`), when the server supplied one.
    pub code: Option<String>,
    pub message: String,
    /// Set when the server reported a duplicate-key / unique-constraint violation.
    pub unique_violation: bool,
}

impl DriverError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            code: None,
            message: message.into(),
            unique_violation: false,
        }
    }

    pub fn with_code<S: Into<String>>(mut self, code: S) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn unique_violation<S: Into<String>>(message: S) -> Self {
        Self {
            code: Some("1062".to_string()),
            message: message.into(),
            unique_violation: true,
        }
    }
}

/// A statement failed while the batch was executing.
#[derive(Debug, Clone, Serialize)]
pub struct QueryError {
    /// Index of the failing statement; `None` when a transaction control
    /// statement (START TRANSACTION or COMMIT) failed.
    pub index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    pub rolled_back: bool,
    pub statements: Vec<Statement>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "statement {} failed: {}", index, self.message)?,
            None => write!(f, "transaction failed: {}", self.message)?,
        }
        if self.rolled_back {
            write!(f, " (transaction rolled back)")?;
        }
        Ok(())
    }
}

impl std::error::Error for QueryError {}

#[derive(Debug, Error)]
pub enum MySqlError {
    #[error("missing required input: {field}")]
    MissingInput { field: String },
    #[error("SSL requires ca_cert_path, client_cert_path and client_key_path; missing {missing}")]
    MissingSslMaterial { missing: String },
    #[error("SSH tunnel is enabled but {missing} is missing")]
    MissingSshMaterial { missing: String },
    #[error("invalid value for {field}: {details}")]
    InvalidInput { field: String, details: String },
    #[error("failed to connect to MySQL: {0}")]
    Connection(#[from] ConnectionError),
    #[error("invalid combinator '{value}': expected 'and' or 'or'")]
    InvalidCombinator { value: String },
    #[error("unsupported operator '{value}'")]
    UnsupportedOperator { value: String },
    #[error("invalid identifier '{value}': {reason}")]
    InvalidIdentifier { value: String, reason: String },
    #[error("invalid statement: {details}")]
    InvalidStatement { details: String },
    #[error("unsupported operation '{operation}'")]
    UnsupportedOperation { operation: String },
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl MySqlError {
    pub fn missing<S: Into<String>>(field: S) -> Self {
        MySqlError::MissingInput {
            field: field.into(),
        }
    }

    pub fn invalid_statement<S: Into<String>>(details: S) -> Self {
        MySqlError::InvalidStatement {
            details: details.into(),
        }
    }

    /// True for errors detected before anything was sent to the server.
    pub fn is_validation(&self) -> bool {
        !matches!(self, MySqlError::Connection(_) | MySqlError::Query(_))
    }
}

pub type Result<T, E = MySqlError> = std::result::Result<T, E>;
