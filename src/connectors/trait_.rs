//! Connector trait definition
//!
//! Defines the uniform invoke contract every connector implements: an
//! operation name, the caller's credentials and the operation parameters go
//! in; a JSON result or a typed [`ConnectorError`] comes out.

use async_trait::async_trait;
use serde_json::Value;

/// Connector-specific error types for structured error handling
#[derive(Debug, Clone)]
pub enum ConnectorError {
    /// Caller input was rejected before reaching the provider
    InvalidInput {
        details: String,
        field: Option<String>,
    },
    /// The connector does not implement the requested operation
    UnsupportedOperation { operation: String },
    /// Network or connectivity error
    NetworkError { details: String, retryable: bool },
    /// Authentication/authorization error
    AuthenticationError {
        details: String,
        error_code: Option<String>,
    },
    /// The provider rejected a query or command
    QueryFailed { details: String, context: Value },
    /// Configuration or setup error
    ConfigurationError { details: String },
    /// Unknown error
    Unknown { details: String },
}

impl std::fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectorError::InvalidInput { details, .. } => {
                write!(f, "Invalid input: {}", details)
            }
            ConnectorError::UnsupportedOperation { operation } => {
                write!(f, "Unsupported operation: {}", operation)
            }
            ConnectorError::NetworkError { details, .. } => {
                write!(f, "Network error: {}", details)
            }
            ConnectorError::AuthenticationError { details, .. } => {
                write!(f, "Authentication error: {}", details)
            }
            ConnectorError::QueryFailed { details, .. } => {
                write!(f, "Query failed: {}", details)
            }
            ConnectorError::ConfigurationError { details } => {
                write!(f, "Configuration error: {}", details)
            }
            ConnectorError::Unknown { details } => {
                write!(f, "Unknown error: {}", details)
            }
        }
    }
}

impl std::error::Error for ConnectorError {}

/// Parameters for one invocation
#[derive(Debug, Clone)]
pub struct InvokeParams {
    pub operation: String,
    pub credentials: Value,
    pub parameters: Value,
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Run `params.operation` against the provider.
    async fn invoke(&self, params: InvokeParams) -> Result<Value, ConnectorError>;
}
