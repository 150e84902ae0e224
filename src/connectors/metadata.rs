//! Provider metadata types
//!
//! Defines the metadata structure for connectors and their authentication types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Authentication type supported by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// OAuth 2.0 authorization code flow
    OAuth2,
    /// API key authentication
    ApiKey,
    /// Basic authentication (username/password)
    Basic,
    /// Bearer token authentication
    Bearer,
}

/// Metadata about a connector
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderMetadata {
    /// Unique identifier for the connector
    #[schema(example = "mysql")]
    pub name: String,
    /// Authentication method supported
    pub auth_type: AuthType,
    /// Operations accepted by `invoke`
    pub operations: Vec<String>,
}

impl ProviderMetadata {
    /// Create new provider metadata
    pub fn new(name: String, auth_type: AuthType, operations: Vec<String>) -> Self {
        Self {
            name,
            auth_type,
            operations,
        }
    }

    pub fn supports(&self, operation: &str) -> bool {
        self.operations.iter().any(|op| op == operation)
    }
}
