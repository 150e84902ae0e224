//! Provider registry
//!
//! In-memory registry for storing and retrieving connectors and metadata.
//! Built once at startup and read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::connectors::{Connector, ProviderMetadata};

/// Error type for registry operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("Connector '{name}' not found")]
    ProviderNotFound { name: String },
}

/// Registry that stores connectors and their metadata
#[derive(Clone, Default)]
pub struct Registry {
    connectors: HashMap<String, Arc<dyn Connector>>,
    metadata: HashMap<String, ProviderMetadata>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry with every connector bundled in this crate.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::new();

        crate::connectors::mysql::register_mysql_connector(&mut registry, &config.mysql);

        info!(connectors = registry.len(), "connector registry initialized");
        registry
    }

    /// Register a new provider with its connector and metadata
    pub fn register(&mut self, connector: Arc<dyn Connector>, metadata: ProviderMetadata) {
        let name = metadata.name.clone();
        self.connectors.insert(name.clone(), connector);
        self.metadata.insert(name, metadata);
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Get a connector by provider name
    pub fn get(&self, name: &str) -> Result<Arc<dyn Connector>, RegistryError> {
        self.connectors
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::ProviderNotFound {
                name: name.to_string(),
            })
    }

    /// Get metadata for all providers, sorted by name for stable ordering
    pub fn list_metadata(&self) -> Vec<ProviderMetadata> {
        let mut metadata: Vec<_> = self.metadata.values().cloned().collect();
        metadata.sort_by(|a, b| a.name.cmp(&b.name));
        metadata
    }

    /// Get metadata for a specific provider
    pub fn get_metadata(&self, name: &str) -> Result<&ProviderMetadata, RegistryError> {
        self.metadata
            .get(name)
            .ok_or_else(|| RegistryError::ProviderNotFound {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::AuthType;
    use crate::connectors::trait_::{ConnectorError, InvokeParams};
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct EchoConnector;

    #[async_trait]
    impl Connector for EchoConnector {
        async fn invoke(&self, params: InvokeParams) -> Result<Value, ConnectorError> {
            Ok(json!({"operation": params.operation}))
        }
    }

    fn metadata(name: &str) -> ProviderMetadata {
        ProviderMetadata::new(name.to_string(), AuthType::Basic, vec!["echo".to_string()])
    }

    #[tokio::test]
    async fn test_registry_unknown_provider() {
        let registry = Registry::new();

        let result = registry.get("unknown");
        if let Err(RegistryError::ProviderNotFound { name }) = result {
            assert_eq!(name, "unknown");
        } else {
            panic!("Expected ProviderNotFound error");
        }

        assert!(registry.get_metadata("unknown").is_err());
    }

    #[tokio::test]
    async fn test_registry_known_provider() {
        let mut registry = Registry::new();
        registry.register(Arc::new(EchoConnector), metadata("echo"));

        let connector = registry.get("echo").unwrap();
        let result = connector
            .invoke(InvokeParams {
                operation: "echo".to_string(),
                credentials: json!({}),
                parameters: json!({}),
            })
            .await
            .unwrap();
        assert_eq!(result, json!({"operation": "echo"}));

        let metadata = registry.get_metadata("echo").unwrap();
        assert_eq!(metadata.auth_type, AuthType::Basic);
        assert!(metadata.supports("echo"));
    }

    #[tokio::test]
    async fn test_registry_list_ordering() {
        let mut registry = Registry::new();

        // Register providers in non-alphabetical order
        registry.register(Arc::new(EchoConnector), metadata("zebra"));
        registry.register(Arc::new(EchoConnector), metadata("apple"));
        registry.register(Arc::new(EchoConnector), metadata("banana"));

        let metadata = registry.list_metadata();
        assert_eq!(metadata.len(), 3);
        assert_eq!(metadata[0].name, "apple");
        assert_eq!(metadata[1].name, "banana");
        assert_eq!(metadata[2].name, "zebra");
    }

    #[test]
    fn test_registry_initialization() {
        let registry = Registry::from_config(&AppConfig::default());

        let metadata = registry.get_metadata("mysql").unwrap();
        assert_eq!(metadata.auth_type, AuthType::Basic);
        for op in ["insert", "update", "delete", "select", "execute"] {
            assert!(metadata.supports(op), "mysql should support {}", op);
        }
        assert!(registry.get("mysql").is_ok());
    }
}
