//! Connectors module
//!
//! This module provides the Connector SDK including:
//! - The `Connector` trait defining the uniform invoke contract
//! - Provider metadata and registry for discovery and lookup
//! - Individual connector implementations

pub mod metadata;
pub mod mysql;
pub mod registry;
pub mod trait_;

pub use metadata::{AuthType, ProviderMetadata};
pub use mysql::{MySqlConnector, register_mysql_connector};
pub use registry::{Registry, RegistryError};
pub use trait_::{Connector, ConnectorError, InvokeParams};
