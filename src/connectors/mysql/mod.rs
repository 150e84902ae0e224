//! MySQL connector.
//!
//! Builds parameterized SQL from structured operation parameters, opens one
//! connection per call (directly or through an SSH tunnel), executes the
//! statements under the requested batching mode and returns normalized rows
//! and optional execution metadata.
//!
//! ```text
//! credentials ─▶ config::resolve ─▶ SessionProvider::open ─┐
//! parameters  ─▶ StatementSpec::build ──────────────────────┴▶ engine::execute ─▶ ExecutionResult
//! ```

pub mod conditions;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod identifier;
pub mod normalize;
pub mod statement;
pub mod tunnel;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info_span, Instrument};

use crate::config::MySqlSettings;
use crate::connectors::{
    AuthType, Connector, ConnectorError, InvokeParams, ProviderMetadata, Registry,
};

pub use conditions::{Condition, ConditionGroup, build_condition_group};
pub use config::{ConnectionConfig, ConnectionOverrides};
pub use connection::{MySqlSessionProvider, Session, SessionProvider};
pub use engine::{ExecutionResult, execute};
pub use error::{ConnectionError, ConnectionErrorKind, MySqlError, QueryError};
pub use statement::{BatchingMode, Statement, StatementSpec};

pub const MYSQL_PROVIDER_SLUG: &str = "mysql";
pub const OPERATIONS: [&str; 5] = ["insert", "update", "delete", "select", "execute"];

pub struct MySqlConnector {
    settings: MySqlSettings,
    provider: Arc<dyn SessionProvider>,
}

impl MySqlConnector {
    pub fn new(settings: MySqlSettings) -> Self {
        Self::with_provider(settings, Arc::new(MySqlSessionProvider::new()))
    }

    /// Use a custom session provider (tests substitute an in-memory one).
    pub fn with_provider(settings: MySqlSettings, provider: Arc<dyn SessionProvider>) -> Self {
        Self { settings, provider }
    }

    /// Validate, connect, execute, close.
    ///
    /// All input is validated before a connection is attempted, and the session
    /// is closed whether or not execution succeeds.
    pub async fn run(
        &self,
        operation: &str,
        credentials: &Value,
        parameters: &Value,
    ) -> Result<ExecutionResult, MySqlError> {
        let overrides = ConnectionOverrides::from_parameters(parameters)?;
        let config = config::resolve(credentials, &overrides, &self.settings)?;

        let mut spec = StatementSpec::from_operation(operation, parameters.clone())?;
        if let StatementSpec::Select(select) = &mut spec
            && !select.return_all
            && select.limit.is_none()
        {
            select.limit = Some(self.settings.default_select_limit);
        }
        let statements = spec.build()?;
        debug!(
            operation = spec.operation(),
            statements = statements.len(),
            "statements built"
        );

        let mut session = self.provider.open(&config).await?;
        let result = engine::execute(session.as_mut(), &statements, spec.execution_options()).await;
        session.close().await;
        result
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn invoke(&self, params: InvokeParams) -> Result<Value, ConnectorError> {
        let span = info_span!("mysql_invoke", operation = %params.operation);
        let result = self
            .run(&params.operation, &params.credentials, &params.parameters)
            .instrument(span)
            .await?;
        serde_json::to_value(result).map_err(|e| ConnectorError::Unknown {
            details: format!("failed to serialize result: {}", e),
        })
    }
}

impl From<MySqlError> for ConnectorError {
    fn from(err: MySqlError) -> Self {
        match err {
            MySqlError::UnsupportedOperation { operation } => {
                ConnectorError::UnsupportedOperation { operation }
            }
            MySqlError::Connection(conn) => match conn.kind {
                ConnectionErrorKind::AuthenticationFailed => ConnectorError::AuthenticationError {
                    details: conn.to_string(),
                    error_code: Some(conn.kind.as_str().to_string()),
                },
                ConnectionErrorKind::DatabaseNotFound
                | ConnectionErrorKind::ConnectionRejected => ConnectorError::ConfigurationError {
                    details: conn.to_string(),
                },
                ConnectionErrorKind::NetworkError | ConnectionErrorKind::SshSetupError => {
                    ConnectorError::NetworkError {
                        details: conn.to_string(),
                        retryable: conn.kind.is_retryable(),
                    }
                }
            },
            MySqlError::Query(query) => {
                let details = query.to_string();
                let context = serde_json::to_value(&query).unwrap_or(Value::Null);
                ConnectorError::QueryFailed { details, context }
            }
            other => {
                let field = match &other {
                    MySqlError::MissingInput { field } | MySqlError::InvalidInput { field, .. } => {
                        Some(field.clone())
                    }
                    _ => None,
                };
                ConnectorError::InvalidInput {
                    details: other.to_string(),
                    field,
                }
            }
        }
    }
}

/// Register the MySQL connector with the registry.
pub fn register_mysql_connector(registry: &mut Registry, settings: &MySqlSettings) {
    let metadata = ProviderMetadata::new(
        MYSQL_PROVIDER_SLUG.to_string(),
        AuthType::Basic,
        OPERATIONS.iter().map(|op| op.to_string()).collect(),
    );
    registry.register(Arc::new(MySqlConnector::new(settings.clone())), metadata);
}
