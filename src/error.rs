//! # Error Handling
//!
//! This module provides unified error handling for the Connectors API,
//! implementing a consistent problem+json response format with trace ID propagation.

use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::connectors::{ConnectorError, RegistryError};
use crate::telemetry;

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<S: Into<String>>(status: StatusCode, code: S, message: S) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            trace_id: Self::current_trace_id(),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }

    /// Extract current trace ID from the active tracing span (falls back to generated correlation ID)
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                // Fallback: generate a correlation ID for basic client-server log correlation
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

/// Upstream connector failure information attached to 502 responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectorFailure {
    /// Connector name (e.g., "mysql")
    pub connector: String,
    /// Failure class reported by the connector
    pub kind: String,
    /// Whether retrying the same call may succeed
    pub retryable: bool,
    /// Connector-specific context (failing statement, statement list, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = match rejection {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON: {}", err),
            JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err),
            JsonRejection::MissingJsonContentType(_) => {
                "Missing 'Content-Type: application/json' header".to_string()
            }
            _ => "Invalid request body".to_string(),
        };

        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", &message)
    }
}

/// Map a connector failure to an HTTP error.
///
/// Input problems are the caller's fault (400); everything the database or
/// network reported is an upstream failure (502 `PROVIDER_ERROR`).
pub fn connector_error(connector: &str, error: ConnectorError) -> ApiError {
    let (kind, retryable, context) = match &error {
        ConnectorError::InvalidInput { details, field } => {
            let mut field_errors = serde_json::Map::new();
            field_errors.insert(
                field.clone().unwrap_or_else(|| "parameters".to_string()),
                json!(details),
            );
            return validation_error(&error.to_string(), field_errors.into());
        }
        ConnectorError::UnsupportedOperation { operation } => {
            return validation_error(
                &error.to_string(),
                json!({ "operation": format!("'{}' is not supported by {}", operation, connector) }),
            );
        }
        ConnectorError::NetworkError { retryable, .. } => ("network_error", *retryable, None),
        ConnectorError::AuthenticationError { .. } => ("authentication_failed", false, None),
        ConnectorError::QueryFailed { context, .. } => {
            ("query_failed", false, Some(context.clone()))
        }
        ConnectorError::ConfigurationError { .. } => ("configuration_error", false, None),
        ConnectorError::Unknown { .. } => ("unknown", false, None),
    };

    tracing::warn!(connector, kind, retryable, error = %error, "Connector call failed");

    let failure = ConnectorFailure {
        connector: connector.to_string(),
        kind: kind.to_string(),
        retryable,
        context,
    };

    ApiError::new(
        StatusCode::BAD_GATEWAY,
        "PROVIDER_ERROR",
        &format!("Connector {} failed: {}", connector, error),
    )
    .with_details(json!(failure))
}

impl From<RegistryError> for ApiError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::ProviderNotFound { name } => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                &format!("Connector '{}' not found", name),
            ),
        }
    }
}

/// Create an unauthorized error (401)
pub fn unauthorized(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Authentication required");
    ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
}

/// Create an unauthorized error (401) with explicit trace_id
pub fn unauthorized_with_trace_id(message: Option<&str>, trace_id: String) -> ApiError {
    let msg = message.unwrap_or("Authentication required");
    let mut error = ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg);
    error.trace_id = Some(trace_id.into_boxed_str());
    error
}

/// Create a validation error with field details
pub fn validation_error(message: &str, field_errors: serde_json::Value) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message).with_details(field_errors)
}
