//! # Connectors API Handlers
//!
//! Listing of registered connectors and the operator-only invoke endpoint.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{Instrument, info, info_span};
use utoipa::ToSchema;

use crate::auth::OperatorAuth;
use crate::connectors::{InvokeParams, ProviderMetadata};
use crate::error::{ApiError, connector_error, validation_error};
use crate::server::AppState;

/// Response containing the registered connectors
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConnectorsResponse {
    /// Registered connectors, sorted by name
    pub connectors: Vec<ProviderMetadata>,
}

/// Body of an invoke request
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct InvokeRequest {
    /// Operation name (e.g., "insert", "select")
    #[schema(example = "select")]
    pub operation: String,
    /// Connection credentials for the target system
    #[serde(default)]
    pub credentials: Value,
    /// Operation parameters
    #[serde(default)]
    pub parameters: Value,
}

/// List registered connectors
#[utoipa::path(
    get,
    path = "/connectors",
    responses(
        (status = 200, description = "Registered connectors", body = ConnectorsResponse)
    ),
    tag = "connectors"
)]
pub async fn list_connectors(State(state): State<AppState>) -> Json<ConnectorsResponse> {
    Json(ConnectorsResponse {
        connectors: state.registry.list_metadata(),
    })
}

/// Invoke an operation on a registered connector
#[utoipa::path(
    post,
    path = "/connectors/{name}/invoke",
    params(
        ("name" = String, Path, description = "Connector name", example = "mysql")
    ),
    request_body = InvokeRequest,
    responses(
        (status = 200, description = "Connector result", body = serde_json::Value, example = json!({
            "status": "success",
            "result_sets": [{"statement_index": 0, "rows": [{"id": 1, "name": "Ada"}]}]
        })),
        (status = 400, description = "Invalid operation or parameters", body = ApiError),
        (status = 401, description = "Missing or invalid operator token", body = ApiError),
        (status = 404, description = "Unknown connector", body = ApiError),
        (status = 502, description = "Connector failed upstream", body = ApiError)
    ),
    tag = "connectors"
)]
pub async fn invoke_connector(
    State(state): State<AppState>,
    _auth: OperatorAuth,
    Path(name): Path<String>,
    payload: Result<Json<InvokeRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;

    let metadata = state.registry.get_metadata(&name)?;
    if !metadata.supports(&request.operation) {
        return Err(validation_error(
            &format!("Unsupported operation: {}", request.operation),
            json!({ "operation": { "supported": metadata.operations } }),
        ));
    }
    let connector = state.registry.get(&name)?;

    let span = info_span!("invoke_connector", connector = %name, operation = %request.operation);
    let operation = request.operation.clone();
    let result = connector
        .invoke(InvokeParams {
            operation: request.operation,
            credentials: request.credentials,
            parameters: request.parameters,
        })
        .instrument(span)
        .await
        .map_err(|err| connector_error(&name, err))?;

    info!(connector = %name, %operation, "Connector invocation succeeded");
    Ok(Json(result))
}
