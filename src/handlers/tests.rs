//! # Tests for Handlers
//!
//! Router-level tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
    response::Response,
};
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::connectors::{
    AuthType, Connector, ConnectorError, InvokeParams, ProviderMetadata, Registry,
};
use crate::handlers::{ServiceInfo, root};
use crate::server::{AppState, create_app};

const TOKEN: &str = "operator-token";

/// Connector that echoes its input, or fails when asked to.
struct EchoConnector;

#[async_trait]
impl Connector for EchoConnector {
    async fn invoke(&self, params: InvokeParams) -> Result<Value, ConnectorError> {
        match params.operation.as_str() {
            "echo" => Ok(json!({"status": "success", "parameters": params.parameters})),
            _ => Err(ConnectorError::NetworkError {
                details: "connection refused".to_string(),
                retryable: true,
            }),
        }
    }
}

fn test_state() -> AppState {
    let config = AppConfig {
        operator_tokens: vec![TOKEN.to_string()],
        ..Default::default()
    };
    let mut registry = Registry::from_config(&config);
    registry.register(
        Arc::new(EchoConnector),
        ProviderMetadata::new(
            "echo".to_string(),
            AuthType::ApiKey,
            vec!["echo".to_string(), "fail".to_string()],
        ),
    );
    AppState::new(config, registry)
}

fn invoke_request(name: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/connectors/{}/invoke", name))
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_root_handler_returns_service_info() {
    let axum::Json(service_info) = root().await;

    assert_eq!(service_info.service, "connectors");
    assert_eq!(service_info.version, env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_service_info_serializes() {
    let json_value = serde_json::to_value(ServiceInfo::default()).unwrap();
    assert!(json_value.get("service").is_some());
    assert!(json_value.get("version").is_some());
}

#[tokio::test]
async fn test_list_connectors_sorted() {
    let app = create_app(test_state());
    let response = app
        .oneshot(Request::builder().uri("/connectors").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let names: Vec<&str> = body["connectors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["echo", "mysql"]);
    assert_eq!(body["connectors"][1]["auth_type"], "basic");
}

#[tokio::test]
async fn test_invoke_requires_operator_token() {
    let app = create_app(test_state());
    let response = app
        .oneshot(invoke_request("echo", json!({"operation": "echo"}), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/problem+json"
    );
}

#[tokio::test]
async fn test_invoke_returns_connector_result() {
    let app = create_app(test_state());
    let response = app
        .oneshot(invoke_request(
            "echo",
            json!({"operation": "echo", "parameters": {"table": "users"}}),
            Some(TOKEN),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["parameters"]["table"], "users");
}

#[tokio::test]
async fn test_invoke_unknown_connector_returns_404() {
    let app = create_app(test_state());
    let response = app
        .oneshot(invoke_request(
            "postgres",
            json!({"operation": "select"}),
            Some(TOKEN),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["code"], "NOT_FOUND");
    assert!(body["trace_id"].is_string());
}

#[tokio::test]
async fn test_invoke_unsupported_operation_returns_400() {
    let app = create_app(test_state());
    let response = app
        .oneshot(invoke_request(
            "mysql",
            json!({"operation": "upsert"}),
            Some(TOKEN),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert_eq!(body["details"]["operation"]["supported"][0], "insert");
}

#[tokio::test]
async fn test_invoke_mysql_validation_error_returns_400() {
    let app = create_app(test_state());
    let response = app
        .oneshot(invoke_request(
            "mysql",
            json!({
                "operation": "insert",
                "credentials": {"host": "db", "port": 3306, "database": "shop", "user": "app", "password": "secret"},
                "parameters": {"table": "users; DROP TABLE users", "rows": [{"id": 1}]}
            }),
            Some(TOKEN),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_invoke_upstream_failure_returns_502() {
    let app = create_app(test_state());
    let response = app
        .oneshot(invoke_request("echo", json!({"operation": "fail"}), Some(TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["code"], "PROVIDER_ERROR");
    assert_eq!(body["details"]["connector"], "echo");
    assert_eq!(body["details"]["retryable"], true);
}

#[tokio::test]
async fn test_invoke_malformed_body_returns_400() {
    let app = create_app(test_state());
    let request = Request::builder()
        .method("POST")
        .uri("/connectors/echo/invoke")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", TOKEN))
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
