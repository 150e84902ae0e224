//! # Server Configuration
//!
//! This module contains the server setup and configuration for the Connectors API.

use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::auth_middleware;
use crate::config::AppConfig;
use crate::connectors::Registry;
use crate::handlers;
use crate::telemetry::{TraceContext, with_trace_context};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(config: AppConfig, registry: Registry) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
        }
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/connectors/{name}/invoke",
            post(handlers::connectors::invoke_connector),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/connectors", get(handlers::connectors::list_connectors))
        .merge(protected)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(trace_context_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Assign a trace id to every request and expose it to error envelopes.
async fn trace_context_middleware(mut request: Request, next: Next) -> Response {
    let context = TraceContext::generate();
    request.extensions_mut().insert(context.clone());
    with_trace_context(context, next.run(request)).await
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::from_config(&config);
    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;
    let profile = config.profile.clone();

    let app = create_app(AppState::new(config, registry));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::connectors::list_connectors,
        crate::handlers::connectors::invoke_connector,
    ),
    components(
        schemas(
            crate::handlers::ServiceInfo,
            crate::handlers::connectors::ConnectorsResponse,
            crate::handlers::connectors::InvokeRequest,
            crate::connectors::ProviderMetadata,
            crate::connectors::AuthType,
            crate::error::ApiError,
            crate::error::ConnectorFailure,
        )
    ),
    info(
        title = "Connectors API",
        description = "Invoke bundled connectors (MySQL) through a uniform operation contract",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
