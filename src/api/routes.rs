use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::api::handlers::{query, services, AppState};
use crate::services::QueryExecutionFacade;

/// Create router with application state
pub fn create_router_with_state(facade: Arc<QueryExecutionFacade>) -> Router {
    let state = AppState { facade };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/query", post(query::prepare_query))
        .route("/api/query/preview", post(query::preview_optimizations))
        .route("/api/services", get(services::list_services))
        .route("/api/services/{name}", get(services::get_service))
        .route("/api/service-names", get(services::list_service_names))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
