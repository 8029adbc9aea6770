use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::api::handlers::AppState;
use crate::api::middleware::ApiError;
use crate::models::ServiceInformation;

/// List the schema of every registered data service. Services that fail
/// introspection are logged and omitted.
pub async fn list_services(
    State(state): State<AppState>,
) -> Result<Json<Vec<ServiceInformation>>, ApiError> {
    Ok(Json(state.facade.service_information().await))
}

/// Schema of one named data service.
pub async fn get_service(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ServiceInformation>, ApiError> {
    let info = state.facade.service_information_for(&name).await?;
    Ok(Json(info))
}

/// Registered service names, optionally filtered by prefix.
pub async fn list_service_names(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<String>>, ApiError> {
    let names = match params.get("prefix") {
        Some(prefix) => state.facade.service_names_with_prefix(prefix),
        None => state.facade.service_names(),
    };
    Ok(Json(names))
}
