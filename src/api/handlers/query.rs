use std::collections::HashMap;

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::api::handlers::AppState;
use crate::api::middleware::ApiError;
use crate::models::PreparedQueryHandle;
use crate::optimization::OptimizationImpactInfo;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
    /// Zero (the default) means unlimited.
    #[serde(default)]
    pub row_limit: u64,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

/// Prepare a query and hand back its serialized executable form.
pub async fn prepare_query(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<PreparedQueryHandle>, ApiError> {
    tracing::info!("Preparing query: {}", payload.sql);

    let handle = state
        .facade
        .query_with_parameters(&payload.sql, payload.row_limit, payload.parameters)
        .await?;

    Ok(Json(handle))
}

/// Preview the push-down optimizations a query would trigger, without
/// executing anything.
pub async fn preview_optimizations(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<Vec<OptimizationImpactInfo>>, ApiError> {
    let impacts = state
        .facade
        .optimization_preview(&payload.sql, payload.row_limit)
        .await?;

    Ok(Json(impacts))
}
