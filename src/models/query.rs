use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DataServiceError;
use crate::models::DataService;

/// A bound, not-yet-executed query against a single resolved data service.
///
/// Construction requires the resolved service, so a prepared query is never
/// left unresolved. Consumed once by the execution engine, not reused.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub id: String,
    pub sql: String,
    /// Cap on rows the execution engine should return. Zero means
    /// unlimited, following the JDBC maxRows convention.
    pub row_limit: u64,
    pub parameters: HashMap<String, String>,
    pub service: Arc<DataService>,
    pub prepared_at: DateTime<Utc>,
}

impl PreparedQuery {
    pub fn new(
        sql: impl Into<String>,
        row_limit: u64,
        parameters: HashMap<String, String>,
        service: Arc<DataService>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sql: sql.into(),
            row_limit,
            parameters,
            service,
            prepared_at: Utc::now(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service.name
    }

    pub fn is_unlimited(&self) -> bool {
        self.row_limit == 0
    }

    /// Serializable wire form handed to a remote caller.
    pub fn to_handle(&self) -> PreparedQueryHandle {
        PreparedQueryHandle {
            id: self.id.clone(),
            sql: self.sql.clone(),
            row_limit: self.row_limit,
            parameters: self.parameters.clone(),
            service_name: self.service.name.clone(),
            pipeline: self.service.pipeline.clone(),
            output_step: self.service.output_step.clone(),
            prepared_at: self.prepared_at,
        }
    }
}

/// Opaque executable handle for a prepared query.
///
/// Carries everything a remote caller needs to hand the query to an
/// execution engine; the encoding is serde_json and callers should not
/// depend on its layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedQueryHandle {
    pub id: String,
    pub sql: String,
    pub row_limit: u64,
    pub parameters: HashMap<String, String>,
    pub service_name: String,
    pub pipeline: String,
    pub output_step: String,
    pub prepared_at: DateTime<Utc>,
}

impl PreparedQueryHandle {
    pub fn to_bytes(&self) -> Result<Vec<u8>, DataServiceError> {
        serde_json::to_vec(self)
            .map_err(|e| DataServiceError::Boundary(format!("Failed to serialize query: {}", e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DataServiceError> {
        serde_json::from_slice(bytes)
            .map_err(|e| DataServiceError::Boundary(format!("Failed to deserialize query: {}", e)))
    }
}
