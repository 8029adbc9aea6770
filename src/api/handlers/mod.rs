pub mod query;
pub mod services;

use std::sync::Arc;

use crate::services::QueryExecutionFacade;

/// Shared application state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub facade: Arc<QueryExecutionFacade>,
}
