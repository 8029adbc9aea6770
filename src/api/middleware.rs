use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::DataServiceError;

/// Boundary wrapper that turns a gateway error into an HTTP response.
/// Every failure leaving the HTTP surface goes through here, so remote
/// callers see one uniform error shape.
#[derive(Debug)]
pub struct ApiError(pub DataServiceError);

impl From<DataServiceError> for ApiError {
    fn from(err: DataServiceError) -> Self {
        ApiError(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(DataServiceError::Boundary(err.to_string()))
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.0.to_string();
        let (status, code) = match self.0 {
            DataServiceError::UnresolvedService(_) => {
                (StatusCode::NOT_FOUND, "UNRESOLVED_SERVICE")
            }
            DataServiceError::MetadataUnavailable { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "METADATA_UNAVAILABLE")
            }
            DataServiceError::InvalidOptimizationConfig { .. } => {
                (StatusCode::BAD_REQUEST, "INVALID_OPTIMIZATION_CONFIG")
            }
            DataServiceError::OptimizationActivation { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "OPTIMIZATION_ACTIVATION_FAILED",
            ),
            DataServiceError::Boundary(_) => (StatusCode::INTERNAL_SERVER_ERROR, "BOUNDARY_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail::new(code, message),
        });

        (status, body).into_response()
    }
}
