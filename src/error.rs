use std::fmt::Display;
use std::sync::Mutex;

use thiserror::Error;

/// Error taxonomy for the data service gateway
#[derive(Debug, Error)]
pub enum DataServiceError {
    /// The SQL text or service name did not resolve to exactly one
    /// registered data service.
    #[error("Unable to resolve data service for query: {0}")]
    UnresolvedService(String),

    #[error("Unable to get fields for service {service}: {cause}")]
    MetadataUnavailable { service: String, cause: String },

    #[error("Invalid configuration for optimization strategy {strategy}: {reason}")]
    InvalidOptimizationConfig { strategy: String, reason: String },

    #[error("Optimization {strategy} failed during activation: {cause}")]
    OptimizationActivation { strategy: String, cause: String },

    /// Any other failure crossing the external boundary.
    #[error("Boundary error: {0}")]
    Boundary(String),
}

/// Convert anyhow::Error into the boundary error kind
impl From<anyhow::Error> for DataServiceError {
    fn from(err: anyhow::Error) -> Self {
        DataServiceError::Boundary(err.to_string())
    }
}

/// Sink for faults that are reported rather than propagated: a failed
/// candidate during catalog resolution, a service omitted from a bulk
/// listing, an optimization that failed to activate.
///
/// Supplied at construction time so a report can never occur before the
/// sink is configured. Fire-and-forget; implementations must not block.
pub trait ErrorSink: Send + Sync {
    fn report(&self, message: &str, cause: &dyn Display);
}

/// Default sink, logs through tracing
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, message: &str, cause: &dyn Display) {
        tracing::error!("{}: {}", message, cause);
    }
}

/// Test sink that records every report for later inspection.
pub struct CollectingSink {
    reports: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self {
            reports: Mutex::new(Vec::new()),
        }
    }

    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().expect("report lock poisoned").clone()
    }

    pub fn report_count(&self) -> usize {
        self.reports.lock().expect("report lock poisoned").len()
    }
}

impl Default for CollectingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorSink for CollectingSink {
    fn report(&self, message: &str, cause: &dyn Display) {
        self.reports
            .lock()
            .expect("report lock poisoned")
            .push(format!("{}: {}", message, cause));
    }
}
