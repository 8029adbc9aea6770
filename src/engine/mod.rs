// Pipeline execution collaborator contract.
//
// The gateway never executes pipelines itself; it resolves services,
// introspects schemas, and prepares queries against this narrow interface.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::FieldInfo;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Pipeline not found: {0}")]
    PipelineNotFound(String),

    #[error("Step {step} not found in pipeline {pipeline}")]
    StepNotFound { pipeline: String, step: String },

    #[error("Parameter activation failed for pipeline {pipeline}: {reason}")]
    ParameterActivation { pipeline: String, reason: String },

    #[error("Parameters not activated for pipeline {0}")]
    ParametersNotActivated(String),
}

/// A pipeline definition as seen by the gateway: declared parameters,
/// steps, and the row layout each step produces.
///
/// `Clone` on purpose: every schema introspection and every query
/// execution works on its own copy, so parameter state never leaks
/// between concurrent callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    /// Declared parameters and their default values.
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    pub steps: Vec<StepDefinition>,
    /// Parameter values in effect after activation. Runtime state, not
    /// part of the stored definition.
    #[serde(skip)]
    pub active_parameters: HashMap<String, String>,
    #[serde(skip)]
    pub activated: bool,
}

impl PipelineDefinition {
    pub fn step(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub name: String,
    /// Row layout this step produces.
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
    /// Whether the step consumes pipeline parameters (a push-down target).
    #[serde(default)]
    pub accepts_parameters: bool,
    /// Whether the step honors a pushed row limit.
    #[serde(default)]
    pub accepts_row_limit: bool,
    /// Row count estimate used by optimization previews, when known.
    #[serde(default)]
    pub estimated_rows: Option<u64>,
}

/// Outbound contract to the pipeline-execution collaborator.
#[async_trait]
pub trait PipelineEngine: Send + Sync {
    /// Look up a pipeline definition by name. Returns an isolated copy;
    /// mutations by the caller are never observed by other callers.
    async fn lookup_pipeline(&self, name: &str) -> Result<PipelineDefinition, EngineError>;

    /// Activate the pipeline's parameter bindings. Required before schema
    /// introspection because the computed schema can depend on
    /// parameter-driven branching.
    async fn activate_parameters(
        &self,
        pipeline: &mut PipelineDefinition,
    ) -> Result<(), EngineError>;

    /// Introspect the row layout produced at the named step.
    async fn output_schema(
        &self,
        pipeline: &PipelineDefinition,
        step: &str,
    ) -> Result<Vec<FieldInfo>, EngineError>;
}

/// In-memory engine over a fixed set of pipeline definitions, loaded from
/// the definitions file at startup.
pub struct StaticPipelineEngine {
    pipelines: HashMap<String, PipelineDefinition>,
}

impl StaticPipelineEngine {
    pub fn new() -> Self {
        Self {
            pipelines: HashMap::new(),
        }
    }

    pub fn from_definitions(pipelines: Vec<PipelineDefinition>) -> Self {
        Self {
            pipelines: pipelines.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: PipelineDefinition) -> Self {
        self.pipelines.insert(pipeline.name.clone(), pipeline);
        self
    }
}

impl Default for StaticPipelineEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineEngine for StaticPipelineEngine {
    async fn lookup_pipeline(&self, name: &str) -> Result<PipelineDefinition, EngineError> {
        self.pipelines
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::PipelineNotFound(name.to_string()))
    }

    async fn activate_parameters(
        &self,
        pipeline: &mut PipelineDefinition,
    ) -> Result<(), EngineError> {
        for name in pipeline.parameters.keys() {
            if name.trim().is_empty() {
                return Err(EngineError::ParameterActivation {
                    pipeline: pipeline.name.clone(),
                    reason: "empty parameter name".to_string(),
                });
            }
        }
        pipeline.active_parameters = pipeline.parameters.clone();
        pipeline.activated = true;
        Ok(())
    }

    async fn output_schema(
        &self,
        pipeline: &PipelineDefinition,
        step: &str,
    ) -> Result<Vec<FieldInfo>, EngineError> {
        if !pipeline.activated {
            return Err(EngineError::ParametersNotActivated(pipeline.name.clone()));
        }
        pipeline
            .step(step)
            .map(|s| s.fields.clone())
            .ok_or_else(|| EngineError::StepNotFound {
                pipeline: pipeline.name.clone(),
                step: step.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldType;

    pub(crate) fn orders_pipeline() -> PipelineDefinition {
        PipelineDefinition {
            name: "orders_pipeline".to_string(),
            parameters: HashMap::from([("REGION".to_string(), "ALL".to_string())]),
            steps: vec![StepDefinition {
                name: "OUT".to_string(),
                fields: vec![
                    FieldInfo::new("id", FieldType::Integer),
                    FieldInfo::new("total", FieldType::Decimal),
                ],
                accepts_parameters: false,
                accepts_row_limit: false,
                estimated_rows: Some(10_000),
            }],
            active_parameters: HashMap::new(),
            activated: false,
        }
    }

    #[tokio::test]
    async fn test_lookup_returns_isolated_copy() {
        let engine = StaticPipelineEngine::new().with_pipeline(orders_pipeline());

        let mut first = engine.lookup_pipeline("orders_pipeline").await.unwrap();
        first
            .active_parameters
            .insert("REGION".to_string(), "EMEA".to_string());

        let second = engine.lookup_pipeline("orders_pipeline").await.unwrap();
        assert!(second.active_parameters.is_empty());
    }

    #[tokio::test]
    async fn test_schema_requires_activation() {
        let engine = StaticPipelineEngine::new().with_pipeline(orders_pipeline());
        let mut pipeline = engine.lookup_pipeline("orders_pipeline").await.unwrap();

        let err = engine.output_schema(&pipeline, "OUT").await.unwrap_err();
        assert!(matches!(err, EngineError::ParametersNotActivated(_)));

        engine.activate_parameters(&mut pipeline).await.unwrap();
        let fields = engine.output_schema(&pipeline, "OUT").await.unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "id");
    }

    #[tokio::test]
    async fn test_unknown_pipeline_and_step() {
        let engine = StaticPipelineEngine::new().with_pipeline(orders_pipeline());

        assert!(matches!(
            engine.lookup_pipeline("missing").await.unwrap_err(),
            EngineError::PipelineNotFound(_)
        ));

        let mut pipeline = engine.lookup_pipeline("orders_pipeline").await.unwrap();
        engine.activate_parameters(&mut pipeline).await.unwrap();
        assert!(matches!(
            engine.output_schema(&pipeline, "MISSING").await.unwrap_err(),
            EngineError::StepNotFound { .. }
        ));
    }

    #[test]
    fn test_activation_copies_defaults() {
        tokio_test::block_on(async {
            let engine = StaticPipelineEngine::new().with_pipeline(orders_pipeline());
            let mut pipeline = engine.lookup_pipeline("orders_pipeline").await.unwrap();

            engine.activate_parameters(&mut pipeline).await.unwrap();
            assert_eq!(pipeline.active_parameters.get("REGION").unwrap(), "ALL");
        });
    }
}
