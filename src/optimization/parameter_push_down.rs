use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::engine::PipelineDefinition;
use crate::error::DataServiceError;
use crate::models::{DataService, OptimizationInstance};
use crate::optimization::{ExecutionContext, OptimizationImpactInfo, PushDownStrategy};
use crate::validation::SqlReferences;

pub const PARAMETER_GENERATION: &str = "parameter-generation";

/// Configuration for parameter push-down: which step receives the values
/// and how SQL columns map onto pipeline parameter names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterPushDownConfig {
    pub target_step: String,
    /// SQL column name -> pipeline parameter name.
    pub parameter_map: HashMap<String, String>,
}

/// Turns simple equality predicates of the query's WHERE clause into
/// parameter values on a source step, so the source filters rows before
/// they ever enter the pipeline.
pub struct ParameterPushDown;

impl ParameterPushDown {
    fn parse_config(
        instance: &OptimizationInstance,
    ) -> Result<ParameterPushDownConfig, DataServiceError> {
        serde_json::from_value(instance.config.clone()).map_err(|e| {
            DataServiceError::InvalidOptimizationConfig {
                strategy: PARAMETER_GENERATION.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Parameter values this execution's SQL would push, sorted by
    /// parameter name so activation and preview agree on ordering.
    fn generated_parameters(
        config: &ParameterPushDownConfig,
        sql: &str,
    ) -> Vec<(String, String)> {
        let mut values: Vec<(String, String)> = SqlReferences::equality_predicates(sql)
            .into_iter()
            .filter_map(|(column, literal)| {
                config
                    .parameter_map
                    .get(&column)
                    .map(|parameter| (parameter.clone(), literal))
            })
            .collect();
        values.sort();
        values.dedup();
        values
    }
}

#[async_trait]
impl PushDownStrategy for ParameterPushDown {
    fn strategy_id(&self) -> &'static str {
        PARAMETER_GENERATION
    }

    fn init(
        &self,
        pipeline: &PipelineDefinition,
        _service: &DataService,
        instance: &OptimizationInstance,
    ) -> Result<(), DataServiceError> {
        let config = Self::parse_config(instance)?;

        if config.parameter_map.is_empty() {
            return Err(DataServiceError::InvalidOptimizationConfig {
                strategy: PARAMETER_GENERATION.to_string(),
                reason: "parameter_map must not be empty".to_string(),
            });
        }

        let step = pipeline.step(&config.target_step).ok_or_else(|| {
            DataServiceError::InvalidOptimizationConfig {
                strategy: PARAMETER_GENERATION.to_string(),
                reason: format!(
                    "target step {} not present in pipeline {}",
                    config.target_step, pipeline.name
                ),
            }
        })?;

        if !step.accepts_parameters {
            return Err(DataServiceError::InvalidOptimizationConfig {
                strategy: PARAMETER_GENERATION.to_string(),
                reason: format!("step {} does not accept parameters", config.target_step),
            });
        }

        for parameter in config.parameter_map.values() {
            if !pipeline.parameters.contains_key(parameter) {
                return Err(DataServiceError::InvalidOptimizationConfig {
                    strategy: PARAMETER_GENERATION.to_string(),
                    reason: format!(
                        "parameter {} not declared by pipeline {}",
                        parameter, pipeline.name
                    ),
                });
            }
        }

        Ok(())
    }

    async fn activate(
        &self,
        ctx: Arc<ExecutionContext>,
        instance: &OptimizationInstance,
    ) -> Result<bool, DataServiceError> {
        let config = Self::parse_config(instance)?;
        let values = Self::generated_parameters(&config, &ctx.query().sql);

        if values.is_empty() {
            return Ok(false);
        }

        // Single atomic apply; everything above is side-effect free.
        ctx.push_parameters(&config.target_step, values.into_iter().collect());
        Ok(true)
    }

    fn preview(
        &self,
        ctx: &ExecutionContext,
        instance: &OptimizationInstance,
    ) -> OptimizationImpactInfo {
        let config = match Self::parse_config(instance) {
            Ok(config) => config,
            Err(e) => {
                return OptimizationImpactInfo::not_applicable(
                    PARAMETER_GENERATION,
                    "",
                    format!("Invalid configuration: {}", e),
                )
            }
        };

        let values = Self::generated_parameters(&config, &ctx.query().sql);
        if values.is_empty() {
            return OptimizationImpactInfo::not_applicable(
                PARAMETER_GENERATION,
                config.target_step,
                "No mapped equality predicates in this query; source would run unfiltered",
            );
        }

        let assignments: Vec<String> = values
            .iter()
            .map(|(parameter, value)| format!("{}={}", parameter, value))
            .collect();

        // Coarse estimate: each pushed predicate is assumed to halve the
        // rows the source produces.
        let estimated_rows_saved = ctx
            .pipeline()
            .step(&config.target_step)
            .and_then(|s| s.estimated_rows)
            .map(|rows| rows - (rows >> values.len().min(63) as u32));

        OptimizationImpactInfo {
            strategy_id: PARAMETER_GENERATION.to_string(),
            target_step: config.target_step,
            description: format!(
                "Pushes {} predicate(s) into the source as parameters: {}",
                values.len(),
                assignments.join(", ")
            ),
            estimated_rows_saved,
            applicable: true,
        }
    }
}
