use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::engine::PipelineDefinition;
use crate::error::DataServiceError;
use crate::models::{DataService, OptimizationInstance};
use crate::optimization::{ExecutionContext, OptimizationImpactInfo, PushDownStrategy};

pub const SOURCE_LIMIT: &str = "source-limit";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitPushDownConfig {
    pub target_step: String,
}

/// Pushes the query's row bound into a source step so the source stops
/// producing rows once the bound is reached.
pub struct LimitPushDown;

impl LimitPushDown {
    fn parse_config(
        instance: &OptimizationInstance,
    ) -> Result<LimitPushDownConfig, DataServiceError> {
        serde_json::from_value(instance.config.clone()).map_err(|e| {
            DataServiceError::InvalidOptimizationConfig {
                strategy: SOURCE_LIMIT.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

#[async_trait]
impl PushDownStrategy for LimitPushDown {
    fn strategy_id(&self) -> &'static str {
        SOURCE_LIMIT
    }

    fn init(
        &self,
        pipeline: &PipelineDefinition,
        _service: &DataService,
        instance: &OptimizationInstance,
    ) -> Result<(), DataServiceError> {
        let config = Self::parse_config(instance)?;

        let step = pipeline.step(&config.target_step).ok_or_else(|| {
            DataServiceError::InvalidOptimizationConfig {
                strategy: SOURCE_LIMIT.to_string(),
                reason: format!(
                    "target step {} not present in pipeline {}",
                    config.target_step, pipeline.name
                ),
            }
        })?;

        if !step.accepts_row_limit {
            return Err(DataServiceError::InvalidOptimizationConfig {
                strategy: SOURCE_LIMIT.to_string(),
                reason: format!("step {} does not accept a row limit", config.target_step),
            });
        }

        Ok(())
    }

    async fn activate(
        &self,
        ctx: Arc<ExecutionContext>,
        instance: &OptimizationInstance,
    ) -> Result<bool, DataServiceError> {
        let config = Self::parse_config(instance)?;
        let limit = ctx.query().row_limit;

        // Zero means unlimited; there is nothing to push.
        if limit == 0 {
            return Ok(false);
        }

        ctx.push_row_limit(&config.target_step, limit);
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
                    SOURCE_LIMIT,
                    "",
                    format!("Invalid configuration: {}", e),
                )
            }
        };

        let limit = ctx.query().row_limit;
        if limit == 0 {
            return OptimizationImpactInfo::not_applicable(
                SOURCE_LIMIT,
                config.target_step,
                "Query is unbounded; no limit to push",
            );
        }

        let estimated_rows_saved = ctx
            .pipeline()
            .step(&config.target_step)
            .and_then(|s| s.estimated_rows)
            .map(|rows| rows.saturating_sub(limit));

        OptimizationImpactInfo {
            strategy_id: SOURCE_LIMIT.to_string(),
            target_step: config.target_step.clone(),
            description: format!(
                "Stops step {} after {} row(s) instead of draining the source",
                config.target_step, limit
            ),
            estimated_rows_saved,
            applicable: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::StepDefinition;
    use crate::models::PreparedQuery;
    use std::collections::HashMap;

    fn pipeline() -> PipelineDefinition {
        PipelineDefinition {
            name: "orders_pipeline".to_string(),
            parameters: HashMap::new(),
            steps: vec![StepDefinition {
                name: "SRC".to_string(),
                fields: vec![],
                accepts_parameters: false,
                accepts_row_limit: true,
                estimated_rows: Some(10_000),
            }],
            active_parameters: HashMap::new(),
            activated: false,
        }
    }

    fn instance() -> OptimizationInstance {
        OptimizationInstance {
            name: "limit-src".to_string(),
            strategy_id: SOURCE_LIMIT.to_string(),
            enabled: true,
            config: serde_json::json!({"target_step": "SRC"}),
        }
    }

    fn context(row_limit: u64) -> ExecutionContext {
        let service = Arc::new(DataService {
            name: "orders".to_string(),
            pipeline: "orders_pipeline".to_string(),
            output_step: "OUT".to_string(),
            optimizations: vec![instance()],
        });
        let query = PreparedQuery::new("SELECT * FROM orders", row_limit, HashMap::new(), service);
        ExecutionContext::new(query, pipeline())
    }

    #[test]
    fn test_init_requires_limit_capable_step() {
        let strategy = LimitPushDown;
        let inst = OptimizationInstance {
            config: serde_json::json!({"target_step": "MISSING"}),
            ..instance()
        };
        let service = DataService {
            name: "orders".to_string(),
            pipeline: "orders_pipeline".to_string(),
            output_step: "OUT".to_string(),
            optimizations: vec![],
        };
        assert!(strategy.init(&pipeline(), &service, &inst).is_err());
        assert!(strategy.init(&pipeline(), &service, &instance()).is_ok());
    }

    #[tokio::test]
    async fn test_activate_pushes_bound() {
        let strategy = LimitPushDown;
        let ctx = Arc::new(context(25));

        let applied = strategy.activate(ctx.clone(), &instance()).await.unwrap();
        assert!(applied);
        assert_eq!(ctx.pushed_row_limit("SRC"), Some(25));
    }

    #[tokio::test]
    async fn test_unbounded_query_is_not_applicable() {
        let strategy = LimitPushDown;
        let ctx = Arc::new(context(0));

        let applied = strategy.activate(ctx.clone(), &instance()).await.unwrap();
        assert!(!applied);
        assert_eq!(ctx.pushed_row_limit("SRC"), None);
    }

    #[test]
    fn test_preview_estimates_saved_rows() {
        let strategy = LimitPushDown;
        let ctx = context(100);

        let first = strategy.preview(&ctx, &instance());
        let second = strategy.preview(&ctx, &instance());
        assert_eq!(first, second);
        assert!(first.applicable);
        assert_eq!(first.estimated_rows_saved, Some(9_900));
        assert_eq!(ctx.pushed_row_limit("SRC"), None);
    }
}
