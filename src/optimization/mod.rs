// Push-down optimization framework.
//
// Strategies offload filtering/limiting work into the pipeline or its
// sources. They are selected by id from a registry populated at
// configuration load, bound to a data service at registration time, and
// activated per query execution.

pub mod activation;
pub mod context;
pub mod impact;
pub mod limit_push_down;
pub mod parameter_push_down;

pub use activation::*;
pub use context::*;
pub use impact::*;
pub use limit_push_down::*;
pub use parameter_push_down::*;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::PipelineDefinition;
use crate::error::DataServiceError;
use crate::models::{DataService, OptimizationInstance};

/// Capability set of a push-down strategy: configure, activate, preview.
#[async_trait]
pub trait PushDownStrategy: Send + Sync {
    /// Registry key for this strategy.
    fn strategy_id(&self) -> &'static str;

    /// Bind an instance's configuration to a data service at registration
    /// time. Rejecting here fails the whole service registration.
    fn init(
        &self,
        pipeline: &PipelineDefinition,
        service: &DataService,
        instance: &OptimizationInstance,
    ) -> Result<(), DataServiceError>;

    /// Attempt to rewrite one in-flight execution so the pipeline does
    /// less work. Resolves `true` when applied, `false` when not
    /// applicable to this execution.
    ///
    /// Contract: any mutation of the execution context happens in a single
    /// atomic update after all fallible work has succeeded, so a task
    /// cancelled mid-activation leaves no partial state behind.
    async fn activate(
        &self,
        ctx: Arc<ExecutionContext>,
        instance: &OptimizationInstance,
    ) -> Result<bool, DataServiceError>;

    /// Estimate this optimization's effect on one execution without
    /// executing anything or mutating any state. Deterministic for fixed
    /// inputs.
    fn preview(
        &self,
        ctx: &ExecutionContext,
        instance: &OptimizationInstance,
    ) -> OptimizationImpactInfo;
}

/// Lookup table of push-down strategies by id.
///
/// Populated once at configuration load; concrete strategies are selected
/// here, never through runtime type inspection.
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn PushDownStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in strategies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ParameterPushDown));
        registry.register(Arc::new(LimitPushDown));
        registry
    }

    /// Register or replace a strategy. Returns `true` when an existing
    /// strategy with the same id was replaced.
    pub fn register(&mut self, strategy: Arc<dyn PushDownStrategy>) -> bool {
        self.strategies
            .insert(strategy.strategy_id().to_string(), strategy)
            .is_some()
    }

    pub fn get(&self, strategy_id: &str) -> Option<Arc<dyn PushDownStrategy>> {
        self.strategies.get(strategy_id).cloned()
    }

    pub fn strategy_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.strategies.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Run `init` for every optimization attached to a service. Any single
    /// failure fails the service registration as a whole.
    pub fn init_service(
        &self,
        pipeline: &PipelineDefinition,
        service: &DataService,
    ) -> Result<(), DataServiceError> {
        for instance in &service.optimizations {
            let strategy = self.get(&instance.strategy_id).ok_or_else(|| {
                DataServiceError::InvalidOptimizationConfig {
                    strategy: instance.strategy_id.clone(),
                    reason: "unknown strategy id".to_string(),
                }
            })?;
            strategy.init(pipeline, service, instance)?;
        }
        Ok(())
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
