use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::engine::PipelineDefinition;
use crate::models::PreparedQuery;

/// Terminal and transient states of one optimization instance within one
/// query execution.
///
/// `Initialized -> Activating -> {Applied | NotApplicable | Failed}`.
/// Previews are legal from `Initialized` onward and never change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Initialized,
    Activating,
    Applied,
    NotApplicable,
    Failed,
}

/// Rewrites the activated optimizations have pushed into this execution.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PushDownState {
    /// Parameter values pushed to a step, keyed by step name.
    pub step_parameters: HashMap<String, HashMap<String, String>>,
    /// Row limits pushed to a step, keyed by step name.
    pub step_row_limits: HashMap<String, u64>,
}

/// Per-query-execution state optimizations and the execution engine
/// operate against. One context per execution, never shared across
/// executions; shared across the execution's concurrent activation tasks
/// via `Arc`.
pub struct ExecutionContext {
    query: PreparedQuery,
    pipeline: PipelineDefinition,
    state: Mutex<PushDownState>,
    activations: Mutex<HashMap<String, ActivationState>>,
    /// Times the engine has started the pipeline for this execution.
    /// Previews must never move this.
    starts: AtomicU64,
}

impl ExecutionContext {
    pub fn new(query: PreparedQuery, pipeline: PipelineDefinition) -> Self {
        let activations = query
            .service
            .optimizations
            .iter()
            .map(|o| (o.name.clone(), ActivationState::Initialized))
            .collect();
        Self {
            query,
            pipeline,
            state: Mutex::new(PushDownState::default()),
            activations: Mutex::new(activations),
            starts: AtomicU64::new(0),
        }
    }

    pub fn query(&self) -> &PreparedQuery {
        &self.query
    }

    pub fn pipeline(&self) -> &PipelineDefinition {
        &self.pipeline
    }

    /// Atomically merge parameter values into a step's pushed set.
    /// Strategies call this exactly once, after all their work succeeded,
    /// so a cancelled activation leaves nothing behind.
    pub fn push_parameters(&self, step: &str, values: HashMap<String, String>) {
        let mut state = self.state.lock().expect("push-down state lock poisoned");
        state
            .step_parameters
            .entry(step.to_string())
            .or_default()
            .extend(values);
    }

    pub fn push_row_limit(&self, step: &str, limit: u64) {
        let mut state = self.state.lock().expect("push-down state lock poisoned");
        state.step_row_limits.insert(step.to_string(), limit);
    }

    pub fn pushed_parameters(&self, step: &str) -> HashMap<String, String> {
        self.state
            .lock()
            .expect("push-down state lock poisoned")
            .step_parameters
            .get(step)
            .cloned()
            .unwrap_or_default()
    }

    pub fn pushed_row_limit(&self, step: &str) -> Option<u64> {
        self.state
            .lock()
            .expect("push-down state lock poisoned")
            .step_row_limits
            .get(step)
            .copied()
    }

    pub fn push_down_state(&self) -> PushDownState {
        self.state
            .lock()
            .expect("push-down state lock poisoned")
            .clone()
    }

    pub fn activation_state(&self, instance_name: &str) -> Option<ActivationState> {
        self.activations
            .lock()
            .expect("activation state lock poisoned")
            .get(instance_name)
            .copied()
    }

    pub fn set_activation_state(&self, instance_name: &str, state: ActivationState) {
        self.activations
            .lock()
            .expect("activation state lock poisoned")
            .insert(instance_name.to_string(), state);
    }

    /// Called by the execution engine when the pipeline actually starts.
    pub fn mark_started(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    pub fn start_count(&self) -> u64 {
        self.starts.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataService, OptimizationInstance};
    use std::sync::Arc;

    fn context_with_instance() -> ExecutionContext {
        let service = Arc::new(DataService {
            name: "orders".to_string(),
            pipeline: "orders_pipeline".to_string(),
            output_step: "OUT".to_string(),
            optimizations: vec![OptimizationInstance {
                name: "push-region".to_string(),
                strategy_id: "parameter-generation".to_string(),
                enabled: true,
                config: serde_json::Value::Null,
            }],
        });
        let query = PreparedQuery::new("SELECT * FROM orders", 10, HashMap::new(), service);
        let pipeline = PipelineDefinition {
            name: "orders_pipeline".to_string(),
            parameters: HashMap::new(),
            steps: vec![],
            active_parameters: HashMap::new(),
            activated: false,
        };
        ExecutionContext::new(query, pipeline)
    }

    #[test]
    fn test_instances_start_initialized() {
        let ctx = context_with_instance();
        assert_eq!(
            ctx.activation_state("push-region"),
            Some(ActivationState::Initialized)
        );
        assert_eq!(ctx.activation_state("unknown"), None);
    }

    #[test]
    fn test_pushed_parameters_merge() {
        let ctx = context_with_instance();
        ctx.push_parameters(
            "SRC",
            HashMap::from([("REGION".to_string(), "EMEA".to_string())]),
        );
        ctx.push_parameters(
            "SRC",
            HashMap::from([("PRIORITY".to_string(), "1".to_string())]),
        );

        let pushed = ctx.pushed_parameters("SRC");
        assert_eq!(pushed.len(), 2);
        assert_eq!(pushed.get("REGION").unwrap(), "EMEA");
    }

    #[test]
    fn test_row_limit_and_start_counter() {
        let ctx = context_with_instance();
        assert_eq!(ctx.pushed_row_limit("SRC"), None);
        ctx.push_row_limit("SRC", 10);
        assert_eq!(ctx.pushed_row_limit("SRC"), Some(10));

        assert_eq!(ctx.start_count(), 0);
        ctx.mark_started();
        assert_eq!(ctx.start_count(), 1);
    }
}
