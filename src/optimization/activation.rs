use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{DataServiceError, ErrorSink};
use crate::models::OptimizationInstance;
use crate::optimization::{ActivationState, ExecutionContext, PushDownStrategy, StrategyRegistry};

/// How one activation ended.
#[derive(Debug)]
pub enum Resolution {
    Applied,
    NotApplicable,
    /// The per-activation timeout elapsed; the task was cancelled and the
    /// execution proceeds as if the strategy had resolved `false`.
    TimedOut,
    Failed(DataServiceError),
}

#[derive(Debug)]
pub struct ResolvedActivation {
    pub instance_name: String,
    pub strategy_id: String,
    pub resolution: Resolution,
}

/// Cancellable, non-blocking handle over one in-flight activation.
///
/// Spawning never blocks the caller; the strategy runs on its own task.
/// Cancelling before resolution makes the activation resolve `false` with
/// no partial side effects, because strategies apply context mutations in
/// a single atomic update at the end of their work.
pub struct ActivationHandle {
    instance_name: String,
    strategy_id: String,
    cancel: CancellationToken,
    join: JoinHandle<Result<bool, DataServiceError>>,
}

impl ActivationHandle {
    pub fn spawn(
        strategy: Arc<dyn PushDownStrategy>,
        ctx: Arc<ExecutionContext>,
        instance: OptimizationInstance,
    ) -> Self {
        ctx.set_activation_state(&instance.name, ActivationState::Activating);

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let instance_name = instance.name.clone();
        let strategy_id = instance.strategy_id.clone();

        let join = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => Ok(false),
                result = strategy.activate(ctx, &instance) => result,
            }
        });

        Self {
            instance_name,
            strategy_id,
            cancel,
            join,
        }
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Request cancellation. Safe to call at any time; a no-op once the
    /// activation has resolved.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Join the activation, waiting at most `timeout`. An expired timeout
    /// cancels the task and degrades to `TimedOut`.
    pub async fn resolve(mut self, timeout: Duration) -> ResolvedActivation {
        let resolution = match tokio::time::timeout(timeout, &mut self.join).await {
            Ok(Ok(Ok(true))) => Resolution::Applied,
            Ok(Ok(Ok(false))) => Resolution::NotApplicable,
            Ok(Ok(Err(e))) => Resolution::Failed(e),
            Ok(Err(join_err)) => Resolution::Failed(DataServiceError::OptimizationActivation {
                strategy: self.strategy_id.clone(),
                cause: join_err.to_string(),
            }),
            Err(_) => {
                self.cancel.cancel();
                self.join.abort();
                Resolution::TimedOut
            }
        };

        ResolvedActivation {
            instance_name: self.instance_name,
            strategy_id: self.strategy_id,
            resolution,
        }
    }
}

/// Activate every enabled optimization attached to this execution's
/// service, concurrently, and join them all under the per-activation
/// timeout.
///
/// A failed, timed-out, or unknown-strategy activation is reported and
/// degrades the plan; it never fails the query. Returns the terminal state
/// of every attached instance.
pub async fn activate_all(
    registry: &StrategyRegistry,
    ctx: &Arc<ExecutionContext>,
    timeout: Duration,
    sink: &dyn ErrorSink,
) -> Vec<(String, ActivationState)> {
    let service = ctx.query().service.clone();
    let mut results = Vec::with_capacity(service.optimizations.len());
    let mut handles = Vec::new();

    for instance in &service.optimizations {
        if !instance.enabled {
            ctx.set_activation_state(&instance.name, ActivationState::NotApplicable);
            results.push((instance.name.clone(), ActivationState::NotApplicable));
            continue;
        }
        match registry.get(&instance.strategy_id) {
            Some(strategy) => {
                handles.push(ActivationHandle::spawn(strategy, ctx.clone(), instance.clone()));
            }
            None => {
                let err = DataServiceError::OptimizationActivation {
                    strategy: instance.strategy_id.clone(),
                    cause: "unknown strategy id".to_string(),
                };
                sink.report("Push-down activation skipped", &err);
                ctx.set_activation_state(&instance.name, ActivationState::Failed);
                results.push((instance.name.clone(), ActivationState::Failed));
            }
        }
    }

    let resolved = join_all(handles.into_iter().map(|h| h.resolve(timeout))).await;
    for activation in resolved {
        let state = match activation.resolution {
            Resolution::Applied => ActivationState::Applied,
            Resolution::NotApplicable => ActivationState::NotApplicable,
            Resolution::TimedOut => {
                tracing::warn!(
                    "Activation of {} timed out; continuing without it",
                    activation.instance_name
                );
                ActivationState::NotApplicable
            }
            Resolution::Failed(e) => {
                sink.report("Push-down activation failed", &e);
                ActivationState::Failed
            }
        };
        ctx.set_activation_state(&activation.instance_name, state);
        results.push((activation.instance_name, state));
    }

    results
}
