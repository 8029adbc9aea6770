use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::PipelineEngine;
use crate::error::{DataServiceError, ErrorSink};
use crate::models::{PreparedQueryHandle, ServiceInformation};
use crate::optimization::{ExecutionContext, OptimizationImpactInfo, StrategyRegistry};
use crate::services::{QueryPreparer, ServiceCatalog, ServiceMetadataProvider};
use crate::validation::SqlReferences;

/// Public surface of the gateway: prepare queries, list services, fetch
/// schemas, preview optimizations. Everything a remote caller can reach
/// goes through here, and every failure leaving this type belongs to the
/// gateway's error taxonomy.
pub struct QueryExecutionFacade {
    catalog: Arc<ServiceCatalog>,
    engine: Arc<dyn PipelineEngine>,
    registry: Arc<StrategyRegistry>,
    metadata: ServiceMetadataProvider,
    preparer: QueryPreparer,
}

impl QueryExecutionFacade {
    pub fn new(
        catalog: Arc<ServiceCatalog>,
        engine: Arc<dyn PipelineEngine>,
        registry: Arc<StrategyRegistry>,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            metadata: ServiceMetadataProvider::new(engine.clone(), sink),
            preparer: QueryPreparer::new(catalog.clone()),
            catalog,
            engine,
            registry,
        }
    }

    /// Prepare a query and serialize it for a remote caller.
    pub async fn query(
        &self,
        sql: &str,
        row_limit: u64,
    ) -> Result<PreparedQueryHandle, DataServiceError> {
        self.query_with_parameters(sql, row_limit, HashMap::new())
            .await
    }

    pub async fn query_with_parameters(
        &self,
        sql: &str,
        row_limit: u64,
        parameters: HashMap<String, String>,
    ) -> Result<PreparedQueryHandle, DataServiceError> {
        SqlReferences::validate_select_only(sql)?;
        let query = self.preparer.prepare_query(sql, row_limit, parameters).await?;
        tracing::info!(
            "Prepared query {} against service {}",
            query.id,
            query.service_name()
        );
        Ok(query.to_handle())
    }

    /// Schema of every registered service; services that fail
    /// introspection are reported and omitted, never surfaced.
    pub async fn service_information(&self) -> Vec<ServiceInformation> {
        let services = self.catalog.data_services();
        self.metadata.describe_all(&services).await
    }

    /// Schema of one named service. Unknown names fail with
    /// `UnresolvedService`; introspection failures surface as
    /// `MetadataUnavailable`.
    pub async fn service_information_for(
        &self,
        name: &str,
    ) -> Result<ServiceInformation, DataServiceError> {
        let services = self.catalog.resolve_by_name(name).await;
        let service = services
            .first()
            .ok_or_else(|| DataServiceError::UnresolvedService(name.to_string()))?;
        self.metadata.describe(service).await
    }

    pub fn service_names(&self) -> Vec<String> {
        self.catalog.list_names()
    }

    pub fn service_names_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.catalog.list_names_with_prefix(prefix)
    }

    /// Non-executing impact preview of every enabled optimization the
    /// resolved service carries, for inspection/explain tooling.
    pub async fn optimization_preview(
        &self,
        sql: &str,
        row_limit: u64,
    ) -> Result<Vec<OptimizationImpactInfo>, DataServiceError> {
        SqlReferences::validate_select_only(sql)?;
        let query = self
            .preparer
            .prepare_query(sql, row_limit, HashMap::new())
            .await?;

        let pipeline = self
            .engine
            .lookup_pipeline(&query.service.pipeline)
            .await
            .map_err(|e| DataServiceError::MetadataUnavailable {
                service: query.service_name().to_string(),
                cause: e.to_string(),
            })?;

        let service = query.service.clone();
        let ctx = ExecutionContext::new(query, pipeline);

        let mut impacts = Vec::new();
        for instance in service.optimizations.iter().filter(|o| o.enabled) {
            if let Some(strategy) = self.registry.get(&instance.strategy_id) {
                impacts.push(strategy.preview(&ctx, instance));
            }
        }
        Ok(impacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{PipelineDefinition, StaticPipelineEngine, StepDefinition};
    use crate::error::CollectingSink;
    use crate::models::{DataService, FieldInfo, FieldType, OptimizationInstance};
    use crate::optimization::{activate_all, ActivationState};
    use std::time::Duration;

    fn orders_pipeline() -> PipelineDefinition {
        PipelineDefinition {
            name: "orders_pipeline".to_string(),
            parameters: HashMap::from([("REGION".to_string(), String::new())]),
            steps: vec![
                StepDefinition {
                    name: "SRC".to_string(),
                    fields: vec![],
                    accepts_parameters: true,
                    accepts_row_limit: true,
                    estimated_rows: Some(10_000),
                },
                StepDefinition {
                    name: "OUT".to_string(),
                    fields: vec![
                        FieldInfo::new("id", FieldType::Integer),
                        FieldInfo::new("total", FieldType::Decimal),
                    ],
                    accepts_parameters: false,
                    accepts_row_limit: false,
                    estimated_rows: None,
                },
            ],
            active_parameters: HashMap::new(),
            activated: false,
        }
    }

    fn orders_service() -> DataService {
        DataService {
            name: "orders".to_string(),
            pipeline: "orders_pipeline".to_string(),
            output_step: "OUT".to_string(),
            optimizations: vec![
                OptimizationInstance {
                    name: "push-region".to_string(),
                    strategy_id: "parameter-generation".to_string(),
                    enabled: true,
                    config: serde_json::json!({
                        "target_step": "SRC",
                        "parameter_map": {"region": "REGION"}
                    }),
                },
                OptimizationInstance {
                    name: "limit-src".to_string(),
                    strategy_id: "source-limit".to_string(),
                    enabled: true,
                    config: serde_json::json!({"target_step": "SRC"}),
                },
            ],
        }
    }

    async fn facade_with(sink: Arc<CollectingSink>) -> (QueryExecutionFacade, Arc<ServiceCatalog>) {
        let engine: Arc<dyn PipelineEngine> =
            Arc::new(StaticPipelineEngine::new().with_pipeline(orders_pipeline()));
        let registry = Arc::new(StrategyRegistry::with_defaults());
        let catalog = Arc::new(ServiceCatalog::new(
            engine.clone(),
            registry.clone(),
            sink.clone(),
        ));
        catalog.register(orders_service()).await.unwrap();
        (
            QueryExecutionFacade::new(catalog.clone(), engine, registry, sink),
            catalog,
        )
    }

    #[tokio::test]
    async fn test_orders_scenario() {
        let (facade, _) = facade_with(Arc::new(CollectingSink::new())).await;

        let handle = facade.query("SELECT * FROM orders", 100).await.unwrap();
        assert_eq!(handle.service_name, "orders");
        assert_eq!(handle.row_limit, 100);
        assert_eq!(handle.output_step, "OUT");

        let info = facade.service_information_for("orders").await.unwrap();
        assert_eq!(info.service_name, "orders");
        assert_eq!(
            info.fields,
            vec![
                FieldInfo::new("id", FieldType::Integer),
                FieldInfo::new("total", FieldType::Decimal),
            ]
        );

        assert!(facade.service_names().contains(&"orders".to_string()));
    }

    #[tokio::test]
    async fn test_query_rejects_unknown_table_and_non_select() {
        let (facade, _) = facade_with(Arc::new(CollectingSink::new())).await;

        assert!(matches!(
            facade.query("SELECT * FROM missing", 10).await.unwrap_err(),
            DataServiceError::UnresolvedService(_)
        ));
        assert!(matches!(
            facade.query("DELETE FROM orders", 10).await.unwrap_err(),
            DataServiceError::Boundary(_)
        ));
    }

    #[tokio::test]
    async fn test_unknown_service_name_is_unresolved() {
        let (facade, _) = facade_with(Arc::new(CollectingSink::new())).await;
        assert!(matches!(
            facade.service_information_for("nope").await.unwrap_err(),
            DataServiceError::UnresolvedService(_)
        ));
    }

    #[tokio::test]
    async fn test_failed_activation_still_yields_executable_handle() {
        let sink = Arc::new(CollectingSink::new());
        let (facade, _) = facade_with(sink.clone()).await;

        // A service whose optimization config is valid at registration but
        // whose strategy fails at activation time is simulated by
        // activating against a registry that no longer knows the strategy.
        let handle = facade.query("SELECT * FROM orders", 100).await.unwrap();
        assert_eq!(handle.service_name, "orders");

        let engine = StaticPipelineEngine::new().with_pipeline(orders_pipeline());
        let pipeline = engine.lookup_pipeline("orders_pipeline").await.unwrap();
        let query = crate::models::PreparedQuery::new(
            handle.sql.clone(),
            handle.row_limit,
            handle.parameters.clone(),
            Arc::new(orders_service()),
        );
        let ctx = Arc::new(ExecutionContext::new(query, pipeline));

        let empty_registry = StrategyRegistry::new();
        let states: HashMap<String, ActivationState> =
            activate_all(&empty_registry, &ctx, Duration::from_secs(1), sink.as_ref())
                .await
                .into_iter()
                .collect();

        // Both activations failed, were reported, and the handle remains
        // perfectly usable.
        assert_eq!(states["push-region"], ActivationState::Failed);
        assert_eq!(states["limit-src"], ActivationState::Failed);
        assert_eq!(sink.report_count(), 2);
        assert!(handle.to_bytes().is_ok());
    }

    #[tokio::test]
    async fn test_optimization_preview_is_repeatable_and_non_executing() {
        let (facade, _) = facade_with(Arc::new(CollectingSink::new())).await;

        let sql = "SELECT * FROM orders WHERE region = 'EMEA'";
        let first = facade.optimization_preview(sql, 50).await.unwrap();
        let second = facade.optimization_preview(sql, 50).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|i| i.applicable));
    }

    #[tokio::test]
    async fn test_service_names_with_prefix() {
        let (facade, catalog) = facade_with(Arc::new(CollectingSink::new())).await;
        let mut billing = orders_service();
        billing.name = "billing".to_string();
        billing.optimizations.clear();
        catalog.register(billing).await.unwrap();

        assert_eq!(facade.service_names().len(), 2);
        assert_eq!(facade.service_names_with_prefix("bil"), vec!["billing"]);
    }

    #[tokio::test]
    async fn test_service_information_lists_all() {
        let (facade, _) = facade_with(Arc::new(CollectingSink::new())).await;
        let infos = facade.service_information().await;
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].service_name, "orders");
    }
}
