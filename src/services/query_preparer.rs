use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DataServiceError;
use crate::models::PreparedQuery;
use crate::services::ServiceCatalog;

/// Turns SQL text, a row bound, and parameters into a bound query against
/// exactly one resolved data service.
///
/// Stateless; mutates nothing and is safe to call from any number of
/// concurrent callers.
pub struct QueryPreparer {
    catalog: Arc<ServiceCatalog>,
}

impl QueryPreparer {
    pub fn new(catalog: Arc<ServiceCatalog>) -> Self {
        Self { catalog }
    }

    /// Prepare a query. Fails with `UnresolvedService` unless `sql`
    /// resolves to exactly one registered service; never yields a
    /// partially-bound query.
    ///
    /// `row_limit` caps the rows the execution engine should return;
    /// zero means unlimited. Unknown parameter names pass through to the
    /// engine untouched.
    pub async fn prepare_query(
        &self,
        sql: &str,
        row_limit: u64,
        parameters: HashMap<String, String>,
    ) -> Result<PreparedQuery, DataServiceError> {
        let service = self.catalog.resolve_exactly_one(sql).await?;
        Ok(PreparedQuery::new(sql, row_limit, parameters, service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{PipelineDefinition, StaticPipelineEngine, StepDefinition};
    use crate::error::CollectingSink;
    use crate::models::{DataService, FieldInfo, FieldType};
    use crate::optimization::StrategyRegistry;

    async fn preparer() -> QueryPreparer {
        let pipeline = PipelineDefinition {
            name: "orders_pipeline".to_string(),
            parameters: HashMap::new(),
            steps: vec![StepDefinition {
                name: "OUT".to_string(),
                fields: vec![FieldInfo::new("id", FieldType::Integer)],
                accepts_parameters: false,
                accepts_row_limit: false,
                estimated_rows: None,
            }],
            active_parameters: HashMap::new(),
            activated: false,
        };
        let engine = Arc::new(StaticPipelineEngine::new().with_pipeline(pipeline));
        let catalog = Arc::new(ServiceCatalog::new(
            engine,
            Arc::new(StrategyRegistry::with_defaults()),
            Arc::new(CollectingSink::new()),
        ));
        catalog
            .register(DataService {
                name: "orders".to_string(),
                pipeline: "orders_pipeline".to_string(),
                output_step: "OUT".to_string(),
                optimizations: vec![],
            })
            .await
            .unwrap();
        QueryPreparer::new(catalog)
    }

    #[tokio::test]
    async fn test_prepare_query_binds_resolved_service() {
        let preparer = preparer().await;
        let mut parameters = HashMap::new();
        parameters.insert("CUSTOM".to_string(), "anything".to_string());

        let query = preparer
            .prepare_query("SELECT * FROM orders", 100, parameters)
            .await
            .unwrap();

        assert_eq!(query.service_name(), "orders");
        assert_eq!(query.row_limit, 100);
        // Unknown parameters pass through opaquely.
        assert_eq!(query.parameters.get("CUSTOM").unwrap(), "anything");
    }

    #[tokio::test]
    async fn test_unknown_table_never_yields_a_query() {
        let preparer = preparer().await;
        let err = preparer
            .prepare_query("SELECT * FROM nope", 10, HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DataServiceError::UnresolvedService(_)));
    }

    #[tokio::test]
    async fn test_zero_row_limit_is_unlimited() {
        let preparer = preparer().await;
        let query = preparer
            .prepare_query("SELECT * FROM orders", 0, HashMap::new())
            .await
            .unwrap();
        assert!(query.is_unlimited());
    }
}
