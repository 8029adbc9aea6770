use std::sync::{Arc, RwLock};

use crate::engine::PipelineEngine;
use crate::error::{DataServiceError, ErrorSink};
use crate::models::DataService;
use crate::optimization::StrategyRegistry;
use crate::validation::SqlReferences;

/// Registry of data services: resolution of SQL text and bare names to
/// registered definitions, plus fault-isolating enumeration.
///
/// Lookups are read-only; concurrent query preparation never contends
/// with anything but other readers.
pub struct ServiceCatalog {
    engine: Arc<dyn PipelineEngine>,
    registry: Arc<StrategyRegistry>,
    sink: Arc<dyn ErrorSink>,
    services: RwLock<Vec<Arc<DataService>>>,
}

impl ServiceCatalog {
    pub fn new(
        engine: Arc<dyn PipelineEngine>,
        registry: Arc<StrategyRegistry>,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            engine,
            registry,
            sink,
            services: RwLock::new(Vec::new()),
        }
    }

    /// Register a data service.
    ///
    /// Validates that the backing pipeline exists and runs `init` for
    /// every attached optimization; a single init failure fails the whole
    /// registration.
    pub async fn register(&self, service: DataService) -> Result<(), DataServiceError> {
        {
            let services = self.services.read().expect("service catalog lock poisoned");
            if services.iter().any(|s| s.name == service.name) {
                return Err(DataServiceError::Boundary(format!(
                    "Data service already registered: {}",
                    service.name
                )));
            }
        }

        let pipeline = self
            .engine
            .lookup_pipeline(&service.pipeline)
            .await
            .map_err(|e| {
                DataServiceError::Boundary(format!(
                    "Cannot register data service {}: {}",
                    service.name, e
                ))
            })?;

        self.registry.init_service(&pipeline, &service)?;

        tracing::info!("Registered data service {}", service.name);
        self.services
            .write()
            .expect("service catalog lock poisoned")
            .push(Arc::new(service));
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> bool {
        let mut services = self.services.write().expect("service catalog lock poisoned");
        let before = services.len();
        services.retain(|s| s.name != name);
        services.len() != before
    }

    /// Every service whose name is referenced as a table by `sql`.
    ///
    /// A candidate whose pipeline reference no longer resolves is reported
    /// to the error sink and skipped; one bad candidate never aborts
    /// evaluation of the rest. Unmatched or unparseable SQL yields an
    /// empty result, never an error.
    pub async fn resolve_by_query(&self, sql: &str) -> Vec<Arc<DataService>> {
        let references = SqlReferences::table_references(sql);
        let candidates: Vec<Arc<DataService>> = {
            let services = self.services.read().expect("service catalog lock poisoned");
            services
                .iter()
                .filter(|s| references.iter().any(|r| r == &s.name))
                .cloned()
                .collect()
        };
        self.validated(candidates).await
    }

    /// Exact-name lookup; empty when unregistered.
    pub async fn resolve_by_name(&self, name: &str) -> Vec<Arc<DataService>> {
        let candidates: Vec<Arc<DataService>> = {
            let services = self.services.read().expect("service catalog lock poisoned");
            services.iter().filter(|s| s.name == name).cloned().collect()
        };
        self.validated(candidates).await
    }

    /// Resolve `sql` to exactly one service. Zero matches fails; so does
    /// more than one, since an ambiguous reference is a configuration
    /// error.
    pub async fn resolve_exactly_one(
        &self,
        sql: &str,
    ) -> Result<Arc<DataService>, DataServiceError> {
        let mut matches = self.resolve_by_query(sql).await;
        if matches.len() == 1 {
            Ok(matches.remove(0))
        } else {
            Err(DataServiceError::UnresolvedService(sql.to_string()))
        }
    }

    /// Snapshot of every registered service, in registration order.
    pub fn data_services(&self) -> Vec<Arc<DataService>> {
        self.services
            .read()
            .expect("service catalog lock poisoned")
            .clone()
    }

    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .services
            .read()
            .expect("service catalog lock poisoned")
            .iter()
            .map(|s| s.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn list_names_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .services
            .read()
            .expect("service catalog lock poisoned")
            .iter()
            .filter(|s| s.name.starts_with(prefix))
            .map(|s| s.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Drop candidates whose pipeline reference is broken, reporting each
    /// fault once.
    async fn validated(&self, candidates: Vec<Arc<DataService>>) -> Vec<Arc<DataService>> {
        let mut resolved = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self.engine.lookup_pipeline(&candidate.pipeline).await {
                Ok(_) => resolved.push(candidate),
                Err(e) => {
                    self.sink
                        .report("Unable to retrieve data service", &e);
                }
            }
        }
        resolved
    }
}
