use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::engine::PipelineEngine;
use crate::error::{DataServiceError, ErrorSink};
use crate::models::{DataService, ServiceInformation};

/// Schema introspection for data services.
///
/// Every call works on its own copy of the pipeline definition, so
/// concurrent introspections of the same pipeline never share parameter
/// state.
pub struct ServiceMetadataProvider {
    engine: Arc<dyn PipelineEngine>,
    sink: Arc<dyn ErrorSink>,
}

impl ServiceMetadataProvider {
    pub fn new(engine: Arc<dyn PipelineEngine>, sink: Arc<dyn ErrorSink>) -> Self {
        Self { engine, sink }
    }

    /// Describe one service: activate its pipeline's parameter bindings,
    /// then introspect the row layout of the designated output step.
    /// Activation comes first because the computed schema can depend on
    /// parameter-driven branching.
    pub async fn describe(
        &self,
        service: &DataService,
    ) -> Result<ServiceInformation, DataServiceError> {
        let mut pipeline = self
            .engine
            .lookup_pipeline(&service.pipeline)
            .await
            .map_err(|e| DataServiceError::MetadataUnavailable {
                service: service.name.clone(),
                cause: e.to_string(),
            })?;

        self.engine
            .activate_parameters(&mut pipeline)
            .await
            .map_err(|e| DataServiceError::MetadataUnavailable {
                service: service.name.clone(),
                cause: e.to_string(),
            })?;

        let fields = self
            .engine
            .output_schema(&pipeline, &service.output_step)
            .await
            .map_err(|e| DataServiceError::MetadataUnavailable {
                service: service.name.clone(),
                cause: e.to_string(),
            })?;

        Ok(ServiceInformation::new(service.name.clone(), fields))
    }

    /// Describe each service independently, with bounded parallelism.
    ///
    /// A service whose introspection fails is reported to the error sink
    /// exactly once and omitted from the result; the call itself never
    /// fails. Output preserves input order.
    pub async fn describe_all(&self, services: &[Arc<DataService>]) -> Vec<ServiceInformation> {
        let concurrency = num_cpus::get().max(1);

        let mut described: Vec<(usize, ServiceInformation)> =
            stream::iter(services.iter().cloned().enumerate())
                .map(|(index, service)| async move {
                    match self.describe(&service).await {
                        Ok(info) => Some((index, info)),
                        Err(e) => {
                            self.sink.report("Unable to retrieve data service", &e);
                            None
                        }
                    }
                })
                .buffer_unordered(concurrency)
                .collect::<Vec<_>>()
                .await
                .into_iter()
                .flatten()
                .collect();

        described.sort_by_key(|(index, _)| *index);
        described.into_iter().map(|(_, info)| info).collect()
    }
}
