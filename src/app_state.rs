use crate::{ingest_metrics::IngestMetrics, metric_store::MetricStore};
use prometheus::Registry;
use std::sync::Arc;

// Shared by every route; all members are cheap to clone handles.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn MetricStore>,
    ingest_metrics: IngestMetrics,
    registry: Arc<Registry>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MetricStore>,
        ingest_metrics: IngestMetrics,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            store,
            ingest_metrics,
            registry,
        }
    }

    pub fn store(&self) -> &dyn MetricStore {
        self.store.as_ref()
    }

    pub fn ingest_metrics(&self) -> &IngestMetrics {
        &self.ingest_metrics
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
