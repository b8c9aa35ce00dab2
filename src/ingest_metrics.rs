use opentelemetry::metrics::{Counter, Meter};

/// Counters describing how submissions to the ingestion endpoint end up.
#[derive(Clone)]
pub struct IngestMetrics {
    created: Counter<u64>,
    validation_errors: Counter<u64>,
    storage_errors: Counter<u64>,
    method_rejections: Counter<u64>,
}

impl IngestMetrics {
    pub fn new(meter: &Meter) -> Self {
        let created = meter
            .u64_counter("metric_ingest_created_total")
            .with_description("Number of metric records created")
            .init();

        let validation_errors = meter
            .u64_counter("metric_ingest_validation_errors_total")
            .with_description("Number of metric submissions rejected by validation")
            .init();

        let storage_errors = meter
            .u64_counter("metric_ingest_storage_errors_total")
            .with_description("Number of metric submissions the store failed to persist")
            .init();

        let method_rejections = meter
            .u64_counter("metric_ingest_method_rejections_total")
            .with_description("Number of requests to the ingestion endpoint with a non-POST method")
            .init();

        Self {
            created,
            validation_errors,
            storage_errors,
            method_rejections,
        }
    }

    pub fn record_created(&self) {
        self.created.add(1, &[]);
    }

    pub fn record_validation_error(&self) {
        self.validation_errors.add(1, &[]);
    }

    pub fn record_storage_error(&self) {
        self.storage_errors.add(1, &[]);
    }

    pub fn record_method_rejection(&self) {
        self.method_rejections.add(1, &[]);
    }
}
