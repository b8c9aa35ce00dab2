pub mod metrics {
    use opentelemetry::metrics::{Meter, MeterProvider};
    use opentelemetry_prometheus::exporter as prometheus_exporter;
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::Registry;

    pub fn prometheus_meter() -> (SdkMeterProvider, Meter, Registry) {
        let registry = Registry::new();
        let reader = prometheus_exporter()
            .with_registry(registry.clone())
            .build()
            .expect("prometheus exporter");
        let provider = SdkMeterProvider::builder().with_reader(reader).build();
        let meter = provider.meter("test");
        (provider, meter, registry)
    }

    // The exporter may or may not append `_total` to counter names.
    pub fn counter_value(registry: &Registry, name: &str) -> Option<f64> {
        let families = registry.gather();
        let fallback = format!("{name}_total");
        let family = families
            .iter()
            .find(|mf| mf.get_name() == name)
            .or_else(|| families.iter().find(|mf| mf.get_name() == fallback))?;

        family
            .get_metric()
            .first()
            .map(|metric| metric.get_counter().get_value())
    }
}

pub mod store {
    use crate::metric_record::{MetricRecord, StoredMetric};
    use crate::metric_store::MetricStore;
    use anyhow::{anyhow, bail, Result};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Stands in for Postgres: knows a fixed set of traces and observations.
    #[derive(Default)]
    pub struct InMemoryMetricStore {
        traces: HashSet<String>,
        observations: HashSet<String>,
        records: Mutex<Vec<MetricRecord>>,
    }

    impl InMemoryMetricStore {
        pub fn new(traces: &[&str], observations: &[&str]) -> Self {
            Self {
                traces: traces.iter().map(|id| id.to_string()).collect(),
                observations: observations.iter().map(|id| id.to_string()).collect(),
                records: Mutex::new(Vec::new()),
            }
        }

        pub fn records(&self) -> Vec<MetricRecord> {
            self.records.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MetricStore for InMemoryMetricStore {
        async fn create_metric(&self, record: MetricRecord) -> Result<StoredMetric> {
            if !self.traces.contains(record.trace_id()) {
                bail!("No trace record found for id '{}'", record.trace_id());
            }
            if let Some(observation_id) = record.observation_id() {
                if !self.observations.contains(observation_id) {
                    bail!("No observation record found for id '{observation_id}'");
                }
            }

            let mut records = self.records.lock().unwrap();
            let stored = StoredMetric {
                id: format!("metric-{}", records.len() + 1),
                timestamp: record.timestamp,
                name: record.name.clone(),
                value: record.value,
                trace_id: record.trace_id().to_owned(),
                observation_id: record.observation_id().map(str::to_owned),
            };
            records.push(record);
            Ok(stored)
        }
    }

    /// A store whose connection is always down.
    pub struct UnavailableMetricStore;

    #[async_trait]
    impl MetricStore for UnavailableMetricStore {
        async fn create_metric(&self, _record: MetricRecord) -> Result<StoredMetric> {
            Err(anyhow!("connection refused"))
        }
    }
}
