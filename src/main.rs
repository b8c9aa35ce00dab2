mod app_state;
mod config;
mod cors_config;
mod ingest_handler;
mod ingest_metrics;
mod metric_record;
mod metric_store;
mod metric_submission;
mod metrics_handler;
mod routes;
#[cfg(test)]
mod test_helpers;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use config::AppConfig;
use cors_config::{read_cors_config_file, CorsConfig};
use opentelemetry::{metrics::MeterProvider, KeyValue};
use opentelemetry_sdk::{metrics::SdkMeterProvider, Resource};
use prometheus::Registry;
use tokio::{
    net::TcpListener,
    signal::{self, unix::SignalKind},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

use app_state::AppState;
use ingest_metrics::IngestMetrics;
use metric_store::PgMetricStore;

const SERVICE_NAME: &str = "metric-ingest";
const DEFAULT_LOG_FILE_NAME: &str = "tracing.log";

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("failed to load service configuration")?;
    let _log_guard = init_tracing(&config.trace_log_file)?;

    let (registry, meter_provider) = init_metrics()?;
    let ingest_metrics = IngestMetrics::new(&meter_provider.meter(SERVICE_NAME));

    let store = PgMetricStore::connect(&config.database_url, config.database_max_connections)
        .await?;
    tracing::info!(
        max_connections = config.database_max_connections,
        "connected to metrics database"
    );

    let cors = match &config.cors_config_file {
        Some(path) => {
            tracing::info!(cors_config = %path.display(), "loading CORS policy");
            read_cors_config_file(path)?
        }
        None => CorsConfig::default(),
    }
    .layer()
    .context("failed to build CORS policy")?;

    let state = AppState::new(Arc::new(store), ingest_metrics, registry);
    let app = routes::build_router(state, cors);

    let listener = TcpListener::bind(config.listen_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(error) = meter_provider.shutdown() {
        tracing::warn!(?error, "meter provider shutdown failed");
    }
    Ok(())
}

async fn shutdown_signal() {
    // A listener that cannot be installed never fires; the other one still can.
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(?error, "unable to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                tracing::error!(?error, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+C received, draining requests"),
        _ = terminate => tracing::info!("SIGTERM received, draining requests"),
    }
}

/// Install the file-backed subscriber. Log lines are flushed until the
/// returned guard is dropped, so `main` keeps it for the life of the server.
fn init_tracing(log_file: &Path) -> Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (directory, file_name) = split_log_path(log_file);
    fs::create_dir_all(&directory).with_context(|| {
        format!(
            "failed to create tracing log directory {}",
            directory.display()
        )
    })?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&directory, file_name));

    fmt()
        .with_env_filter(filter)
        .with_writer(file_writer)
        .with_ansi(false)
        .try_init()
        .map_err(|error| anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(guard)
}

// `logs/ingest.log` -> (`logs`, `ingest.log`); a bare directory gets `tracing.log`.
fn split_log_path(log_file: &Path) -> (PathBuf, String) {
    match log_file.file_name().and_then(|name| name.to_str()) {
        Some(name) if !name.is_empty() => {
            let directory = log_file
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            (directory, name.to_string())
        }
        _ => (log_file.to_path_buf(), DEFAULT_LOG_FILE_NAME.to_string()),
    }
}

fn init_metrics() -> Result<(Arc<Registry>, SdkMeterProvider)> {
    let registry = Registry::new();
    let reader = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()
        .context("failed to build Prometheus exporter")?;

    let provider = SdkMeterProvider::builder()
        .with_resource(Resource::new([KeyValue::new("service.name", SERVICE_NAME)]))
        .with_reader(reader)
        .build();

    Ok((Arc::new(registry), provider))
}
