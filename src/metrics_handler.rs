use crate::app_state::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use prometheus::{proto::MetricFamily, Encoder, TextEncoder};

// GET /metrics: the service's own counters in Prometheus text format.
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    let encoder = TextEncoder::new();
    let families = state.registry().gather();

    match render_families(&encoder, &families) {
        Ok(payload) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            payload,
        )
            .into_response(),
        Err(ScrapeError::Encode(error)) => {
            tracing::error!(?error, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
        Err(ScrapeError::Utf8(error)) => {
            tracing::error!(?error, "metrics not valid UTF-8");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics buffer invalid").into_response()
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ScrapeError {
    #[error(transparent)]
    Encode(#[from] prometheus::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

fn render_families<E: Encoder>(
    encoder: &E,
    families: &[MetricFamily],
) -> Result<String, ScrapeError> {
    let mut buffer = Vec::new();
    encoder.encode(families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
