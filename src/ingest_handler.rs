use crate::{
    app_state::AppState,
    metric_record::{MetricRecord, StoredMetric},
    metric_submission::MetricSubmission,
};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

const INVALID_REQUEST_MESSAGE: &str = "Invalid request data";

/// Everything that can go wrong between receiving a body and persisting it.
///
/// Both variants render as the same 400 response; only the `error` text
/// tells them apart.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Storage(anyhow::Error),
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "message": INVALID_REQUEST_MESSAGE,
            "error": self.to_string(),
        });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

// POST /api/metrics
pub async fn create_metric(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    match ingest(&state, content_type, &body).await {
        Ok(stored) => {
            state.ingest_metrics().record_created();
            tracing::info!(
                id = %stored.id,
                name = %stored.name,
                trace_id = %stored.trace_id,
                "metric created"
            );
            (StatusCode::CREATED, Json(stored)).into_response()
        }
        Err(error) => {
            match &error {
                IngestError::Validation(_) => state.ingest_metrics().record_validation_error(),
                IngestError::Storage(_) => state.ingest_metrics().record_storage_error(),
            }
            tracing::warn!(%error, "rejected metric submission");
            error.into_response()
        }
    }
}

async fn ingest(
    state: &AppState,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<StoredMetric, IngestError> {
    let submission =
        MetricSubmission::from_body(content_type, body).map_err(IngestError::Validation)?;
    let record = MetricRecord::from_submission(submission);
    state
        .store()
        .create_metric(record)
        .await
        .map_err(IngestError::Storage)
}

// Any method other than POST on /api/metrics; the body is never read.
pub async fn method_not_allowed(State(state): State<AppState>) -> Response {
    state.ingest_metrics().record_method_rejection();
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "message": "Method not allowed" })),
    )
        .into_response()
}
