use crate::{
    app_state::AppState,
    ingest_handler::{create_metric, method_not_allowed},
    metrics_handler::metrics_handler,
};
use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let ingest = Router::new()
        .route(
            "/api/metrics",
            post(create_metric).fallback(method_not_allowed),
        )
        .layer(cors);

    Router::new()
        .merge(ingest)
        .route("/metrics", get(metrics_handler))
        .route("/health", get(|| async { StatusCode::OK }))
        .with_state(state)
}
