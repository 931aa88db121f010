//! HTTP exposition surface.
//!
//! `/metrics` always answers 200 while the process is alive, even when
//! every upstream fetch is failing; degraded collection shows up in
//! `cloudflare_scrape_errors_total`, not as an HTTP error.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;

use cf_store::SampleStore;

/// Build the exposition router over a shared sample store.
pub fn build_router(store: SampleStore) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .with_state(store)
}

/// GET /metrics
async fn metrics(State(store): State<SampleStore>) -> impl IntoResponse {
    let body = cf_metrics::render_prometheus(&store.snapshot());
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// GET /healthz
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
