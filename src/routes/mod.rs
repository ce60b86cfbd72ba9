pub mod index;
pub mod report;

pub use index::index_handler;
pub use report::report_handler;

use axum::{
    routing::{get, post},
    Router,
};

use crate::{csp, AppState};

/// Application routes with the CSP middleware applied. Transport layers
/// (tracing, CORS, rate limiting) are added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/", get(index_handler))
        .route(&state.config.report_uri, post(report_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            csp::csp_middleware,
        ))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}
