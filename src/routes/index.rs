use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use crate::policy::PolicyAccumulator;
use crate::template::Vars;
use crate::AppState;

const DEFAULT_ACCENT: &str = "#9333ea";

#[derive(Deserialize)]
pub struct IndexQuery {
    pub name: Option<String>,
    pub accent: Option<String>,
}

/// Landing page: renders the bundled template with a fresh accumulator and
/// hands the accumulator to the CSP middleware with the response.
pub async fn index_handler(
    State(state): State<AppState>,
    Query(params): Query<IndexQuery>,
) -> Response {
    let mut policy = PolicyAccumulator::new(state.config.nonce_enabled);

    let name = params.name.unwrap_or_else(|| "world".to_string());
    let name_json = serde_json::Value::String(name.clone()).to_string();
    let accent = params
        .accent
        .filter(|a| is_hex_color(a))
        .unwrap_or_else(|| DEFAULT_ACCENT.to_string());

    let vars = Vars::from([
        ("name".to_string(), name),
        ("name_json".to_string(), name_json),
        ("accent".to_string(), accent),
        ("report_uri".to_string(), state.config.report_uri.clone()),
    ]);

    let html = match state.index.render(&vars, &mut policy) {
        Ok(html) => html,
        Err(e) => {
            tracing::error!("Template error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response();
        }
    };

    // Hashes differ per render; never cache the page apart from its header.
    (
        policy,
        [
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store, must-revalidate")),
            (header::PRAGMA, HeaderValue::from_static("no-cache")),
            (header::EXPIRES, HeaderValue::from_static("0")),
        ],
        Html(html),
    )
        .into_response()
}

fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .map_or(false, |hex| {
            matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
        })
}
