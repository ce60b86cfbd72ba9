use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::report::{PipelineError, ReportContext};
use crate::AppState;

/// Media types browsers use for violation reports.
const REPORT_CONTENT_TYPES: [&str; 3] = [
    "application/csp-report",
    "application/json",
    "application/reports+json",
];

/// Violation report endpoint.
///
/// Answers 204 whether the report was kept or dropped as noise, so browsers
/// have no reason to retry. Malformed bodies get their status and message back.
pub async fn report_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_report_content_type(&headers) {
        let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
        tracing::info!(severity = "notice", content_type, "CSP report with unsupported content type");
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Content-Security-Policy Endpoint called with unsupported content type",
        )
            .into_response();
    }

    let context = ReportContext::from_headers(&headers);

    match state.reports.handle(&context, &body) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(PipelineError::Report(err)) => (err.status(), err.to_string()).into_response(),
        Err(PipelineError::Log(err)) => {
            tracing::error!(%err, "failed to log CSP report");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to record report").into_response()
        }
    }
}

fn is_report_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|media_type| media_type.trim().to_ascii_lowercase())
        .map_or(false, |media_type| REPORT_CONTENT_TYPES.contains(&media_type.as_str()))
}
