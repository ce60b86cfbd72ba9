use axum::http::StatusCode;

/// Ways a report body can be rejected. Each maps to the status sent back to the browser.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Content-Security-Policy Endpoint called without data")]
    NoData,
    #[error("Content-Security-Policy Endpoint called with invalid JSON data")]
    InvalidPayload(#[source] serde_json::Error),
    #[error("Content-Security-Policy Endpoint called without \"csp-report\" data")]
    MissingReport,
}

impl ReportError {
    pub fn status(&self) -> StatusCode {
        match self {
            ReportError::NoData => StatusCode::LENGTH_REQUIRED,
            ReportError::InvalidPayload(_) | ReportError::MissingReport => StatusCode::BAD_REQUEST,
        }
    }
}
