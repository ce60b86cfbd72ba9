use axum::http::{header, HeaderMap};

/// What the detectors and the logger know about the request that carried a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportContext {
    pub user_agent: Option<String>,
}

impl ReportContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Self { user_agent }
    }

    pub fn with_user_agent(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: Some(user_agent.into()),
        }
    }
}
