//! Violation reports posted by browsers, and everything that happens to them
//! between the request body and the log line.

pub mod context;
pub mod detectors;
pub mod error;
pub mod event;
pub mod filter;
pub mod logger;
pub mod pipeline;

pub use context::ReportContext;
pub use error::ReportError;
pub use event::{EventDispatcher, ReportEvent, ReportSubscriber};
pub use filter::{NoiseDetector, NoiseFilter};
pub use logger::{DefaultFormatter, LogError, LogFormatter, LogRecord, LogSink, ReportLogger, TracingSink};
pub use pipeline::{Outcome, PipelineError, ReportPipeline};

use serde_json::{Map, Value};

pub const CSP_REPORT_KEY: &str = "csp-report";
pub const EFFECTIVE_DIRECTIVE: &str = "effective-directive";
pub const VIOLATED_DIRECTIVE: &str = "violated-directive";
pub const BLOCKED_URI: &str = "blocked-uri";
pub const SCRIPT_SAMPLE: &str = "script-sample";
pub const SOURCE_FILE: &str = "source-file";

/// A single normalized `csp-report`.
///
/// Every field the browser sent is kept as-is. Parsing additionally guarantees
/// that `effective-directive` and `blocked-uri` are present (possibly `null`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViolationReport {
    data: Map<String, Value>,
}

impl ViolationReport {
    /// Parse a report endpoint request body.
    ///
    /// The payload is normalized against exactly one level of `csp-report`
    /// nesting. A `csp-report` that is null, empty, or not an object yields an
    /// empty report rather than an error, since some browsers send those.
    pub fn from_request_body(body: &[u8]) -> Result<Self, ReportError> {
        if body.is_empty() {
            return Err(ReportError::NoData);
        }

        let json: Value = serde_json::from_slice(body).map_err(ReportError::InvalidPayload)?;
        let Value::Object(mut root) = json else {
            return Err(ReportError::MissingReport);
        };
        let report = root.remove(CSP_REPORT_KEY).ok_or(ReportError::MissingReport)?;

        match report {
            Value::Object(fields) if !fields.is_empty() => Ok(Self::normalize(fields)),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_data(data: Map<String, Value>) -> Self {
        Self { data }
    }

    fn normalize(fields: Map<String, Value>) -> Self {
        let effective = match fields.get(EFFECTIVE_DIRECTIVE) {
            Some(Value::String(directive)) => Value::String(directive.clone()),
            _ => fields
                .get(VIOLATED_DIRECTIVE)
                .and_then(Value::as_str)
                .and_then(first_token)
                .map(|token| Value::String(token.to_string()))
                .unwrap_or(Value::Null),
        };
        let blocked_uri = fields.get(BLOCKED_URI).cloned().unwrap_or(Value::Null);

        let mut report = Self::from_data(fields);
        report.set_property(EFFECTIVE_DIRECTIVE, effective);
        report.set_property(BLOCKED_URI, blocked_uri);
        report
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// `effective-directive`, else the first token of `violated-directive`.
    pub fn directive(&self) -> Option<&str> {
        self.get(EFFECTIVE_DIRECTIVE)
            .or_else(|| self.get(VIOLATED_DIRECTIVE).and_then(first_token))
    }

    pub fn uri(&self) -> Option<&str> {
        self.get(BLOCKED_URI)
    }

    pub fn script_sample(&self) -> Option<&str> {
        self.get(SCRIPT_SAMPLE)
    }

    pub fn source_file(&self) -> Option<&str> {
        self.get(SOURCE_FILE)
    }

    /// Host of the blocked URI, or the whole URI lower-cased when it has no host
    /// (`inline`, `eval`, `data:...`).
    pub fn domain(&self) -> Option<String> {
        let uri = self.uri()?;
        let host = url::Url::parse(uri)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_lowercase));
        Some(host.unwrap_or_else(|| uri.to_lowercase()))
    }

    pub fn scheme(&self) -> Option<String> {
        let (scheme, _) = self.uri()?.split_once("://")?;
        Some(scheme.to_lowercase())
    }

    pub fn is_data(&self) -> bool {
        self.uri()
            .map_or(false, |uri| uri.starts_with("data:") || uri == "data")
    }
}

fn first_token(value: &str) -> Option<&str> {
    value.split_whitespace().next()
}
