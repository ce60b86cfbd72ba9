//! Writes accepted reports to a structured log sink.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ReportContext, ViolationReport};

/// Syslog-style severities; `tracing` has no notice level, so notice is emitted
/// at INFO with a `severity = "notice"` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    #[default]
    Notice,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Notice => "notice",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("failed to serialize report data: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("log sink unavailable: {0}")]
    Sink(String),
}

pub trait LogFormatter: Send + Sync {
    fn format(&self, report: &ViolationReport) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFormatter;

impl LogFormatter for DefaultFormatter {
    fn format(&self, report: &ViolationReport) -> String {
        format!(
            "Content-Security-Policy Violation Reported for {}",
            report.directive().unwrap_or("unknown directive")
        )
    }
}

pub struct LogRecord<'a> {
    pub level: Severity,
    pub message: &'a str,
    pub data: &'a Map<String, Value>,
    pub user_agent: Option<&'a str>,
}

pub trait LogSink: Send + Sync {
    fn emit(&self, record: &LogRecord<'_>) -> Result<(), LogError>;
}

/// Sink that turns records into `tracing` events on the `csp_report` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, record: &LogRecord<'_>) -> Result<(), LogError> {
        let data = serde_json::to_string(record.data)?;

        macro_rules! emit {
            ($macro:ident) => {
                tracing::$macro!(
                    target: "csp_report",
                    severity = record.level.as_str(),
                    csp_report = %data,
                    user_agent = record.user_agent,
                    "{}",
                    record.message
                )
            };
        }

        match record.level {
            Severity::Debug => emit!(debug),
            Severity::Info | Severity::Notice => emit!(info),
            Severity::Warning => emit!(warn),
            Severity::Error => emit!(error),
        }
        Ok(())
    }
}

pub struct ReportLogger {
    level: Severity,
    formatter: Box<dyn LogFormatter>,
    sink: Box<dyn LogSink>,
}

impl ReportLogger {
    pub fn new(level: Severity) -> Self {
        Self {
            level,
            formatter: Box::new(DefaultFormatter),
            sink: Box::new(TracingSink),
        }
    }

    pub fn with_formatter(mut self, formatter: impl LogFormatter + 'static) -> Self {
        self.formatter = Box::new(formatter);
        self
    }

    pub fn with_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn level(&self) -> Severity {
        self.level
    }

    /// Formats and emits the report. Sink failures are returned as-is, not retried.
    pub fn log(&self, context: &ReportContext, report: &ViolationReport) -> Result<(), LogError> {
        let message = self.formatter.format(report);
        self.sink.emit(&LogRecord {
            level: self.level,
            message: &message,
            data: report.data(),
            user_agent: context.user_agent.as_deref(),
        })
    }
}
