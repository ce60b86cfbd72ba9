//! Parse, classify, publish, log: the path a report body takes through the endpoint.

use super::{
    EventDispatcher, LogError, NoiseFilter, ReportContext, ReportError, ReportEvent, ReportLogger,
    ViolationReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Published to subscribers and logged.
    Accepted,
    /// Classified as noise and dropped.
    Suppressed,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Log(#[from] LogError),
}

pub struct ReportPipeline {
    pub filter: NoiseFilter,
    pub dispatcher: EventDispatcher,
    pub logger: ReportLogger,
}

impl ReportPipeline {
    pub fn new(filter: NoiseFilter, dispatcher: EventDispatcher, logger: ReportLogger) -> Self {
        Self {
            filter,
            dispatcher,
            logger,
        }
    }

    pub fn handle(&self, context: &ReportContext, body: &[u8]) -> Result<Outcome, PipelineError> {
        let report = match ViolationReport::from_request_body(body) {
            Ok(report) => report,
            Err(err) => {
                tracing::info!(severity = "notice", status = err.status().as_u16(), "{}", err);
                return Err(err.into());
            }
        };

        if self.filter.filter(context, &report) {
            return Ok(Outcome::Suppressed);
        }

        // Subscribers see the report before the log line is written.
        self.dispatcher.dispatch(&ReportEvent {
            report: &report,
            context,
        });
        self.logger.log(context, &report)?;

        Ok(Outcome::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::filter::FnDetector;
    use crate::report::logger::tests::{FailingSink, MemorySink};
    use crate::report::logger::Severity;
    use std::sync::{Arc, Mutex};

    const BODY: &[u8] =
        br#"{"csp-report":{"blocked-uri":"https://evil.example/x.js","violated-directive":"script-src 'self'"}}"#;

    fn pipeline(filter: NoiseFilter, dispatcher: EventDispatcher, sink: MemorySink) -> ReportPipeline {
        ReportPipeline::new(filter, dispatcher, ReportLogger::new(Severity::Notice).with_sink(sink))
    }

    #[test]
    fn test_signal_is_dispatched_then_logged() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let sink = MemorySink::default();
        let observed_sink = sink.clone();
        let observed = Arc::clone(&order);

        let dispatcher = EventDispatcher::new().with_subscriber(move |event: &ReportEvent<'_>| {
            // nothing logged yet when subscribers run
            let logged = observed_sink.0.lock().unwrap().len();
            observed
                .lock()
                .unwrap()
                .push((event.report.domain(), logged));
        });

        let pipeline = pipeline(NoiseFilter::new(), dispatcher, sink.clone());
        let outcome = pipeline.handle(&ReportContext::default(), BODY).unwrap();

        assert_eq!(outcome, Outcome::Accepted);
        assert_eq!(
            *order.lock().unwrap(),
            vec![(Some("evil.example".to_string()), 0)]
        );
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_noise_is_neither_dispatched_nor_logged() {
        let dispatched = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&dispatched);
        let sink = MemorySink::default();

        let filter = NoiseFilter::new().with_detector(FnDetector::new(
            "evil",
            |_: &ReportContext, r: &ViolationReport| r.domain().as_deref() == Some("evil.example"),
        ));
        let dispatcher = EventDispatcher::new().with_subscriber(move |_: &ReportEvent<'_>| {
            *counter.lock().unwrap() += 1;
        });

        let pipeline = pipeline(filter, dispatcher, sink.clone());
        let outcome = pipeline.handle(&ReportContext::default(), BODY).unwrap();

        assert_eq!(outcome, Outcome::Suppressed);
        assert_eq!(*dispatched.lock().unwrap(), 0);
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_parse_failure_is_returned() {
        let sink = MemorySink::default();
        let pipeline = pipeline(NoiseFilter::new(), EventDispatcher::new(), sink.clone());

        let err = pipeline.handle(&ReportContext::default(), b"").unwrap_err();
        assert!(matches!(err, PipelineError::Report(ReportError::NoData)));
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_sink_failure_is_returned_after_dispatch() {
        let dispatched = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&dispatched);
        let dispatcher = EventDispatcher::new().with_subscriber(move |_: &ReportEvent<'_>| {
            *counter.lock().unwrap() += 1;
        });
        let pipeline = ReportPipeline::new(
            NoiseFilter::new(),
            dispatcher,
            ReportLogger::new(Severity::Notice).with_sink(FailingSink),
        );

        let err = pipeline.handle(&ReportContext::default(), BODY).unwrap_err();
        assert!(matches!(err, PipelineError::Log(LogError::Sink(_))));
        assert_eq!(*dispatched.lock().unwrap(), 1);
    }
}
