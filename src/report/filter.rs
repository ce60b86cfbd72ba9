//! Signal/noise classification for violation reports.

use super::{ReportContext, ViolationReport};

/// Decides whether a report is noise (true) or worth logging (false).
///
/// Detectors only read the report. Register cheap ones first: the filter stops
/// at the first match.
pub trait NoiseDetector: Send + Sync {
    fn name(&self) -> &str;
    fn detect(&self, context: &ReportContext, report: &ViolationReport) -> bool;
}

/// Adapter so plain closures can be registered as detectors.
pub struct FnDetector<F> {
    name: String,
    detect: F,
}

impl<F> FnDetector<F>
where
    F: Fn(&ReportContext, &ViolationReport) -> bool + Send + Sync,
{
    pub fn new(name: impl Into<String>, detect: F) -> Self {
        Self {
            name: name.into(),
            detect,
        }
    }
}

impl<F> NoiseDetector for FnDetector<F>
where
    F: Fn(&ReportContext, &ViolationReport) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&self, context: &ReportContext, report: &ViolationReport) -> bool {
        (self.detect)(context, report)
    }
}

#[derive(Default)]
pub struct NoiseFilter {
    detectors: Vec<Box<dyn NoiseDetector>>,
}

impl NoiseFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, detector: impl NoiseDetector + 'static) {
        self.detectors.push(Box::new(detector));
    }

    pub fn with_detector(mut self, detector: impl NoiseDetector + 'static) -> Self {
        self.register(detector);
        self
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// True when any registered detector flags the report as noise.
    pub fn filter(&self, context: &ReportContext, report: &ViolationReport) -> bool {
        match self
            .detectors
            .iter()
            .find(|detector| detector.detect(context, report))
        {
            Some(detector) => {
                tracing::debug!(
                    detector = detector.name(),
                    directive = report.directive(),
                    uri = report.uri(),
                    "CSP report classified as noise"
                );
                true
            }
            None => false,
        }
    }
}
