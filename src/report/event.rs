use std::sync::Arc;

use super::{ReportContext, ViolationReport};

/// Published once per accepted report, before it is logged.
#[derive(Debug, Clone, Copy)]
pub struct ReportEvent<'a> {
    pub report: &'a ViolationReport,
    pub context: &'a ReportContext,
}

pub trait ReportSubscriber: Send + Sync {
    fn on_report(&self, event: &ReportEvent<'_>);
}

impl<F> ReportSubscriber for F
where
    F: Fn(&ReportEvent<'_>) + Send + Sync,
{
    fn on_report(&self, event: &ReportEvent<'_>) {
        self(event)
    }
}

/// Fixed list of subscribers, wired at startup and only read afterwards.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    subscribers: Vec<Arc<dyn ReportSubscriber>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Arc<dyn ReportSubscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn with_subscriber(mut self, subscriber: impl ReportSubscriber + 'static) -> Self {
        self.subscribe(Arc::new(subscriber));
        self
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Calls every subscriber synchronously, in subscription order.
    pub fn dispatch(&self, event: &ReportEvent<'_>) {
        for subscriber in &self.subscribers {
            subscriber.on_report(event);
        }
    }
}
