pub mod config;
pub mod csp;
pub mod digest;
pub mod policy;
pub mod report;
pub mod routes;
pub mod template;

use std::sync::Arc;

use config::{Config, ConfigError};
use report::logger::ReportLogger;
use report::{EventDispatcher, NoiseFilter, ReportPipeline};
use template::{Template, TemplateError};

/// Page source for `/`, compiled once at startup.
pub const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to compile page template: {0}")]
    Template(#[from] TemplateError),
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub reports: Arc<ReportPipeline>,
    pub index: Arc<Template>,
}

impl AppState {
    /// Wires the report pipeline from `config`, with `dispatcher` as the set of
    /// report subscribers.
    pub fn from_config(config: Config, dispatcher: EventDispatcher) -> Result<Self, StartupError> {
        config.validate()?;

        let filter = NoiseFilter::from_config(&config.noise).map_err(ConfigError::from)?;
        let logger = ReportLogger::new(config.log_level);
        let index = Template::compile(INDEX_TEMPLATE)?;

        tracing::debug!(
            detectors = filter.len(),
            subscribers = dispatcher.len(),
            static_blocks = index.inline_blocks().filter(|b| b.is_static()).count(),
            "report pipeline ready"
        );

        Ok(Self {
            config: Arc::new(config),
            reports: Arc::new(ReportPipeline::new(filter, dispatcher, logger)),
            index: Arc::new(index),
        })
    }
}
