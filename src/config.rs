use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::report::logger::Severity;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid domain pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("report_uri must be an absolute path without whitespace, control characters, `;` or `,`, got {0:?}")]
    ReportUri(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Whether pages may ask for a per-request nonce.
    pub nonce_enabled: bool,
    /// Send `Content-Security-Policy-Report-Only` instead of enforcing.
    pub report_only: bool,
    /// Path the report endpoint is mounted on, also used as `report-uri`.
    pub report_uri: String,
    /// Severity accepted reports are logged at.
    pub log_level: Severity,
    pub noise: NoiseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nonce_enabled: true,
            report_only: false,
            report_uri: "/csp/report".to_string(),
            log_level: Severity::Notice,
            noise: NoiseConfig::default(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Checks values that end up verbatim in the CSP header.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let uri = &self.report_uri;
        let bad_char = |c: char| c.is_control() || c.is_whitespace() || c == ';' || c == ',';
        if !uri.starts_with('/') || uri.chars().any(bad_char) {
            return Err(ConfigError::ReportUri(uri.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub schemes: Vec<String>,
    pub domains: Vec<String>,
    pub domain_patterns: Vec<String>,
    pub injected_scripts: Vec<String>,
    /// Host to directives reported from it that should be ignored.
    pub custom_rules: HashMap<String, Vec<String>>,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            schemes: [
                "chrome-extension",
                "moz-extension",
                "safari-extension",
                "safari-web-extension",
                "ms-browser-extension",
                "resource",
                "view-source",
            ]
            .map(String::from)
            .to_vec(),
            domains: Vec::new(),
            domain_patterns: Vec::new(),
            injected_scripts: ["__firefox__", "_gCrWeb", "__gCrWeb", "ucapi"]
                .map(String::from)
                .to_vec(),
            custom_rules: HashMap::new(),
        }
    }
}
