//! Built-in noise detectors for the reports browsers send on their own behalf:
//! extensions, injected helper scripts, known third-party hosts.

use std::collections::{HashMap, HashSet};

use regex::RegexSet;

use super::filter::{NoiseDetector, NoiseFilter};
use super::{ReportContext, ViolationReport};
use crate::config::NoiseConfig;

/// Matches on the scheme of the blocked URI (`chrome-extension`, `moz-extension`, ...).
pub struct SchemesNoiseDetector {
    schemes: HashSet<String>,
}

impl SchemesNoiseDetector {
    pub fn new<I, S>(schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            schemes: schemes
                .into_iter()
                .map(|s| s.as_ref().trim_end_matches(':').to_lowercase())
                .collect(),
        }
    }
}

impl NoiseDetector for SchemesNoiseDetector {
    fn name(&self) -> &str {
        "schemes"
    }

    fn detect(&self, _context: &ReportContext, report: &ViolationReport) -> bool {
        report
            .scheme()
            .map_or(false, |scheme| self.schemes.contains(&scheme))
    }
}

/// Matches blocked URIs whose host is in a fixed list.
pub struct DomainsNoiseDetector {
    domains: HashSet<String>,
}

impl DomainsNoiseDetector {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains.into_iter().map(|d| d.as_ref().to_lowercase()).collect(),
        }
    }
}

impl NoiseDetector for DomainsNoiseDetector {
    fn name(&self) -> &str {
        "domains"
    }

    fn detect(&self, _context: &ReportContext, report: &ViolationReport) -> bool {
        report
            .domain()
            .map_or(false, |domain| self.domains.contains(&domain))
    }
}

/// Matches blocked URI hosts against regular expressions.
pub struct DomainPatternsNoiseDetector {
    patterns: RegexSet,
}

impl DomainPatternsNoiseDetector {
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            patterns: RegexSet::new(patterns)?,
        })
    }
}

impl NoiseDetector for DomainPatternsNoiseDetector {
    fn name(&self) -> &str {
        "domain_patterns"
    }

    fn detect(&self, _context: &ReportContext, report: &ViolationReport) -> bool {
        report
            .domain()
            .map_or(false, |domain| self.patterns.is_match(&domain))
    }
}

/// Matches reports whose script sample or source file carries a marker left by
/// code the browser or an extension injected into the page.
pub struct InjectedScriptsNoiseDetector {
    markers: Vec<String>,
}

impl InjectedScriptsNoiseDetector {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }
}

impl NoiseDetector for InjectedScriptsNoiseDetector {
    fn name(&self) -> &str {
        "injected_scripts"
    }

    fn detect(&self, _context: &ReportContext, report: &ViolationReport) -> bool {
        [report.script_sample(), report.source_file()]
            .into_iter()
            .flatten()
            .any(|text| self.markers.iter().any(|marker| text.contains(marker.as_str())))
    }
}

/// Per-host directive allowlist: a report is noise when its host is listed and
/// its directive is one of the host's entries (`*` matches every directive).
pub struct CustomRulesNoiseDetector {
    rules: HashMap<String, Vec<String>>,
}

impl CustomRulesNoiseDetector {
    pub fn new(rules: HashMap<String, Vec<String>>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|(domain, directives)| (domain.to_lowercase(), directives))
                .collect(),
        }
    }
}

impl NoiseDetector for CustomRulesNoiseDetector {
    fn name(&self) -> &str {
        "custom_rules"
    }

    fn detect(&self, _context: &ReportContext, report: &ViolationReport) -> bool {
        let Some(directives) = report.domain().and_then(|domain| self.rules.get(&domain)) else {
            return false;
        };
        let directive = report.directive();
        directives
            .iter()
            .any(|d| d == "*" || Some(d.as_str()) == directive)
    }
}

impl NoiseFilter {
    /// Builds the filter from configuration, cheapest detectors first.
    pub fn from_config(config: &NoiseConfig) -> Result<Self, regex::Error> {
        let mut filter = NoiseFilter::new();

        if !config.schemes.is_empty() {
            filter.register(SchemesNoiseDetector::new(&config.schemes));
        }
        if !config.domains.is_empty() {
            filter.register(DomainsNoiseDetector::new(&config.domains));
        }
        if !config.custom_rules.is_empty() {
            filter.register(CustomRulesNoiseDetector::new(config.custom_rules.clone()));
        }
        if !config.injected_scripts.is_empty() {
            filter.register(InjectedScriptsNoiseDetector::new(config.injected_scripts.clone()));
        }
        if !config.domain_patterns.is_empty() {
            filter.register(DomainPatternsNoiseDetector::new(&config.domain_patterns)?);
        }

        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(fields: &str) -> ViolationReport {
        ViolationReport::from_request_body(format!(r#"{{"csp-report":{}}}"#, fields).as_bytes()).unwrap()
    }

    fn ctx() -> ReportContext {
        ReportContext::default()
    }

    #[test]
    fn test_schemes() {
        let detector = SchemesNoiseDetector::new(["chrome-extension", "moz-extension:"]);
        assert!(detector.detect(&ctx(), &report(r#"{"blocked-uri":"chrome-extension://abc/x.js"}"#)));
        assert!(detector.detect(&ctx(), &report(r#"{"blocked-uri":"MOZ-EXTENSION://abc/x.js"}"#)));
        assert!(!detector.detect(&ctx(), &report(r#"{"blocked-uri":"https://abc/x.js"}"#)));
        assert!(!detector.detect(&ctx(), &report(r#"{"blocked-uri":"inline"}"#)));
    }

    #[test]
    fn test_domains() {
        let detector = DomainsNoiseDetector::new(["Ads.Example"]);
        assert!(detector.detect(&ctx(), &report(r#"{"blocked-uri":"https://ads.example/t.js"}"#)));
        assert!(!detector.detect(&ctx(), &report(r#"{"blocked-uri":"https://cdn.ads.example/t.js"}"#)));
        assert!(!detector.detect(&ctx(), &report(r#"{"violated-directive":"img-src"}"#)));
    }

    #[test]
    fn test_domain_patterns() {
        let detector = DomainPatternsNoiseDetector::new([r"(^|\.)tracker\.example$"]).unwrap();
        assert!(detector.detect(&ctx(), &report(r#"{"blocked-uri":"https://eu.tracker.example/p"}"#)));
        assert!(detector.detect(&ctx(), &report(r#"{"blocked-uri":"https://tracker.example/p"}"#)));
        assert!(!detector.detect(&ctx(), &report(r#"{"blocked-uri":"https://nottracker.example/p"}"#)));
    }

    #[test]
    fn test_domain_patterns_reject_bad_regex() {
        assert!(DomainPatternsNoiseDetector::new(["("]).is_err());
    }

    #[test]
    fn test_injected_scripts() {
        let detector = InjectedScriptsNoiseDetector::new(["__firefox__"]);
        assert!(detector.detect(
            &ctx(),
            &report(r#"{"blocked-uri":"inline","script-sample":"window.__firefox__.reader"}"#)
        ));
        assert!(detector.detect(
            &ctx(),
            &report(r#"{"blocked-uri":"inline","source-file":"https://x/__firefox__.js"}"#)
        ));
        assert!(!detector.detect(&ctx(), &report(r#"{"blocked-uri":"inline","script-sample":"alert(1)"}"#)));
    }

    #[test]
    fn test_custom_rules() {
        let rules = HashMap::from([
            ("fonts.example".to_string(), vec!["font-src".to_string()]),
            ("any.example".to_string(), vec!["*".to_string()]),
        ]);
        let detector = CustomRulesNoiseDetector::new(rules);
        assert!(detector.detect(
            &ctx(),
            &report(r#"{"blocked-uri":"https://fonts.example/a.woff","violated-directive":"font-src 'self'"}"#)
        ));
        assert!(!detector.detect(
            &ctx(),
            &report(r#"{"blocked-uri":"https://fonts.example/a.js","violated-directive":"script-src 'self'"}"#)
        ));
        assert!(detector.detect(
            &ctx(),
            &report(r#"{"blocked-uri":"https://any.example/a.js","effective-directive":"script-src-elem"}"#)
        ));
    }

    #[test]
    fn test_from_config_defaults() {
        let filter = NoiseFilter::from_config(&NoiseConfig::default()).unwrap();
        assert!(filter.filter(&ctx(), &report(r#"{"blocked-uri":"chrome-extension://abc/x.js"}"#)));
        assert!(!filter.filter(
            &ctx(),
            &report(r#"{"blocked-uri":"https://evil.example/x.js","violated-directive":"script-src 'self'"}"#)
        ));
    }

    #[test]
    fn test_from_config_skips_empty_lists() {
        let config = NoiseConfig {
            schemes: Vec::new(),
            injected_scripts: Vec::new(),
            ..NoiseConfig::default()
        };
        assert!(NoiseFilter::from_config(&config).unwrap().is_empty());
    }
}
