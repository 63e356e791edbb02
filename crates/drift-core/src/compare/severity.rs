//! Severity classification rules.
//!
//! Files, environment variables, packages and services consult the
//! configured critical lists; a pattern hit (`*` or exact name) promotes
//! the item to critical. Everything else falls back to the category
//! default: info for files, warning for the other three.

use super::report::Severity;
use drift_common::pattern::matches_any;
use drift_config::SeverityRulesConfig;

/// Compiled severity rules for one comparison run.
#[derive(Debug, Clone, Default)]
pub struct SeverityRules {
    rules: SeverityRulesConfig,
}

impl SeverityRules {
    pub fn new(rules: SeverityRulesConfig) -> Self {
        Self { rules }
    }

    pub fn file(&self, path: &str) -> Severity {
        if matches_any(path, &self.rules.critical_files) {
            Severity::Critical
        } else {
            Severity::Info
        }
    }

    pub fn env_var(&self, name: &str) -> Severity {
        if matches_any(name, &self.rules.critical_env_vars) {
            Severity::Critical
        } else {
            Severity::Warning
        }
    }

    /// `name` is the composite `manager:name` snapshot key.
    pub fn package(&self, name: &str) -> Severity {
        if matches_any(name, &self.rules.critical_packages) {
            Severity::Critical
        } else {
            Severity::Warning
        }
    }

    pub fn service(&self, name: &str) -> Severity {
        if matches_any(name, &self.rules.critical_services) {
            Severity::Critical
        } else {
            Severity::Warning
        }
    }
}
