//! Environment variable collector for the current process.
//!
//! Each entry is split at the first `=`. Include patterns (when present)
//! gate names in, exclude patterns drop them, and values whose names look
//! sensitive are masked before they reach the snapshot.

use crate::model::EnvVar;
use drift_common::{CollectError, Deadline};
use drift_config::{compile_patterns, matches_filters, EnvVarsConfig};
use drift_redact::{is_secret_name, mask_value};
use regex::Regex;
use std::collections::BTreeMap;

/// Collect the filtered, masked process environment.
pub fn collect_env_vars(
    config: &EnvVarsConfig,
    deadline: &Deadline,
) -> (BTreeMap<String, EnvVar>, Option<CollectError>) {
    let include = compile_patterns(&config.include);
    let exclude = compile_patterns(&config.exclude);

    let mut vars = BTreeMap::new();
    for (name, value) in std::env::vars() {
        if deadline.check().is_err() {
            return (vars, Some(CollectError::Cancelled));
        }
        if let Some(var) = build_env_var(&name, &value, &include, &exclude, config.mask_secrets) {
            vars.insert(name, var);
        }
    }

    (vars, None)
}

/// Apply filters and masking to one name/value pair.
pub(crate) fn build_env_var(
    name: &str,
    value: &str,
    include: &[Regex],
    exclude: &[Regex],
    mask_secrets: bool,
) -> Option<EnvVar> {
    if !matches_filters(name, include, exclude) {
        return None;
    }

    let value = if mask_secrets && is_secret_name(name) {
        mask_value(value)
    } else {
        value.to_string()
    };

    Some(EnvVar {
        name: name.to_string(),
        value,
        exists: true,
    })
}
