//! Regex compilation for include/exclude filters.
//!
//! Configuration carries filter patterns as strings. They are compiled once
//! per collection run; patterns that fail to compile are dropped with a
//! warning rather than failing the run.

use regex::Regex;
use tracing::warn;

/// Compile a pattern list, dropping any pattern that does not parse.
pub fn compile_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(err) => {
                warn!(pattern = %pattern, error = %err, "dropping invalid filter pattern");
                None
            }
        })
        .collect()
}

/// Include/exclude filter decision for a name.
///
/// With include patterns configured, the name must match at least one.
/// Any exclude match drops the name regardless.
pub fn matches_filters(name: &str, include: &[Regex], exclude: &[Regex]) -> bool {
    if !include.is_empty() && !include.iter().any(|re| re.is_match(name)) {
        return false;
    }
    !exclude.iter().any(|re| re.is_match(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_invalid_patterns_are_dropped() {
        let compiled = compile_patterns(&patterns(&["^nginx", "[unclosed", "ssh.*"]));
        assert_eq!(compiled.len(), 2);
    }

    #[test]
    fn test_no_include_means_everything() {
        let exclude = compile_patterns(&patterns(&["^snap"]));
        assert!(matches_filters("nginx", &[], &exclude));
        assert!(!matches_filters("snapd", &[], &exclude));
    }

    #[test]
    fn test_include_restricts() {
        let include = compile_patterns(&patterns(&["^ssh", "^nginx$"]));
        assert!(matches_filters("sshd", &include, &[]));
        assert!(matches_filters("nginx", &include, &[]));
        assert!(!matches_filters("cron", &include, &[]));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let include = compile_patterns(&patterns(&["^ssh"]));
        let exclude = compile_patterns(&patterns(&["agent"]));
        assert!(matches_filters("sshd", &include, &exclude));
        assert!(!matches_filters("ssh-agent", &include, &exclude));
    }
}
