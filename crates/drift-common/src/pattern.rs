//! Pattern matching for severity rules.
//!
//! Severity rule lists (`critical_packages`, `critical_services`,
//! `critical_files`, `critical_env_vars`) support exactly two forms:
//! `"*"` matches everything, anything else matches by string equality.

/// Match `name` against a severity-rule pattern.
pub fn match_pattern(name: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    name == pattern
}

/// Whether any pattern in `patterns` matches `name`.
pub fn matches_any(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| match_pattern(name, p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_everything() {
        assert!(match_pattern("nginx", "*"));
        assert!(match_pattern("", "*"));
    }

    #[test]
    fn test_exact_equality() {
        assert!(match_pattern("dpkg:libc", "dpkg:libc"));
        assert!(!match_pattern("dpkg:libc6", "dpkg:libc"));
        assert!(!match_pattern("nginx", "ngin*"));
    }

    #[test]
    fn test_matches_any() {
        let rules = vec!["sshd".to_string(), "nginx".to_string()];
        assert!(matches_any("nginx", &rules));
        assert!(!matches_any("cron", &rules));
        assert!(!matches_any("anything", &[]));
    }
}
