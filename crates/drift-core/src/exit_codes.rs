//! Exit codes for drift comparison outcomes.
//!
//! These codes are a stable contract for automation: callers can branch on
//! the exit status without parsing report output.

use crate::compare::{DriftReport, Severity};

/// Exit codes derived from a drift report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// No drift detected.
    Clean = 0,

    /// Drift detected, none of it critical.
    Drift = 1,

    /// At least one critical drift item.
    CriticalDrift = 2,
}

impl ExitCode {
    /// Map a report to its exit code.
    pub fn from_report(report: &DriftReport) -> Self {
        if !report.has_drift {
            ExitCode::Clean
        } else if report
            .drifts
            .iter()
            .any(|item| item.severity == Severity::Critical)
        {
            ExitCode::CriticalDrift
        } else {
            ExitCode::Drift
        }
    }

    /// The numeric process exit status.
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<&DriftReport> for ExitCode {
    fn from(report: &DriftReport) -> Self {
        ExitCode::from_report(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{Category, ChangeType, DriftItem, DriftSummary};
    use chrono::Utc;

    fn report_with(severities: &[Severity]) -> DriftReport {
        let drifts: Vec<DriftItem> = severities
            .iter()
            .map(|&severity| DriftItem {
                change_type: ChangeType::Modified,
                category: Category::Package,
                name: "dpkg:x".to_string(),
                source_value: None,
                target_value: None,
                severity,
                message: String::new(),
            })
            .collect();
        DriftReport {
            id: "r".to_string(),
            timestamp: Utc::now(),
            source_env: "a".to_string(),
            target_env: "b".to_string(),
            source_snapshot: "s".to_string(),
            target_snapshot: "t".to_string(),
            has_drift: !drifts.is_empty(),
            summary: DriftSummary::default(),
            drifts,
        }
    }

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(ExitCode::from_report(&report_with(&[])), ExitCode::Clean);
        assert_eq!(
            ExitCode::from_report(&report_with(&[Severity::Warning, Severity::Info])),
            ExitCode::Drift
        );
        assert_eq!(
            ExitCode::from_report(&report_with(&[Severity::Warning, Severity::Critical])),
            ExitCode::CriticalDrift
        );
    }

    #[test]
    fn test_numeric_codes() {
        assert_eq!(ExitCode::Clean.code(), 0);
        assert_eq!(ExitCode::Drift.code(), 1);
        assert_eq!(ExitCode::CriticalDrift.code(), 2);
    }
}
