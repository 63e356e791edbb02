//! Property tests for the comparator: identity, summary consistency,
//! and insertion-order independence.

use drift_config::SeverityRulesConfig;
use drift_core::compare::{self, ChangeType};
use drift_core::model::{EnvVar, EnvironmentSnapshot, PackageInfo};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn snapshot_with_env(name: &str, env: &BTreeMap<String, String>) -> EnvironmentSnapshot {
    let mut snapshot = EnvironmentSnapshot {
        id: format!("id-{name}"),
        name: name.to_string(),
        ..Default::default()
    };
    for (key, value) in env {
        snapshot.env_vars.insert(
            key.clone(),
            EnvVar {
                name: key.clone(),
                value: value.clone(),
                exists: true,
            },
        );
    }
    snapshot
}

fn env_map() -> impl Strategy<Value = BTreeMap<String, String>> {
    proptest::collection::btree_map("[A-Z_]{1,12}", "[a-z0-9/:]{0,16}", 0..12)
}

proptest! {
    #[test]
    fn self_comparison_is_always_clean(env in env_map()) {
        let snapshot = snapshot_with_env("self", &env);
        let report = compare::compare(&snapshot, &snapshot, SeverityRulesConfig::default());
        prop_assert!(!report.has_drift);
        prop_assert_eq!(report.drifts.len(), 0);
    }

    #[test]
    fn summary_counters_always_consistent(
        source_env in env_map(),
        target_env in env_map(),
    ) {
        let source = snapshot_with_env("source", &source_env);
        let target = snapshot_with_env("target", &target_env);
        let report = compare::compare(&source, &target, SeverityRulesConfig::default());

        prop_assert_eq!(report.summary.total_drifts, report.drifts.len() as u64);
        prop_assert_eq!(
            report.summary.critical_count
                + report.summary.warning_count
                + report.summary.info_count,
            report.summary.total_drifts
        );
        let by_type_total: u64 = report.summary.by_type.values().sum();
        prop_assert_eq!(by_type_total, report.summary.total_drifts);
        let by_category_total: u64 = report.summary.by_category.values().sum();
        prop_assert_eq!(by_category_total, report.summary.total_drifts);
        prop_assert_eq!(report.has_drift, !report.drifts.is_empty());
    }

    #[test]
    fn drift_set_matches_env_set_difference(
        source_env in env_map(),
        target_env in env_map(),
    ) {
        let source = snapshot_with_env("source", &source_env);
        let target = snapshot_with_env("target", &target_env);
        let report = compare::compare(&source, &target, SeverityRulesConfig::default());

        for item in &report.drifts {
            match item.change_type {
                ChangeType::Added => {
                    prop_assert!(!source_env.contains_key(&item.name));
                    prop_assert!(target_env.contains_key(&item.name));
                    prop_assert!(item.source_value.is_none());
                    prop_assert!(item.target_value.is_some());
                }
                ChangeType::Removed => {
                    prop_assert!(source_env.contains_key(&item.name));
                    prop_assert!(!target_env.contains_key(&item.name));
                    prop_assert!(item.source_value.is_some());
                    prop_assert!(item.target_value.is_none());
                }
                ChangeType::Modified => {
                    prop_assert_ne!(&source_env[&item.name], &target_env[&item.name]);
                    prop_assert!(item.source_value.is_some());
                    prop_assert!(item.target_value.is_some());
                }
            }
        }
    }
}

#[test]
fn insertion_order_does_not_change_drift_set() {
    let packages = [
        ("dpkg:zlib", "1.3"),
        ("dpkg:openssl", "3.1.4"),
        ("dpkg:curl", "8.5.0"),
    ];

    let build = |order: &[usize], bump_curl: bool| {
        let mut snapshot = EnvironmentSnapshot {
            id: "s".to_string(),
            name: "pkgs".to_string(),
            ..Default::default()
        };
        for &i in order {
            let (key, version) = packages[i];
            let version = if bump_curl && key.ends_with("curl") {
                "8.6.0"
            } else {
                version
            };
            snapshot.packages.insert(
                key.to_string(),
                PackageInfo {
                    name: key.split(':').nth(1).unwrap().to_string(),
                    version: version.to_string(),
                    manager: "dpkg".to_string(),
                    exists: true,
                    ..Default::default()
                },
            );
        }
        snapshot
    };

    let report_forward = compare::compare(
        &build(&[0, 1, 2], false),
        &build(&[0, 1, 2], true),
        SeverityRulesConfig::default(),
    );
    let report_shuffled = compare::compare(
        &build(&[2, 0, 1], false),
        &build(&[1, 2, 0], true),
        SeverityRulesConfig::default(),
    );

    let key = |report: &drift_core::DriftReport| {
        let mut keys: Vec<String> = report
            .drifts
            .iter()
            .map(|d| format!("{}/{}/{}", d.change_type, d.category, d.name))
            .collect();
        keys.sort();
        keys
    };
    assert_eq!(key(&report_forward), key(&report_shuffled));
    assert_eq!(report_forward.drifts.len(), 1);
    assert_eq!(report_forward.drifts[0].name, "dpkg:curl");
}
