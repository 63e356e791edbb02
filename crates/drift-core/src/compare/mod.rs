//! Drift differentiation engine.
//!
//! Reduces two snapshots to a normalized list of additions, removals and
//! modifications across all categories. Each category supplies its own
//! equality rule; severity comes from the configured rules for files,
//! environment variables, packages and services, and is fixed per item
//! kind everywhere else.
//!
//! Reports are deterministic: categories run in a fixed order and entries
//! within a category are visited in ascending key order.

pub mod report;
pub mod severity;

pub use report::{
    Category, ChangeType, DriftItem, DriftReport, DriftSummary, DriftValue, Severity,
};
pub use severity::SeverityRules;

use crate::model::{EnvironmentSnapshot, FileInfo, ServiceInfo};
use drift_config::SeverityRulesConfig;
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// Compare two snapshots with the given severity rules.
pub fn compare(
    source: &EnvironmentSnapshot,
    target: &EnvironmentSnapshot,
    rules: SeverityRulesConfig,
) -> DriftReport {
    Comparator::new(rules).compare(source, target)
}

/// Snapshot comparator.
pub struct Comparator {
    rules: SeverityRules,
}

impl Comparator {
    pub fn new(rules: SeverityRulesConfig) -> Self {
        Self {
            rules: SeverityRules::new(rules),
        }
    }

    /// Produce a drift report between `source` and `target`.
    pub fn compare(
        &self,
        source: &EnvironmentSnapshot,
        target: &EnvironmentSnapshot,
    ) -> DriftReport {
        let mut drifts = Vec::new();

        self.compare_files(source, target, &mut drifts);
        self.compare_env_vars(source, target, &mut drifts);
        self.compare_packages(source, target, &mut drifts);
        self.compare_services(source, target, &mut drifts);
        self.compare_network(source, target, &mut drifts);
        self.compare_docker(source, target, &mut drifts);
        self.compare_resources(source, target, &mut drifts);
        self.compare_scheduled_tasks(source, target, &mut drifts);
        self.compare_certificates(source, target, &mut drifts);
        self.compare_users(source, target, &mut drifts);

        let summary = summarize(&drifts);
        debug!(
            total = summary.total_drifts,
            critical = summary.critical_count,
            "comparison complete"
        );

        DriftReport {
            id: Uuid::new_v4().to_string(),
            timestamp: crate::model::monotonic_utc_now(),
            source_env: source.name.clone(),
            target_env: target.name.clone(),
            source_snapshot: source.id.clone(),
            target_snapshot: target.id.clone(),
            has_drift: !drifts.is_empty(),
            summary,
            drifts,
        }
    }

    fn compare_files(
        &self,
        source: &EnvironmentSnapshot,
        target: &EnvironmentSnapshot,
        drifts: &mut Vec<DriftItem>,
    ) {
        for (path, src) in &source.files {
            match target.files.get(path) {
                Some(tgt) => {
                    let changed = file_changes(src, tgt);
                    if !changed.is_empty() {
                        drifts.push(DriftItem {
                            change_type: ChangeType::Modified,
                            category: Category::File,
                            name: path.clone(),
                            source_value: Some(DriftValue::File(src.clone())),
                            target_value: Some(DriftValue::File(tgt.clone())),
                            severity: self.rules.file(path),
                            message: format!("File modified: {}", changed.join(", ")),
                        });
                    }
                }
                None => drifts.push(DriftItem {
                    change_type: ChangeType::Removed,
                    category: Category::File,
                    name: path.clone(),
                    source_value: Some(DriftValue::File(src.clone())),
                    target_value: None,
                    severity: self.rules.file(path),
                    message: "File exists in source but not in target".to_string(),
                }),
            }
        }

        for (path, tgt) in &target.files {
            if !source.files.contains_key(path) {
                drifts.push(DriftItem {
                    change_type: ChangeType::Added,
                    category: Category::File,
                    name: path.clone(),
                    source_value: None,
                    target_value: Some(DriftValue::File(tgt.clone())),
                    severity: self.rules.file(path),
                    message: "File exists in target but not in source".to_string(),
                });
            }
        }
    }

    fn compare_env_vars(
        &self,
        source: &EnvironmentSnapshot,
        target: &EnvironmentSnapshot,
        drifts: &mut Vec<DriftItem>,
    ) {
        for (name, src) in &source.env_vars {
            match target.env_vars.get(name) {
                Some(tgt) => {
                    if src.value != tgt.value {
                        drifts.push(DriftItem {
                            change_type: ChangeType::Modified,
                            category: Category::Envvar,
                            name: name.clone(),
                            source_value: Some(DriftValue::from(src.value.clone())),
                            target_value: Some(DriftValue::from(tgt.value.clone())),
                            severity: self.rules.env_var(name),
                            message: "Environment variable value changed".to_string(),
                        });
                    }
                }
                None => drifts.push(DriftItem {
                    change_type: ChangeType::Removed,
                    category: Category::Envvar,
                    name: name.clone(),
                    source_value: Some(DriftValue::from(src.value.clone())),
                    target_value: None,
                    severity: self.rules.env_var(name),
                    message: "Environment variable missing in target".to_string(),
                }),
            }
        }

        for (name, tgt) in &target.env_vars {
            if !source.env_vars.contains_key(name) {
                drifts.push(DriftItem {
                    change_type: ChangeType::Added,
                    category: Category::Envvar,
                    name: name.clone(),
                    source_value: None,
                    target_value: Some(DriftValue::from(tgt.value.clone())),
                    severity: self.rules.env_var(name),
                    message: "Environment variable added in target".to_string(),
                });
            }
        }
    }

    fn compare_packages(
        &self,
        source: &EnvironmentSnapshot,
        target: &EnvironmentSnapshot,
        drifts: &mut Vec<DriftItem>,
    ) {
        for (key, src) in &source.packages {
            match target.packages.get(key) {
                Some(tgt) => {
                    if src.version != tgt.version {
                        drifts.push(DriftItem {
                            change_type: ChangeType::Modified,
                            category: Category::Package,
                            name: key.clone(),
                            source_value: Some(DriftValue::from(src.version.clone())),
                            target_value: Some(DriftValue::from(tgt.version.clone())),
                            severity: self.rules.package(key),
                            message: format!(
                                "Package version changed: {} -> {}",
                                src.version, tgt.version
                            ),
                        });
                    }
                }
                None => drifts.push(DriftItem {
                    change_type: ChangeType::Removed,
                    category: Category::Package,
                    name: key.clone(),
                    source_value: Some(DriftValue::from(src.version.clone())),
                    target_value: None,
                    severity: self.rules.package(key),
                    message: "Package missing in target".to_string(),
                }),
            }
        }

        for (key, tgt) in &target.packages {
            if !source.packages.contains_key(key) {
                drifts.push(DriftItem {
                    change_type: ChangeType::Added,
                    category: Category::Package,
                    name: key.clone(),
                    source_value: None,
                    target_value: Some(DriftValue::from(tgt.version.clone())),
                    severity: self.rules.package(key),
                    message: "Package added in target".to_string(),
                });
            }
        }
    }

    fn compare_services(
        &self,
        source: &EnvironmentSnapshot,
        target: &EnvironmentSnapshot,
        drifts: &mut Vec<DriftItem>,
    ) {
        for (name, src) in &source.services {
            match target.services.get(name) {
                Some(tgt) => {
                    let changed = service_changes(src, tgt);
                    if !changed.is_empty() {
                        drifts.push(DriftItem {
                            change_type: ChangeType::Modified,
                            category: Category::Service,
                            name: name.clone(),
                            source_value: Some(DriftValue::Service(src.clone())),
                            target_value: Some(DriftValue::Service(tgt.clone())),
                            severity: self.rules.service(name),
                            message: format!("Service state changed: {}", changed.join(", ")),
                        });
                    }
                }
                None => drifts.push(DriftItem {
                    change_type: ChangeType::Removed,
                    category: Category::Service,
                    name: name.clone(),
                    source_value: Some(DriftValue::Service(src.clone())),
                    target_value: None,
                    severity: self.rules.service(name),
                    message: "Service missing in target".to_string(),
                }),
            }
        }

        for (name, tgt) in &target.services {
            if !source.services.contains_key(name) {
                drifts.push(DriftItem {
                    change_type: ChangeType::Added,
                    category: Category::Service,
                    name: name.clone(),
                    source_value: None,
                    target_value: Some(DriftValue::Service(tgt.clone())),
                    severity: self.rules.service(name),
                    message: "Service added in target".to_string(),
                });
            }
        }
    }

    fn compare_network(
        &self,
        source: &EnvironmentSnapshot,
        target: &EnvironmentSnapshot,
        drifts: &mut Vec<DriftItem>,
    ) {
        for (name, src) in &source.network.interfaces {
            match target.network.interfaces.get(name) {
                Some(tgt) => {
                    if src.mac_address != tgt.mac_address {
                        drifts.push(DriftItem {
                            change_type: ChangeType::Modified,
                            category: Category::Network,
                            name: format!("{name} (interface)"),
                            source_value: Some(DriftValue::from(src.mac_address.clone())),
                            target_value: Some(DriftValue::from(tgt.mac_address.clone())),
                            severity: Severity::Warning,
                            message: "Interface MAC address changed".to_string(),
                        });
                    }
                }
                None => drifts.push(DriftItem {
                    change_type: ChangeType::Removed,
                    category: Category::Network,
                    name: format!("{name} (interface)"),
                    source_value: Some(DriftValue::Interface(src.clone())),
                    target_value: None,
                    severity: Severity::Warning,
                    message: "Interface removed".to_string(),
                }),
            }
        }

        for (name, tgt) in &target.network.interfaces {
            if !source.network.interfaces.contains_key(name) {
                drifts.push(DriftItem {
                    change_type: ChangeType::Added,
                    category: Category::Network,
                    name: format!("{name} (interface)"),
                    source_value: None,
                    target_value: Some(DriftValue::Interface(tgt.clone())),
                    severity: Severity::Warning,
                    message: "Interface added".to_string(),
                });
            }
        }
    }

    fn compare_docker(
        &self,
        source: &EnvironmentSnapshot,
        target: &EnvironmentSnapshot,
        drifts: &mut Vec<DriftItem>,
    ) {
        for (id, src) in &source.docker.containers {
            match target.docker.containers.get(id) {
                Some(tgt) => {
                    if src.status != tgt.status || src.state != tgt.state {
                        drifts.push(DriftItem {
                            change_type: ChangeType::Modified,
                            category: Category::Docker,
                            name: src.name.clone(),
                            source_value: Some(DriftValue::from(format!(
                                "{} {}",
                                src.status, src.state
                            ))),
                            target_value: Some(DriftValue::from(format!(
                                "{} {}",
                                tgt.status, tgt.state
                            ))),
                            severity: Severity::Warning,
                            message: "Container status/state changed".to_string(),
                        });
                    }
                }
                None => drifts.push(DriftItem {
                    change_type: ChangeType::Removed,
                    category: Category::Docker,
                    name: src.name.clone(),
                    source_value: Some(DriftValue::Container(src.clone())),
                    target_value: None,
                    severity: Severity::Info,
                    message: "Container removed".to_string(),
                }),
            }
        }

        for (id, tgt) in &target.docker.containers {
            if !source.docker.containers.contains_key(id) {
                drifts.push(DriftItem {
                    change_type: ChangeType::Added,
                    category: Category::Docker,
                    name: tgt.name.clone(),
                    source_value: None,
                    target_value: Some(DriftValue::Container(tgt.clone())),
                    severity: Severity::Info,
                    message: "Container added".to_string(),
                });
            }
        }
    }

    fn compare_resources(
        &self,
        source: &EnvironmentSnapshot,
        target: &EnvironmentSnapshot,
        drifts: &mut Vec<DriftItem>,
    ) {
        let src = &source.system_resources;
        let tgt = &target.system_resources;

        if src.cpu.cores != tgt.cpu.cores {
            drifts.push(DriftItem {
                change_type: ChangeType::Modified,
                category: Category::Resources,
                name: "CPU cores".to_string(),
                source_value: Some(DriftValue::Int(src.cpu.cores as i64)),
                target_value: Some(DriftValue::Int(tgt.cpu.cores as i64)),
                severity: Severity::Critical,
                message: "CPU core count changed".to_string(),
            });
        }

        if src.memory.total != tgt.memory.total {
            drifts.push(DriftItem {
                change_type: ChangeType::Modified,
                category: Category::Resources,
                name: "Memory total".to_string(),
                source_value: Some(DriftValue::Int(src.memory.total as i64)),
                target_value: Some(DriftValue::Int(tgt.memory.total as i64)),
                severity: Severity::Critical,
                message: "Total memory changed".to_string(),
            });
        }
    }

    fn compare_scheduled_tasks(
        &self,
        source: &EnvironmentSnapshot,
        target: &EnvironmentSnapshot,
        drifts: &mut Vec<DriftItem>,
    ) {
        for (key, src) in &source.scheduled_tasks.cron_jobs {
            match target.scheduled_tasks.cron_jobs.get(key) {
                Some(tgt) => {
                    if src.schedule != tgt.schedule || src.command != tgt.command {
                        drifts.push(DriftItem {
                            change_type: ChangeType::Modified,
                            category: Category::ScheduledTask,
                            name: format!("{key} (cron)"),
                            source_value: Some(DriftValue::from(src.command.clone())),
                            target_value: Some(DriftValue::from(tgt.command.clone())),
                            severity: Severity::Warning,
                            message: "Cron job changed".to_string(),
                        });
                    }
                }
                None => drifts.push(DriftItem {
                    change_type: ChangeType::Removed,
                    category: Category::ScheduledTask,
                    name: format!("{key} (cron)"),
                    source_value: Some(DriftValue::Cron(src.clone())),
                    target_value: None,
                    severity: Severity::Warning,
                    message: "Cron job removed".to_string(),
                }),
            }
        }

        for (key, tgt) in &target.scheduled_tasks.cron_jobs {
            if !source.scheduled_tasks.cron_jobs.contains_key(key) {
                drifts.push(DriftItem {
                    change_type: ChangeType::Added,
                    category: Category::ScheduledTask,
                    name: format!("{key} (cron)"),
                    source_value: None,
                    target_value: Some(DriftValue::Cron(tgt.clone())),
                    severity: Severity::Warning,
                    message: "Cron job added".to_string(),
                });
            }
        }
    }

    fn compare_certificates(
        &self,
        source: &EnvironmentSnapshot,
        target: &EnvironmentSnapshot,
        drifts: &mut Vec<DriftItem>,
    ) {
        for (key, src) in &source.certificates {
            match target.certificates.get(key) {
                Some(tgt) => {
                    if src.fingerprint != tgt.fingerprint {
                        drifts.push(DriftItem {
                            change_type: ChangeType::Modified,
                            category: Category::Certificate,
                            name: key.clone(),
                            source_value: Some(DriftValue::from(src.fingerprint.clone())),
                            target_value: Some(DriftValue::from(tgt.fingerprint.clone())),
                            severity: Severity::Warning,
                            message: "Certificate changed".to_string(),
                        });
                    }
                    if !src.is_expired && tgt.is_expired {
                        drifts.push(DriftItem {
                            change_type: ChangeType::Modified,
                            category: Category::Certificate,
                            name: key.clone(),
                            source_value: Some(DriftValue::from("valid")),
                            target_value: Some(DriftValue::from("expired")),
                            severity: Severity::Critical,
                            message: "Certificate expired".to_string(),
                        });
                    }
                }
                None => drifts.push(DriftItem {
                    change_type: ChangeType::Removed,
                    category: Category::Certificate,
                    name: key.clone(),
                    source_value: Some(DriftValue::Certificate(src.clone())),
                    target_value: None,
                    severity: Severity::Warning,
                    message: "Certificate removed".to_string(),
                }),
            }
        }

        for (key, tgt) in &target.certificates {
            if !source.certificates.contains_key(key) {
                drifts.push(DriftItem {
                    change_type: ChangeType::Added,
                    category: Category::Certificate,
                    name: key.clone(),
                    source_value: None,
                    target_value: Some(DriftValue::Certificate(tgt.clone())),
                    severity: Severity::Info,
                    message: "Certificate added".to_string(),
                });
            }
        }
    }

    fn compare_users(
        &self,
        source: &EnvironmentSnapshot,
        target: &EnvironmentSnapshot,
        drifts: &mut Vec<DriftItem>,
    ) {
        for (name, src) in &source.users_groups.users {
            match target.users_groups.users.get(name) {
                Some(tgt) => {
                    if src.uid != tgt.uid {
                        drifts.push(DriftItem {
                            change_type: ChangeType::Modified,
                            category: Category::User,
                            name: name.clone(),
                            source_value: Some(DriftValue::Int(src.uid as i64)),
                            target_value: Some(DriftValue::Int(tgt.uid as i64)),
                            severity: Severity::Warning,
                            message: "User UID changed".to_string(),
                        });
                    }
                }
                None => drifts.push(DriftItem {
                    change_type: ChangeType::Removed,
                    category: Category::User,
                    name: name.clone(),
                    source_value: Some(DriftValue::User(src.clone())),
                    target_value: None,
                    severity: Severity::Warning,
                    message: "User removed".to_string(),
                }),
            }
        }

        for (name, tgt) in &target.users_groups.users {
            if !source.users_groups.users.contains_key(name) {
                drifts.push(DriftItem {
                    change_type: ChangeType::Added,
                    category: Category::User,
                    name: name.clone(),
                    source_value: None,
                    target_value: Some(DriftValue::User(tgt.clone())),
                    severity: Severity::Warning,
                    message: "User added".to_string(),
                });
            }
        }
    }
}

/// Field names that differ between two file records. Hash differences
/// only count when both sides carry a hash.
fn file_changes(src: &FileInfo, tgt: &FileInfo) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if src.hash != tgt.hash && !src.hash.is_empty() && !tgt.hash.is_empty() {
        changed.push("hash");
    }
    if src.mode != tgt.mode {
        changed.push("mode");
    }
    if src.owner != tgt.owner {
        changed.push("owner");
    }
    if src.group != tgt.group {
        changed.push("group");
    }
    changed
}

/// Human-readable deltas for a changed service.
fn service_changes(src: &ServiceInfo, tgt: &ServiceInfo) -> Vec<String> {
    let mut changed = Vec::new();
    if src.status != tgt.status {
        changed.push(format!("status: {} -> {}", src.status, tgt.status));
    }
    if src.enabled != tgt.enabled {
        changed.push(format!("enabled: {} -> {}", src.enabled, tgt.enabled));
    }
    changed
}

/// Roll a drift list up into summary counters.
fn summarize(drifts: &[DriftItem]) -> DriftSummary {
    let mut summary = DriftSummary {
        total_drifts: drifts.len() as u64,
        by_category: BTreeMap::new(),
        by_type: BTreeMap::new(),
        ..Default::default()
    };

    for item in drifts {
        match item.severity {
            Severity::Critical => summary.critical_count += 1,
            Severity::Warning => summary.warning_count += 1,
            Severity::Info => summary.info_count += 1,
        }
        *summary
            .by_category
            .entry(item.category.as_str().to_string())
            .or_insert(0) += 1;
        *summary
            .by_type
            .entry(item.change_type.as_str().to_string())
            .or_insert(0) += 1;
    }

    summary
}
