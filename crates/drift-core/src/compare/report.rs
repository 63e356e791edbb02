//! Drift report data model.

use crate::model::{
    Certificate, Container, CronJob, FileInfo, NetworkInterface, ServiceInfo, UserInfo,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Severity assigned to one drift item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an entry differs between the two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Present only in the target snapshot.
    Added,
    /// Present only in the source snapshot.
    Removed,
    /// Present in both but unequal under the category rule.
    Modified,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Added => "added",
            ChangeType::Removed => "removed",
            ChangeType::Modified => "modified",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot category a drift item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    File,
    Envvar,
    Package,
    Service,
    Network,
    Docker,
    Resources,
    ScheduledTask,
    Certificate,
    User,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::File => "file",
            Category::Envvar => "envvar",
            Category::Package => "package",
            Category::Service => "service",
            Category::Network => "network",
            Category::Docker => "docker",
            Category::Resources => "resources",
            Category::ScheduledTask => "scheduled_task",
            Category::Certificate => "certificate",
            Category::User => "user",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload attached to a drift item's source/target side.
///
/// A tagged-in-Rust, untagged-on-the-wire variant over the shapes the
/// differs actually emit: scalars for single-field changes, the full
/// entity for additions/removals, and a key→scalar map for multi-field
/// detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DriftValue {
    File(FileInfo),
    Service(ServiceInfo),
    Container(Container),
    Interface(NetworkInterface),
    Certificate(Certificate),
    Cron(CronJob),
    User(UserInfo),
    Map(BTreeMap<String, String>),
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<&str> for DriftValue {
    fn from(value: &str) -> Self {
        DriftValue::Str(value.to_string())
    }
}

impl From<String> for DriftValue {
    fn from(value: String) -> Self {
        DriftValue::Str(value)
    }
}

impl From<i64> for DriftValue {
    fn from(value: i64) -> Self {
        DriftValue::Int(value)
    }
}

/// One observed difference between the two snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftItem {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub category: Category,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_value: Option<DriftValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_value: Option<DriftValue>,
    pub severity: Severity,
    pub message: String,
}

/// Rollup statistics over a report's drift items.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriftSummary {
    pub total_drifts: u64,
    pub critical_count: u64,
    pub warning_count: u64,
    pub info_count: u64,
    pub by_category: BTreeMap<String, u64>,
    pub by_type: BTreeMap<String, u64>,
}

/// Complete drift analysis between two snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    /// Opaque RFC 4122 UUID.
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source_env: String,
    pub target_env: String,
    pub source_snapshot: String,
    pub target_snapshot: String,
    pub has_drift: bool,
    pub summary: DriftSummary,
    pub drifts: Vec<DriftItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drift_value_scalar_roundtrip() {
        let value = DriftValue::Str("1.2.3".to_string());
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"1.2.3\"");
        let back: DriftValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_drift_value_map_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert("source".to_string(), "0644".to_string());
        map.insert("target".to_string(), "0600".to_string());
        let value = DriftValue::Map(map.clone());
        let json = serde_json::to_string(&value).unwrap();
        let back: DriftValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DriftValue::Map(map));
    }

    #[test]
    fn test_drift_value_entity_roundtrip() {
        let service = ServiceInfo {
            name: "nginx".to_string(),
            status: crate::model::ServiceStatus::Running,
            enabled: true,
            active_state: "active".to_string(),
            sub_state: "running".to_string(),
            exists: true,
        };
        let value = DriftValue::Service(service.clone());
        let json = serde_json::to_string(&value).unwrap();
        let back: DriftValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DriftValue::Service(service));
    }

    #[test]
    fn test_item_untagged_fields_absent() {
        let item = DriftItem {
            change_type: ChangeType::Added,
            category: Category::Package,
            name: "dpkg:new".to_string(),
            source_value: None,
            target_value: Some(DriftValue::from("0.1")),
            severity: Severity::Warning,
            message: "Package added in target".to_string(),
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"type\":\"added\""));
        assert!(json.contains("\"category\":\"package\""));
        assert!(!json.contains("source_value"));
    }
}
