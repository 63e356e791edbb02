//! Core host entities: files, environment variables, packages, services.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Metadata for one walked filesystem entry.
///
/// The hash is empty when hashing was skipped: directories, files of
/// 100 MiB or more, and files that could not be read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    pub hash: String,
    pub size: u64,
    /// Textual `ls -l` style mode (`-rw-r--r--`).
    pub mode: String,
    pub mod_time: Option<DateTime<Utc>>,
    /// Owner name; empty when UID lookup fails.
    pub owner: String,
    /// Group name; empty when GID lookup fails.
    pub group: String,
    pub is_directory: bool,
    pub exists: bool,
}

/// One environment variable, possibly with a masked value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
    pub exists: bool,
}

/// Environment of one foreign process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessEnvVar {
    pub pid: u32,
    pub cmdline: String,
    pub env_vars: BTreeMap<String, EnvVar>,
}

/// One installed package. Snapshot keys embed the manager
/// (`manager:name`) so the same name under two managers never collides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub architecture: String,
    pub manager: String,
    pub exists: bool,
}

/// Normalized service run state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Running,
    Stopped,
    Failed,
    #[default]
    Unknown,
}

impl ServiceStatus {
    /// Map a systemd ACTIVE column value to a status.
    pub fn from_active_state(state: &str) -> Self {
        match state {
            "active" => ServiceStatus::Running,
            "inactive" => ServiceStatus::Stopped,
            "failed" => ServiceStatus::Failed,
            _ => ServiceStatus::Unknown,
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServiceStatus::Running => "running",
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Failed => "failed",
            ServiceStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// One system service under the host's init system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub status: ServiceStatus,
    /// Whether the service starts on boot.
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub active_state: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sub_state: String,
    pub exists: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_status_mapping() {
        assert_eq!(
            ServiceStatus::from_active_state("active"),
            ServiceStatus::Running
        );
        assert_eq!(
            ServiceStatus::from_active_state("inactive"),
            ServiceStatus::Stopped
        );
        assert_eq!(
            ServiceStatus::from_active_state("failed"),
            ServiceStatus::Failed
        );
        assert_eq!(
            ServiceStatus::from_active_state("activating"),
            ServiceStatus::Unknown
        );
    }

    #[test]
    fn test_service_status_serializes_lowercase() {
        let json = serde_json::to_string(&ServiceStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
    }

    #[test]
    fn test_package_architecture_omitted_when_empty() {
        let pkg = PackageInfo {
            name: "requests".to_string(),
            version: "2.31.0".to_string(),
            manager: "pip".to_string(),
            exists: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&pkg).unwrap();
        assert!(!json.contains("architecture"));
    }
}
