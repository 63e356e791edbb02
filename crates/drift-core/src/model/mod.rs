//! Snapshot data model.
//!
//! Everything here is plain data: constructed once by the collection
//! orchestrator, never mutated afterward, serialized as-is by external
//! encoders. All maps are `BTreeMap` so encoders emit keys in ascending
//! order and byte-level snapshot equality is achievable.

mod certificate;
mod docker;
mod host;
mod network;
mod resources;
mod tasks;
mod users;

pub use certificate::Certificate;
pub use docker::{Container, DockerNetwork, DockerState, Image, Volume};
pub use host::{EnvVar, FileInfo, PackageInfo, ProcessEnvVar, ServiceInfo, ServiceStatus};
pub use network::{DnsConfig, FirewallRule, NetworkInterface, NetworkState, Route};
pub use resources::{CpuInfo, DiskInfo, LoadAverage, MemoryInfo, SystemResources};
pub use tasks::{CronJob, LaunchdJob, ScheduledTasks, SystemdTimer};
pub use users::{GroupInfo, SudoRule, UserGroupState, UserInfo};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// Operating system identification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    pub name: String,
    pub version: String,
    pub arch: String,
    pub kernel: String,
}

/// A structured inventory of one host at one instant.
///
/// Every per-category container is always present (possibly empty), so
/// consumers never need to distinguish "not collected" from "nothing
/// found" structurally; disabled collectors simply leave their slot empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    /// Opaque RFC 4122 UUID.
    pub id: String,
    /// Operator-assigned snapshot name (e.g. "baseline", "prod-eu-1").
    pub name: String,
    pub hostname: String,
    /// UTC capture time, strictly monotonic within one process.
    pub timestamp: DateTime<Utc>,
    pub os: OsInfo,

    pub files: BTreeMap<String, FileInfo>,
    pub env_vars: BTreeMap<String, EnvVar>,
    pub process_env_vars: BTreeMap<u32, ProcessEnvVar>,
    pub packages: BTreeMap<String, PackageInfo>,
    pub services: BTreeMap<String, ServiceInfo>,
    pub network: NetworkState,
    pub docker: DockerState,
    pub system_resources: SystemResources,
    pub scheduled_tasks: ScheduledTasks,
    pub certificates: BTreeMap<String, Certificate>,
    pub users_groups: UserGroupState,

    /// Free-form annotations attached by the caller.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Default for EnvironmentSnapshot {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            hostname: String::new(),
            timestamp: DateTime::UNIX_EPOCH,
            os: OsInfo::default(),
            files: BTreeMap::new(),
            env_vars: BTreeMap::new(),
            process_env_vars: BTreeMap::new(),
            packages: BTreeMap::new(),
            services: BTreeMap::new(),
            network: NetworkState::default(),
            docker: DockerState::default(),
            system_resources: SystemResources::default(),
            scheduled_tasks: ScheduledTasks::default(),
            certificates: BTreeMap::new(),
            users_groups: UserGroupState::default(),
            metadata: BTreeMap::new(),
        }
    }
}

static LAST_TIMESTAMP_MICROS: AtomicI64 = AtomicI64::new(0);

/// Current UTC time, bumped by one microsecond if the clock has not moved
/// since the previous call. Keeps snapshot timestamps strictly monotonic
/// within one process even on coarse clocks.
pub fn monotonic_utc_now() -> DateTime<Utc> {
    let mut now = Utc::now().timestamp_micros();
    loop {
        let last = LAST_TIMESTAMP_MICROS.load(Ordering::SeqCst);
        if now <= last {
            now = last + 1;
        }
        match LAST_TIMESTAMP_MICROS.compare_exchange(
            last,
            now,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => break,
            Err(_) => now = Utc::now().timestamp_micros(),
        }
    }
    DateTime::from_timestamp_micros(now).unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_timestamps() {
        let a = monotonic_utc_now();
        let b = monotonic_utc_now();
        let c = monotonic_utc_now();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_snapshot_json_roundtrip() {
        let mut snapshot = EnvironmentSnapshot {
            id: "a3bb189e-8bf9-3888-9912-ace4e6543002".to_string(),
            name: "baseline".to_string(),
            hostname: "web-1".to_string(),
            timestamp: monotonic_utc_now(),
            ..Default::default()
        };
        snapshot.env_vars.insert(
            "PATH".to_string(),
            EnvVar {
                name: "PATH".to_string(),
                value: "/usr/bin".to_string(),
                exists: true,
            },
        );

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: EnvironmentSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, snapshot.id);
        assert_eq!(back.timestamp, snapshot.timestamp);
        assert_eq!(back.env_vars["PATH"].value, "/usr/bin");
    }

    #[test]
    fn test_map_keys_serialize_sorted() {
        let mut snapshot = EnvironmentSnapshot::default();
        for name in ["ZED", "ALPHA", "MID"] {
            snapshot.env_vars.insert(
                name.to_string(),
                EnvVar {
                    name: name.to_string(),
                    value: String::new(),
                    exists: true,
                },
            );
        }
        let json = serde_json::to_string(&snapshot).unwrap();
        let alpha = json.find("ALPHA").unwrap();
        let mid = json.find("MID").unwrap();
        let zed = json.find("ZED").unwrap();
        assert!(alpha < mid && mid < zed);
    }
}
