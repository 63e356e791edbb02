//! Scheduled task entities: cron, systemd timers, launchd jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One cron table entry. Snapshot keys are `path:lineno`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronJob {
    pub user: String,
    /// The five scheduling fields joined with single spaces.
    pub schedule: String,
    pub command: String,
    pub enabled: bool,
}

/// One systemd timer unit, keyed by unit name without `.timer`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemdTimer {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub next_trigger: Option<DateTime<Utc>>,
    pub last_trigger: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub active: bool,
}

/// One launchd job discovered from a `.plist`, keyed by label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchdJob {
    pub label: String,
    pub path: String,
    pub run_at_load: bool,
    pub enabled: bool,
    pub running: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub program: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
}

/// Scheduled tasks category container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduledTasks {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cron_jobs: BTreeMap<String, CronJob>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub systemd_timers: BTreeMap<String, SystemdTimer>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub launchd_jobs: BTreeMap<String, LaunchdJob>,
}
