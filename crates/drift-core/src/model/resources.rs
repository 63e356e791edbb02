//! System resource entities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// CPU topology and instantaneous usage. Percentages are in `[0, 100]`;
/// `usage = user + system`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuInfo {
    pub cores: u32,
    pub model: String,
    pub usage: f64,
    pub user: f64,
    pub system: f64,
    pub idle: f64,
}

/// Memory accounting in bytes. On systems exposing `MemAvailable`,
/// `used = total - available`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub free: u64,
    pub cached: u64,
    /// Used fraction as a percentage in `[0, 100]`.
    pub usage: f64,
}

/// One mounted filesystem from `df -h`; sizes in bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub device: String,
    pub mountpoint: String,
    pub filesystem: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub usage: f64,
}

/// Load averages over 1/5/15 minutes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadAverage {
    pub one_min: f64,
    pub five_min: f64,
    pub fifteen_min: f64,
}

/// System resources category container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemResources {
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
    pub disks: BTreeMap<String, DiskInfo>,
    pub load_average: LoadAverage,
    pub process_count: u64,
}
