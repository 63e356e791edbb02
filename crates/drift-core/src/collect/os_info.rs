//! Operating system identification probes.
//!
//! - Linux version: `/etc/os-release` `PRETTY_NAME`, falling back to
//!   `lsb_release -d -s`
//! - macOS version: `sw_vers -productVersion`
//! - kernel: `uname -r`
//!
//! Anything that cannot be determined degrades to `"unknown"`.

use super::runner::CommandRunner;
use drift_common::Deadline;

use crate::model::OsInfo;

/// Collect OS identification for the snapshot header.
pub fn collect_os_info(runner: &CommandRunner, deadline: &Deadline) -> OsInfo {
    OsInfo {
        name: std::env::consts::OS.to_string(),
        version: os_version(runner, deadline),
        arch: std::env::consts::ARCH.to_string(),
        kernel: kernel_version(runner, deadline),
    }
}

#[cfg(target_os = "linux")]
fn os_version(runner: &CommandRunner, deadline: &Deadline) -> String {
    if let Ok(data) = std::fs::read_to_string("/etc/os-release") {
        if let Some(name) = parse_os_release_pretty_name(&data) {
            return name;
        }
    }
    match runner.stdout("lsb_release", &["-d", "-s"], deadline) {
        Some(output) if !output.trim().is_empty() => output.trim().to_string(),
        _ => "Linux".to_string(),
    }
}

#[cfg(target_os = "macos")]
fn os_version(runner: &CommandRunner, deadline: &Deadline) -> String {
    match runner.stdout("sw_vers", &["-productVersion"], deadline) {
        Some(output) => format!("macOS {}", output.trim()),
        None => "macOS".to_string(),
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn os_version(_runner: &CommandRunner, _deadline: &Deadline) -> String {
    "unknown".to_string()
}

#[cfg(unix)]
fn kernel_version(runner: &CommandRunner, deadline: &Deadline) -> String {
    match runner.stdout("uname", &["-r"], deadline) {
        Some(output) => output.trim().to_string(),
        None => "unknown".to_string(),
    }
}

#[cfg(not(unix))]
fn kernel_version(_runner: &CommandRunner, _deadline: &Deadline) -> String {
    "unknown".to_string()
}

/// Extract `PRETTY_NAME` from os-release content.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_os_release_pretty_name(data: &str) -> Option<String> {
    for line in data.lines() {
        if let Some(value) = line.strip_prefix("PRETTY_NAME=") {
            let trimmed = value.trim().trim_matches('"');
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}
