//! Service collector.
//!
//! Selects an init system implementation from the configured `init_type`
//! (auto-detection picks launchd on macOS and systemd elsewhere) and
//! applies include/exclude regex filters on service names.
//!
//! - systemd: `systemctl list-units --type=service --all`, status derived
//!   from the ACTIVE column, enabled state via `is-enabled` per unit
//! - sysvinit: `service --status-all` markers (`+` running, `-` stopped)
//! - launchd: `launchctl list`, PID `-` means stopped

use super::runner::CommandRunner;
use crate::model::{ServiceInfo, ServiceStatus};
use drift_common::{CollectError, Deadline};
use drift_config::{compile_patterns, matches_filters, InitType, ServicesConfig};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::debug;

type ServiceMap = BTreeMap<String, ServiceInfo>;

/// Collect services from the configured init system.
pub fn collect_services(
    config: &ServicesConfig,
    runner: &CommandRunner,
    deadline: &Deadline,
) -> (ServiceMap, Option<CollectError>) {
    let include = compile_patterns(&config.include);
    let exclude = compile_patterns(&config.exclude);

    let init = match config.init_type {
        InitType::Auto => {
            if cfg!(target_os = "macos") {
                InitType::Launchd
            } else {
                InitType::Systemd
            }
        }
        other => other,
    };

    match init {
        InitType::Systemd => collect_systemd(runner, deadline, &include, &exclude),
        InitType::Sysvinit => collect_sysvinit(runner, deadline, &include, &exclude),
        InitType::Launchd => collect_launchd(runner, deadline, &include, &exclude),
        InitType::Auto => unreachable!("auto resolved above"),
    }
}

fn collect_systemd(
    runner: &CommandRunner,
    deadline: &Deadline,
    include: &[Regex],
    exclude: &[Regex],
) -> (ServiceMap, Option<CollectError>) {
    let mut services = ServiceMap::new();
    let Some(output) = runner.stdout(
        "systemctl",
        &["list-units", "--type=service", "--all", "--no-legend", "--no-pager"],
        deadline,
    ) else {
        return (services, None);
    };

    for (name, active_state, sub_state) in parse_systemd_units(&output) {
        if deadline.check().is_err() {
            return (services, Some(CollectError::Cancelled));
        }
        if !matches_filters(&name, include, exclude) {
            continue;
        }

        let unit = format!("{name}.service");
        let enabled = runner
            .stdout("systemctl", &["is-enabled", &unit], deadline)
            .map(|out| out.trim() == "enabled")
            .unwrap_or(false);

        services.insert(
            name.clone(),
            ServiceInfo {
                name,
                status: ServiceStatus::from_active_state(&active_state),
                enabled,
                active_state,
                sub_state,
                exists: true,
            },
        );
    }

    debug!(count = services.len(), "systemd services collected");
    (services, None)
}

/// Parse `systemctl list-units` rows into `(name, active, sub)` triples.
/// A leading failure bullet is tolerated.
fn parse_systemd_units(output: &str) -> Vec<(String, String, String)> {
    let mut units = Vec::new();
    for line in output.lines() {
        let mut fields: Vec<&str> = line.split_whitespace().collect();
        if matches!(fields.first(), Some(&"●") | Some(&"*")) {
            fields.remove(0);
        }
        if fields.len() < 4 {
            continue;
        }
        let Some(name) = fields[0].strip_suffix(".service") else {
            continue;
        };
        units.push((
            name.to_string(),
            fields[2].to_string(),
            fields[3].to_string(),
        ));
    }
    units
}

static SYSV_STATUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*([+?-])\s*\]\s+(\S+)").unwrap());

fn collect_sysvinit(
    runner: &CommandRunner,
    deadline: &Deadline,
    include: &[Regex],
    exclude: &[Regex],
) -> (ServiceMap, Option<CollectError>) {
    let mut services = ServiceMap::new();
    let output = match runner.run("service", &["--status-all"], deadline) {
        // status-all reports through both streams and a nonzero exit
        Ok(out) => format!("{}{}", out.stdout_str(), String::from_utf8_lossy(&out.stderr)),
        Err(_) => return (services, None),
    };

    for (marker, name) in parse_sysvinit_listing(&output) {
        if deadline.check().is_err() {
            return (services, Some(CollectError::Cancelled));
        }
        if !matches_filters(&name, include, exclude) {
            continue;
        }
        let status = match marker {
            '+' => ServiceStatus::Running,
            '-' => ServiceStatus::Stopped,
            _ => ServiceStatus::Unknown,
        };
        services.insert(
            name.clone(),
            ServiceInfo {
                name,
                status,
                enabled: false,
                active_state: String::new(),
                sub_state: String::new(),
                exists: true,
            },
        );
    }

    (services, None)
}

/// Parse `service --status-all` rows into `(marker, name)` pairs.
fn parse_sysvinit_listing(output: &str) -> Vec<(char, String)> {
    SYSV_STATUS
        .captures_iter(output)
        .filter_map(|caps| {
            let marker = caps[1].chars().next()?;
            Some((marker, caps[2].to_string()))
        })
        .collect()
}

fn collect_launchd(
    runner: &CommandRunner,
    deadline: &Deadline,
    include: &[Regex],
    exclude: &[Regex],
) -> (ServiceMap, Option<CollectError>) {
    let mut services = ServiceMap::new();
    let Some(output) = runner.stdout("launchctl", &["list"], deadline) else {
        return (services, None);
    };

    for (name, running) in parse_launchd_listing(&output) {
        if deadline.check().is_err() {
            return (services, Some(CollectError::Cancelled));
        }
        if !matches_filters(&name, include, exclude) {
            continue;
        }
        services.insert(
            name.clone(),
            ServiceInfo {
                name,
                status: if running {
                    ServiceStatus::Running
                } else {
                    ServiceStatus::Stopped
                },
                enabled: false,
                active_state: String::new(),
                sub_state: String::new(),
                exists: true,
            },
        );
    }

    (services, None)
}

/// Parse `launchctl list` rows (`PID Status Label`); a dash PID means the
/// job is loaded but not running.
fn parse_launchd_listing(output: &str) -> Vec<(String, bool)> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                return None;
            }
            Some((fields[2].to_string(), fields[0] != "-"))
        })
        .collect()
}
