//! Scheduled task collector: cron tables, systemd timers, launchd jobs.
//!
//! - Linux cron: `/etc/crontab` and every file under `/etc/cron.d/`, both
//!   in the `min hour dom mon dow user command...` layout. Jobs are keyed
//!   `path:lineno`.
//! - Linux systemd timers: `systemctl list-timers --all --no-pager`; the
//!   unit is the `.timer` token, NEXT/LAST timestamps are parsed from
//!   token windows with a zone-less fallback; dash means never.
//! - macOS launchd: `.plist` files under the standard daemon/agent
//!   directories, cross-referenced against `launchctl list`.

use super::runner::CommandRunner;
use crate::model::{CronJob, LaunchdJob, ScheduledTasks, SystemdTimer};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use drift_common::{CollectError, Deadline};
use drift_config::ScheduledTasksConfig;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Collect the scheduled tasks category for the current OS.
pub fn collect_scheduled_tasks(
    config: &ScheduledTasksConfig,
    runner: &CommandRunner,
    deadline: &Deadline,
) -> (ScheduledTasks, Option<CollectError>) {
    let mut tasks = ScheduledTasks::default();

    if cfg!(target_os = "linux") {
        if config.cron_jobs {
            let (jobs, error) = collect_cron_jobs(deadline);
            tasks.cron_jobs = jobs;
            if error.is_some() {
                return (tasks, error);
            }
        }
        if config.systemd_timers {
            if let Some(output) =
                runner.stdout("systemctl", &["list-timers", "--all", "--no-pager"], deadline)
            {
                tasks.systemd_timers = parse_systemd_timers(&output);
            }
        }
    } else if cfg!(target_os = "macos") && config.launchd_jobs {
        let (jobs, error) = collect_launchd_jobs(runner, deadline);
        tasks.launchd_jobs = jobs;
        if error.is_some() {
            return (tasks, error);
        }
    }

    debug!(
        cron = tasks.cron_jobs.len(),
        timers = tasks.systemd_timers.len(),
        launchd = tasks.launchd_jobs.len(),
        "scheduled tasks collected"
    );
    (tasks, None)
}

// ---------------------------------------------------------------------------
// Cron
// ---------------------------------------------------------------------------

fn collect_cron_jobs(
    deadline: &Deadline,
) -> (BTreeMap<String, CronJob>, Option<CollectError>) {
    let mut jobs = BTreeMap::new();

    if let Ok(content) = std::fs::read_to_string("/etc/crontab") {
        jobs.extend(parse_cron_content("/etc/crontab", &content));
    }

    if let Ok(entries) = std::fs::read_dir("/etc/cron.d") {
        for entry in entries.flatten() {
            if deadline.check().is_err() {
                return (jobs, Some(CollectError::Cancelled));
            }
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            if let Ok(content) = std::fs::read_to_string(&path) {
                jobs.extend(parse_cron_content(&path.to_string_lossy(), &content));
            }
        }
    }

    (jobs, None)
}

/// Parse one cron table. Rows are `min hour dom mon dow user command...`;
/// blank and comment lines are skipped, as are rows without a command.
fn parse_cron_content(path: &str, content: &str) -> BTreeMap<String, CronJob> {
    let mut jobs = BTreeMap::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 7 {
            continue;
        }

        let lineno = index + 1;
        jobs.insert(
            format!("{path}:{lineno}"),
            CronJob {
                user: fields[5].to_string(),
                schedule: fields[..5].join(" "),
                command: fields[6..].join(" "),
                enabled: true,
            },
        );
    }
    jobs
}

// ---------------------------------------------------------------------------
// systemd timers
// ---------------------------------------------------------------------------

/// Parse `systemctl list-timers` rows into timers keyed by unit name
/// (without `.timer`). The first two parseable timestamps on a row are
/// NEXT and LAST.
fn parse_systemd_timers(output: &str) -> BTreeMap<String, SystemdTimer> {
    let mut timers = BTreeMap::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("NEXT") {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(unit_index) = tokens.iter().position(|t| t.ends_with(".timer")) else {
            continue;
        };
        let name = tokens[unit_index].trim_end_matches(".timer").to_string();

        let stamps = extract_timestamps(&tokens[..unit_index]);
        let next_trigger = stamps.first().copied().flatten();
        let last_trigger = stamps.get(1).copied().flatten();

        timers.insert(
            name.clone(),
            SystemdTimer {
                name,
                description: String::new(),
                next_trigger,
                last_trigger,
                enabled: true,
                active: true,
            },
        );
    }
    timers
}

/// Scan a token run for timestamps. Parseable windows and explicit
/// dashes each contribute one slot, at most two.
fn extract_timestamps(tokens: &[&str]) -> Vec<Option<DateTime<Utc>>> {
    let mut stamps = Vec::new();
    let mut i = 0;
    while i < tokens.len() && stamps.len() < 2 {
        if tokens[i] == "-" {
            stamps.push(None);
            i += 1;
            continue;
        }
        if i + 3 <= tokens.len() {
            if let Some(ts) = parse_systemd_time(&tokens[i..i + 3].join(" ")) {
                stamps.push(Some(ts));
                i += 3;
                // swallow the trailing zone abbreviation
                if tokens.get(i).is_some_and(|t| is_zone_abbrev(t)) {
                    i += 1;
                }
                continue;
            }
        }
        if i + 2 <= tokens.len() {
            if let Some(ts) = parse_systemd_time(&tokens[i..i + 2].join(" ")) {
                stamps.push(Some(ts));
                i += 2;
                if tokens.get(i).is_some_and(|t| is_zone_abbrev(t)) {
                    i += 1;
                }
                continue;
            }
        }
        i += 1;
    }
    stamps
}

fn is_zone_abbrev(token: &str) -> bool {
    token.len() >= 2
        && token.len() <= 5
        && token.chars().all(|c| c.is_ascii_uppercase() || c == '+' || c.is_ascii_digit())
}

/// Parse a timer timestamp: `Mon 2026-08-03 00:00:00` (weekday form,
/// zone token already stripped) or `2026-08-03 00:00:00`. Dash and empty
/// mean "never".
fn parse_systemd_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() || s == "-" {
        return None;
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%a %Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    None
}

// ---------------------------------------------------------------------------
// launchd
// ---------------------------------------------------------------------------

fn collect_launchd_jobs(
    runner: &CommandRunner,
    deadline: &Deadline,
) -> (BTreeMap<String, LaunchdJob>, Option<CollectError>) {
    let mut roots = vec![
        "/Library/LaunchDaemons".to_string(),
        "/Library/LaunchAgents".to_string(),
    ];
    if let Ok(home) = std::env::var("HOME") {
        roots.push(format!("{home}/Library/LaunchAgents"));
    }

    let listing = runner.stdout("launchctl", &["list"], deadline).unwrap_or_default();

    let mut jobs = BTreeMap::new();
    for root in roots {
        let Ok(entries) = std::fs::read_dir(&root) else {
            continue;
        };
        for entry in entries.flatten() {
            if deadline.check().is_err() {
                return (jobs, Some(CollectError::Cancelled));
            }
            let path = entry.path();
            if path.is_dir() || path.extension().and_then(|e| e.to_str()) != Some("plist") {
                continue;
            }
            let job = launchd_job_from_plist(&path, &listing);
            jobs.insert(job.label.clone(), job);
        }
    }

    (jobs, None)
}

/// Build a job record for one plist file, marking it running when the
/// `launchctl list` output mentions the path.
fn launchd_job_from_plist(path: &Path, launchctl_listing: &str) -> LaunchdJob {
    let path_str = path.to_string_lossy().to_string();
    let label = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| path_str.clone());

    LaunchdJob {
        label,
        path: path_str.clone(),
        run_at_load: false,
        enabled: true,
        running: launchctl_listing.contains(&path_str),
        program: String::new(),
        arguments: Vec::new(),
    }
}
