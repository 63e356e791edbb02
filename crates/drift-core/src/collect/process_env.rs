//! Process environment collector.
//!
//! Inspects the environment of running processes whose executable base
//! name is in the configured set (interpreters by default: node, php,
//! python, ruby, java, go).
//!
//! - Linux: numeric `/proc` entries; `cmdline` and `environ` are
//!   NUL-separated.
//! - macOS: PIDs via `pgrep`, environment via `ps -E -p <pid> -o command`,
//!   split into command and environment at the first `=`-bearing field.
//! - elsewhere: empty.
//!
//! The same exclude/mask rules as the plain environment collector apply,
//! and the result is bounded at `max_processes`.

use super::env_vars::build_env_var;
use crate::model::{EnvVar, ProcessEnvVar};
use drift_common::{CollectError, Deadline};
use drift_config::{compile_patterns, ProcessEnvVarsConfig};
use regex::Regex;
use std::collections::BTreeMap;

#[cfg(target_os = "macos")]
use super::runner::CommandRunner;
#[cfg(target_os = "macos")]
use tracing::debug;

/// Collect foreign process environments.
pub fn collect_process_env_vars(
    config: &ProcessEnvVarsConfig,
    deadline: &Deadline,
) -> (BTreeMap<u32, ProcessEnvVar>, Option<CollectError>) {
    let exclude = compile_patterns(&config.exclude);
    let names = config.process_names();
    let max = config.max();

    #[cfg(target_os = "linux")]
    {
        collect_linux(&names, max, &exclude, config.mask_secrets, deadline)
    }
    #[cfg(target_os = "macos")]
    {
        collect_darwin(&names, max, &exclude, config.mask_secrets, deadline)
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        let _ = (names, max, exclude, deadline);
        (BTreeMap::new(), None)
    }
}

/// Render a NUL-separated `/proc/[pid]/cmdline` as a single line.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn cmdline_from_raw(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .replace('\0', " ")
        .trim()
        .to_string()
}

/// Parse NUL-separated `K=V` pairs from `/proc/[pid]/environ`, applying
/// exclusion and masking.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn env_from_environ(
    raw: &[u8],
    exclude: &[Regex],
    mask_secrets: bool,
) -> BTreeMap<String, EnvVar> {
    let mut vars = BTreeMap::new();
    for pair in String::from_utf8_lossy(raw).split('\0') {
        if pair.is_empty() {
            continue;
        }
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        if let Some(var) = build_env_var(name, value, &[], exclude, mask_secrets) {
            vars.insert(name.to_string(), var);
        }
    }
    vars
}

/// Executable base name from a rendered cmdline.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn base_name_of(cmdline: &str) -> Option<String> {
    let argv0 = cmdline.split_whitespace().next()?;
    let base = argv0.rsplit('/').next().unwrap_or(argv0);
    Some(base.to_string())
}

#[cfg(target_os = "linux")]
fn collect_linux(
    names: &[String],
    max: usize,
    exclude: &[Regex],
    mask_secrets: bool,
    deadline: &Deadline,
) -> (BTreeMap<u32, ProcessEnvVar>, Option<CollectError>) {
    use std::path::Path;

    let mut result = BTreeMap::new();
    let proc_dir = Path::new("/proc");
    let entries = match std::fs::read_dir(proc_dir) {
        Ok(entries) => entries,
        Err(_) => return (result, None),
    };

    for entry in entries.flatten() {
        if result.len() >= max {
            break;
        }
        if deadline.check().is_err() {
            return (result, Some(CollectError::Cancelled));
        }

        let Ok(pid) = entry.file_name().to_string_lossy().parse::<u32>() else {
            continue;
        };

        let Ok(raw_cmdline) = std::fs::read(proc_dir.join(pid.to_string()).join("cmdline")) else {
            continue;
        };
        let cmdline = cmdline_from_raw(&raw_cmdline);
        if cmdline.is_empty() {
            continue;
        }

        let Some(base) = base_name_of(&cmdline) else {
            continue;
        };
        if !names.contains(&base) {
            continue;
        }

        // environ is root-readable for foreign processes; skip on denial
        let Ok(raw_environ) = std::fs::read(proc_dir.join(pid.to_string()).join("environ"))
        else {
            continue;
        };
        let env_vars = env_from_environ(&raw_environ, exclude, mask_secrets);
        if env_vars.is_empty() {
            continue;
        }

        result.insert(
            pid,
            ProcessEnvVar {
                pid,
                cmdline,
                env_vars,
            },
        );
    }

    (result, None)
}

/// Split a `ps -E` command line into the command portion and parsed
/// environment, cutting at the first field containing `=`.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn split_ps_env_line(
    line: &str,
    exclude: &[Regex],
    mask_secrets: bool,
) -> (String, BTreeMap<String, EnvVar>) {
    let mut cmdline_parts = Vec::new();
    let mut env_vars = BTreeMap::new();
    let mut in_env = false;

    for field in line.split_whitespace() {
        if field.contains('=') {
            in_env = true;
            let Some((name, value)) = field.split_once('=') else {
                continue;
            };
            if let Some(var) = build_env_var(name, value, &[], exclude, mask_secrets) {
                env_vars.insert(name.to_string(), var);
            }
        } else if !in_env {
            cmdline_parts.push(field);
        }
    }

    (cmdline_parts.join(" "), env_vars)
}

#[cfg(target_os = "macos")]
fn collect_darwin(
    names: &[String],
    max: usize,
    exclude: &[Regex],
    mask_secrets: bool,
    deadline: &Deadline,
) -> (BTreeMap<u32, ProcessEnvVar>, Option<CollectError>) {
    let runner = CommandRunner::default();
    let mut result = BTreeMap::new();

    for name in names {
        if result.len() >= max {
            break;
        }
        if deadline.check().is_err() {
            return (result, Some(CollectError::Cancelled));
        }

        let Some(pids) = runner.stdout("pgrep", &["-d", "\n", name], deadline) else {
            continue;
        };

        for pid_line in pids.lines() {
            if result.len() >= max {
                break;
            }
            if deadline.check().is_err() {
                return (result, Some(CollectError::Cancelled));
            }

            let Ok(pid) = pid_line.trim().parse::<u32>() else {
                continue;
            };

            let pid_arg = pid.to_string();
            let Some(output) =
                runner.stdout("ps", &["-E", "-p", &pid_arg, "-o", "command"], deadline)
            else {
                continue;
            };

            // first line is the COMMAND header
            let body = output.lines().skip(1).collect::<Vec<_>>().join(" ");
            let (cmdline, env_vars) = split_ps_env_line(&body, exclude, mask_secrets);
            if env_vars.is_empty() && cmdline.is_empty() {
                continue;
            }

            debug!(pid, env_count = env_vars.len(), "captured process environment");
            result.insert(
                pid,
                ProcessEnvVar {
                    pid,
                    cmdline,
                    env_vars,
                },
            );
        }
    }

    (result, None)
}
