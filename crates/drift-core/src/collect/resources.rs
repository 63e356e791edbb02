//! System resource probes: CPU, memory, disks, load, process count.
//!
//! - CPU topology from `/proc/cpuinfo` (Linux) or `sysctl` (macOS);
//!   usage percentages parsed from `top` on both
//! - memory from `/proc/meminfo` (values normalized from kB to bytes,
//!   `used = total - available`) or `vm_stat` + `sysctl hw.memsize`
//! - disks from `df -h`, `/tmp` and children excluded
//! - load from `/proc/loadavg` or `uptime`
//! - process count from `ps -axo pid` minus the header

use super::runner::CommandRunner;
use crate::model::{CpuInfo, DiskInfo, LoadAverage, MemoryInfo, SystemResources};
use drift_common::{parse_disk_size, CollectError, Deadline};
use drift_config::SystemResourcesConfig;
use std::collections::BTreeMap;
use tracing::debug;

/// Collect the system resources category.
pub fn collect_resources(
    config: &SystemResourcesConfig,
    runner: &CommandRunner,
    deadline: &Deadline,
) -> (SystemResources, Option<CollectError>) {
    let mut resources = SystemResources::default();

    if config.cpu {
        resources.cpu = collect_cpu(runner, deadline);
    }
    if deadline.check().is_err() {
        return (resources, Some(CollectError::Cancelled));
    }

    if config.memory {
        resources.memory = collect_memory(runner, deadline);
    }
    if deadline.check().is_err() {
        return (resources, Some(CollectError::Cancelled));
    }

    if config.disks {
        if let Some(output) = runner.stdout("df", &["-h"], deadline) {
            resources.disks = if cfg!(target_os = "macos") {
                parse_df_output(&output, 9, 8)
            } else {
                parse_df_output(&output, 6, 5)
            };
        }
    }
    if deadline.check().is_err() {
        return (resources, Some(CollectError::Cancelled));
    }

    if config.load {
        resources.load_average = collect_load(runner, deadline);
    }

    if let Some(output) = runner.stdout("ps", &["-axo", "pid"], deadline) {
        resources.process_count = count_processes(&output);
    }

    debug!(
        cores = resources.cpu.cores,
        disks = resources.disks.len(),
        "system resources collected"
    );
    (resources, None)
}

// ---------------------------------------------------------------------------
// CPU
// ---------------------------------------------------------------------------

fn collect_cpu(runner: &CommandRunner, deadline: &Deadline) -> CpuInfo {
    let mut cpu = CpuInfo::default();

    if cfg!(target_os = "linux") {
        if let Ok(data) = std::fs::read_to_string("/proc/cpuinfo") {
            let (cores, model) = parse_cpuinfo(&data);
            cpu.cores = cores;
            cpu.model = model;
        }
        if let Some(output) = runner.stdout("top", &["-bn1"], deadline) {
            if let Some((user, system, idle)) = parse_top_cpu_linux(&output) {
                cpu.user = user;
                cpu.system = system;
                cpu.idle = idle;
                cpu.usage = user + system;
            }
        }
    } else if cfg!(target_os = "macos") {
        if let Some(output) = runner.stdout("sysctl", &["-n", "hw.ncpu"], deadline) {
            cpu.cores = output.trim().parse().unwrap_or(0);
        }
        if let Some(output) = runner.stdout("sysctl", &["-n", "machdep.cpu.brand_string"], deadline)
        {
            cpu.model = output.trim().to_string();
        }
        if let Some(output) = runner.stdout("top", &["-l", "1", "-n", "0"], deadline) {
            if let Some((user, system, idle)) = parse_top_cpu_darwin(&output) {
                cpu.user = user;
                cpu.system = system;
                cpu.idle = idle;
                cpu.usage = user + system;
            }
        }
    }

    if cpu.cores == 0 {
        cpu.cores = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);
    }
    cpu
}

/// Count `processor` entries and pick the first `model name` from
/// /proc/cpuinfo content.
fn parse_cpuinfo(data: &str) -> (u32, String) {
    let mut cores = 0;
    let mut model = String::new();
    for line in data.lines() {
        if line.starts_with("processor") {
            cores += 1;
        } else if line.starts_with("model name") && model.is_empty() {
            if let Some((_, value)) = line.split_once(':') {
                model = value.trim().to_string();
            }
        }
    }
    (cores, model)
}

/// Parse the `Cpu(s):` line of `top -bn1` into (user, system, idle).
fn parse_top_cpu_linux(output: &str) -> Option<(f64, f64, f64)> {
    let line = output.lines().find(|line| line.contains("Cpu(s):"))?;
    let fields: Vec<&str> = line.split_whitespace().collect();

    let mut user = None;
    let mut system = None;
    let mut idle = None;
    for (i, field) in fields.iter().enumerate() {
        let value = |idx: usize| -> Option<f64> {
            fields
                .get(idx)?
                .trim_end_matches('%')
                .parse::<f64>()
                .ok()
        };
        match *field {
            "us," => user = value(i.checked_sub(1)?),
            "sy," => system = value(i.checked_sub(1)?),
            "id," => idle = value(i.checked_sub(1)?),
            _ => {}
        }
    }
    Some((user?, system?, idle?))
}

/// Parse the `CPU usage:` line of macOS `top -l 1` into
/// (user, system, idle).
fn parse_top_cpu_darwin(output: &str) -> Option<(f64, f64, f64)> {
    let line = output.lines().find(|line| line.contains("CPU usage:"))?;
    let fields: Vec<&str> = line.split_whitespace().collect();

    let mut user = None;
    let mut system = None;
    let mut idle = None;
    for (i, field) in fields.iter().enumerate() {
        let word = field.trim_end_matches(',');
        let value = |idx: usize| -> Option<f64> {
            fields
                .get(idx)?
                .trim_end_matches('%')
                .parse::<f64>()
                .ok()
        };
        match word {
            "user" => user = value(i.checked_sub(1)?),
            "sys" => system = value(i.checked_sub(1)?),
            "idle" => idle = value(i.checked_sub(1)?),
            _ => {}
        }
    }
    Some((user?, system?, idle?))
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

fn collect_memory(runner: &CommandRunner, deadline: &Deadline) -> MemoryInfo {
    if cfg!(target_os = "linux") {
        match std::fs::read_to_string("/proc/meminfo") {
            Ok(data) => parse_meminfo(&data),
            Err(_) => MemoryInfo::default(),
        }
    } else if cfg!(target_os = "macos") {
        collect_memory_darwin(runner, deadline)
    } else {
        MemoryInfo::default()
    }
}

/// Parse /proc/meminfo content; values arrive in kB and are stored as
/// bytes. `used = total - available` when MemAvailable is exposed.
fn parse_meminfo(data: &str) -> MemoryInfo {
    let mut memory = MemoryInfo::default();
    for line in data.lines() {
        let mut fields = line.split_whitespace();
        let (Some(key), Some(raw)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Ok(kb) = raw.parse::<u64>() else {
            continue;
        };
        let bytes = kb * 1024;
        match key.trim_end_matches(':') {
            "MemTotal" => memory.total = bytes,
            "MemFree" => memory.free = bytes,
            "MemAvailable" => memory.available = bytes,
            "Cached" => memory.cached = bytes,
            _ => {}
        }
    }

    memory.used = memory.total.saturating_sub(memory.available);
    if memory.total > 0 {
        memory.usage = memory.used as f64 / memory.total as f64 * 100.0;
    }
    memory
}

fn collect_memory_darwin(runner: &CommandRunner, deadline: &Deadline) -> MemoryInfo {
    let mut memory = match runner.stdout("vm_stat", &[], deadline) {
        Some(output) => parse_vm_stat(&output),
        None => MemoryInfo::default(),
    };

    if let Some(output) = runner.stdout("sysctl", &["-n", "hw.memsize"], deadline) {
        memory.total = output.trim().parse().unwrap_or(0);
    }
    if memory.total > 0 {
        memory.available = memory.total.saturating_sub(memory.used);
        memory.usage = memory.used as f64 / memory.total as f64 * 100.0;
    }
    memory
}

/// Parse `vm_stat` page counters. Used memory counts active, inactive,
/// speculative and wired pages; cached counts inactive plus speculative.
fn parse_vm_stat(output: &str) -> MemoryInfo {
    let mut page_size: u64 = 4096;
    let mut free = 0u64;
    let mut active = 0u64;
    let mut inactive = 0u64;
    let mut speculative = 0u64;
    let mut wired = 0u64;

    let last_number = |line: &str| -> Option<u64> {
        line.split_whitespace()
            .last()?
            .trim_end_matches('.')
            .parse()
            .ok()
    };

    for line in output.lines() {
        if line.contains("page size of") {
            if let Some(size) = line
                .split_whitespace()
                .find_map(|tok| tok.parse::<u64>().ok())
            {
                page_size = size;
            }
        } else if line.starts_with("Pages free:") {
            free = last_number(line).unwrap_or(0);
        } else if line.starts_with("Pages active:") {
            active = last_number(line).unwrap_or(0);
        } else if line.starts_with("Pages inactive:") {
            inactive = last_number(line).unwrap_or(0);
        } else if line.starts_with("Pages speculative:") {
            speculative = last_number(line).unwrap_or(0);
        } else if line.starts_with("Pages wired down:") {
            wired = last_number(line).unwrap_or(0);
        }
    }

    MemoryInfo {
        free: free * page_size,
        used: (active + inactive + speculative + wired) * page_size,
        cached: (inactive + speculative) * page_size,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Disks
// ---------------------------------------------------------------------------

/// Parse `df -h` output with the given column layout. Rows under `/tmp`
/// are excluded.
fn parse_df_output(
    output: &str,
    min_fields: usize,
    mount_index: usize,
) -> BTreeMap<String, DiskInfo> {
    let mut disks = BTreeMap::new();
    for line in output.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < min_fields {
            continue;
        }

        let mountpoint = fields[mount_index];
        if mountpoint == "/tmp" || mountpoint.starts_with("/tmp/") {
            continue;
        }

        let total = parse_disk_size(fields[1]);
        let used = parse_disk_size(fields[2]);
        let free = parse_disk_size(fields[3]);
        let usage = if total > 0 {
            used as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        disks.insert(
            mountpoint.to_string(),
            DiskInfo {
                device: String::new(),
                mountpoint: mountpoint.to_string(),
                filesystem: fields[0].to_string(),
                total,
                used,
                free,
                usage,
            },
        );
    }
    disks
}

// ---------------------------------------------------------------------------
// Load / process count
// ---------------------------------------------------------------------------

fn collect_load(runner: &CommandRunner, deadline: &Deadline) -> LoadAverage {
    if cfg!(target_os = "linux") {
        match std::fs::read_to_string("/proc/loadavg") {
            Ok(data) => parse_loadavg(&data),
            Err(_) => LoadAverage::default(),
        }
    } else if cfg!(target_os = "macos") {
        match runner.stdout("uptime", &[], deadline) {
            Some(output) => parse_uptime_load(&output),
            None => LoadAverage::default(),
        }
    } else {
        LoadAverage::default()
    }
}

/// Parse the three leading numbers of /proc/loadavg.
fn parse_loadavg(data: &str) -> LoadAverage {
    let mut fields = data.split_whitespace();
    LoadAverage {
        one_min: fields.next().and_then(|f| f.parse().ok()).unwrap_or(0.0),
        five_min: fields.next().and_then(|f| f.parse().ok()).unwrap_or(0.0),
        fifteen_min: fields.next().and_then(|f| f.parse().ok()).unwrap_or(0.0),
    }
}

/// Extract load averages from `uptime` output.
fn parse_uptime_load(output: &str) -> LoadAverage {
    let fields: Vec<&str> = output.split_whitespace().collect();
    for (i, field) in fields.iter().enumerate() {
        if field.contains("load") && i + 3 < fields.len() {
            let parse = |s: &str| {
                s.trim_start_matches("load")
                    .trim_end_matches(',')
                    .parse::<f64>()
                    .ok()
            };
            // "load averages: 1.20 1.15 1.08" or "load average: 1.20, 1.15, 1.08"
            let offset = if fields[i + 1].starts_with("average") { 2 } else { 1 };
            if i + offset + 2 < fields.len() {
                return LoadAverage {
                    one_min: parse(fields[i + offset]).unwrap_or(0.0),
                    five_min: parse(fields[i + offset + 1]).unwrap_or(0.0),
                    fifteen_min: parse(fields[i + offset + 2]).unwrap_or(0.0),
                };
            }
        }
    }
    LoadAverage::default()
}

/// Count `ps -axo pid` rows minus the header.
fn count_processes(output: &str) -> u64 {
    let lines = output.lines().filter(|line| !line.trim().is_empty()).count();
    lines.saturating_sub(1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpuinfo() {
        let data = "\
processor\t: 0
model name\t: AMD EPYC 7763 64-Core Processor
processor\t: 1
model name\t: AMD EPYC 7763 64-Core Processor
";
        let (cores, model) = parse_cpuinfo(data);
        assert_eq!(cores, 2);
        assert_eq!(model, "AMD EPYC 7763 64-Core Processor");
    }

    #[test]
    fn test_parse_top_cpu_linux() {
        let output = "\
top - 12:00:00 up 1 day,  3 users,  load average: 0.50, 0.40, 0.30
%Cpu(s):  1.2 us,  0.4 sy,  0.0 ni, 98.2 id,  0.1 wa,  0.0 hi,  0.1 si,  0.0 st
";
        let (user, system, idle) = parse_top_cpu_linux(output).unwrap();
        assert_eq!(user, 1.2);
        assert_eq!(system, 0.4);
        assert_eq!(idle, 98.2);
    }

    #[test]
    fn test_parse_top_cpu_darwin() {
        let output = "Processes: 500 total\nCPU usage: 4.54% user, 8.25% sys, 87.20% idle\n";
        let (user, system, idle) = parse_top_cpu_darwin(output).unwrap();
        assert_eq!(user, 4.54);
        assert_eq!(system, 8.25);
        assert_eq!(idle, 87.20);
    }

    #[test]
    fn test_parse_meminfo_normalizes_to_bytes() {
        let data = "\
MemTotal:       16384256 kB
MemFree:         1024000 kB
MemAvailable:    8192128 kB
Buffers:          512000 kB
Cached:          4096000 kB
";
        let memory = parse_meminfo(data);
        assert_eq!(memory.total, 16384256 * 1024);
        assert_eq!(memory.available, 8192128 * 1024);
        assert_eq!(memory.used, (16384256 - 8192128) * 1024);
        assert!(memory.usage > 49.0 && memory.usage < 51.0);
    }

    #[test]
    fn test_parse_vm_stat() {
        let output = "\
Mach Virtual Memory Statistics: (page size of 16384 bytes)
Pages free:                               50000.
Pages active:                            100000.
Pages inactive:                           60000.
Pages speculative:                        10000.
Pages throttled:                              0.
Pages wired down:                         40000.
";
        let memory = parse_vm_stat(output);
        assert_eq!(memory.free, 50000 * 16384);
        assert_eq!(memory.used, 210000 * 16384);
        assert_eq!(memory.cached, 70000 * 16384);
    }

    #[test]
    fn test_parse_df_linux_layout() {
        let output = "\
Filesystem      Size  Used Avail Use% Mounted on
/dev/sda1        40G   12G   26G  32% /
tmpfs           7.8G     0  7.8G   0% /dev/shm
tmpfs           1.0G  1.0M  1.0G   1% /tmp
";
        let disks = parse_df_output(output, 6, 5);
        assert_eq!(disks.len(), 2);
        let root = &disks["/"];
        assert_eq!(root.filesystem, "/dev/sda1");
        assert_eq!(root.total, 40 * 1024 * 1024 * 1024);
        assert!(!disks.contains_key("/tmp"));
    }

    #[test]
    fn test_parse_df_darwin_layout() {
        let output = "\
Filesystem      Size   Used  Avail Capacity iused      ifree %iused  Mounted on
/dev/disk3s1   460Gi  212Gi  236Gi    48% 1200000 2500000000    0%   /
";
        let disks = parse_df_output(output, 9, 8);
        assert_eq!(disks.len(), 1);
        assert_eq!(disks["/"].total, 460 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_parse_loadavg() {
        let load = parse_loadavg("0.52 0.58 0.59 1/389 12345\n");
        assert_eq!(load.one_min, 0.52);
        assert_eq!(load.five_min, 0.58);
        assert_eq!(load.fifteen_min, 0.59);
    }

    #[test]
    fn test_parse_uptime_load() {
        let output =
            "12:00  up 10 days,  2:33, 3 users, load averages: 1.20 1.15 1.08\n";
        let load = parse_uptime_load(output);
        assert_eq!(load.one_min, 1.20);
        assert_eq!(load.five_min, 1.15);
        assert_eq!(load.fifteen_min, 1.08);

        let output = " 12:00:00 up 5 days, load average: 0.10, 0.20, 0.30\n";
        let load = parse_uptime_load(output);
        assert_eq!(load.one_min, 0.10);
        assert_eq!(load.fifteen_min, 0.30);
    }

    #[test]
    fn test_count_processes() {
        assert_eq!(count_processes("  PID\n  1\n  2\n  3\n"), 3);
        assert_eq!(count_processes(""), 0);
    }
}
