//! Snapshot collection.
//!
//! Each snapshot category is produced by one [`Collector`], a value with a
//! name, an enablement predicate over the configuration, and a run method
//! producing that category's output. The orchestrator fans all enabled
//! collectors out onto threads under one shared deadline, then merges
//! their outputs into the snapshot; a collector failure never cancels its
//! peers, and only deadline cancellations surface as per-collector
//! errors next to the returned snapshot.

pub mod certificates;
pub mod docker;
pub mod env_vars;
pub mod files;
pub mod network;
pub mod os_info;
pub mod packages;
pub mod process_env;
pub mod resources;
pub mod runner;
pub mod services;
pub mod tasks;
pub mod users;

pub use runner::{CommandError, CommandOutput, CommandRunner};

use crate::model::{
    Certificate, DockerState, EnvVar, EnvironmentSnapshot, FileInfo, NetworkState, PackageInfo,
    ProcessEnvVar, ScheduledTasks, ServiceInfo, SystemResources, UserGroupState,
};
use drift_common::{CollectError, CollectorError, Deadline};
use drift_config::CollectorConfig;
use std::collections::BTreeMap;
use std::sync::mpsc;
use std::thread;
use tracing::{debug, info};
use uuid::Uuid;

/// Shared context handed to every collector of one run.
pub struct CollectContext {
    pub config: CollectorConfig,
    pub deadline: Deadline,
    /// Worker pool width for collectors that multiplex internally.
    pub workers: usize,
    pub runner: CommandRunner,
}

impl CollectContext {
    pub fn new(config: CollectorConfig, deadline: Deadline) -> Self {
        Self {
            config,
            deadline,
            workers: default_workers(),
            runner: CommandRunner::default(),
        }
    }
}

/// Default worker pool width: `max(2, logical CPU count)`.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .max(2)
}

/// One category's collected payload.
pub enum CategoryOutput {
    Files(BTreeMap<String, FileInfo>),
    EnvVars(BTreeMap<String, EnvVar>),
    ProcessEnvVars(BTreeMap<u32, ProcessEnvVar>),
    Packages(BTreeMap<String, PackageInfo>),
    Services(BTreeMap<String, ServiceInfo>),
    Network(NetworkState),
    Docker(DockerState),
    Resources(SystemResources),
    ScheduledTasks(ScheduledTasks),
    Certificates(BTreeMap<String, Certificate>),
    UsersGroups(UserGroupState),
}

/// Output plus the optional cancellation marker of one collector run.
pub struct Collected {
    pub output: CategoryOutput,
    pub error: Option<CollectError>,
}

impl Collected {
    fn new(output: CategoryOutput, error: Option<CollectError>) -> Self {
        Self { output, error }
    }
}

/// One snapshot category producer.
pub trait Collector: Send + Sync {
    /// Category name used in error annotations.
    fn name(&self) -> &'static str;

    /// Whether the configuration enables this collector.
    fn enabled(&self, config: &CollectorConfig) -> bool;

    /// Produce the category output, honoring the context deadline.
    fn run(&self, cx: &CollectContext) -> Collected;
}

struct FilesCollector;

impl Collector for FilesCollector {
    fn name(&self) -> &'static str {
        "files"
    }

    fn enabled(&self, config: &CollectorConfig) -> bool {
        config.files.enabled
    }

    fn run(&self, cx: &CollectContext) -> Collected {
        let (out, err) = files::collect_files(&cx.config.files, cx.workers, &cx.deadline);
        Collected::new(CategoryOutput::Files(out), err)
    }
}

struct EnvVarsCollector;

impl Collector for EnvVarsCollector {
    fn name(&self) -> &'static str {
        "env_vars"
    }

    fn enabled(&self, config: &CollectorConfig) -> bool {
        config.env_vars.enabled
    }

    fn run(&self, cx: &CollectContext) -> Collected {
        let (out, err) = env_vars::collect_env_vars(&cx.config.env_vars, &cx.deadline);
        Collected::new(CategoryOutput::EnvVars(out), err)
    }
}

struct ProcessEnvVarsCollector;

impl Collector for ProcessEnvVarsCollector {
    fn name(&self) -> &'static str {
        "process_env_vars"
    }

    fn enabled(&self, config: &CollectorConfig) -> bool {
        config.process_env_vars.enabled
    }

    fn run(&self, cx: &CollectContext) -> Collected {
        let (out, err) =
            process_env::collect_process_env_vars(&cx.config.process_env_vars, &cx.deadline);
        Collected::new(CategoryOutput::ProcessEnvVars(out), err)
    }
}

struct PackagesCollector;

impl Collector for PackagesCollector {
    fn name(&self) -> &'static str {
        "packages"
    }

    fn enabled(&self, config: &CollectorConfig) -> bool {
        config.packages.enabled
    }

    fn run(&self, cx: &CollectContext) -> Collected {
        let (out, err) = packages::collect_packages(&cx.config.packages, &cx.runner, &cx.deadline);
        Collected::new(CategoryOutput::Packages(out), err)
    }
}

struct ServicesCollector;

impl Collector for ServicesCollector {
    fn name(&self) -> &'static str {
        "services"
    }

    fn enabled(&self, config: &CollectorConfig) -> bool {
        config.services.enabled
    }

    fn run(&self, cx: &CollectContext) -> Collected {
        let (out, err) = services::collect_services(&cx.config.services, &cx.runner, &cx.deadline);
        Collected::new(CategoryOutput::Services(out), err)
    }
}

struct NetworkCollector;

impl Collector for NetworkCollector {
    fn name(&self) -> &'static str {
        "network"
    }

    fn enabled(&self, config: &CollectorConfig) -> bool {
        config.network.enabled
    }

    fn run(&self, cx: &CollectContext) -> Collected {
        let (out, err) = network::collect_network(&cx.config.network, &cx.runner, &cx.deadline);
        Collected::new(CategoryOutput::Network(out), err)
    }
}

struct DockerCollector;

impl Collector for DockerCollector {
    fn name(&self) -> &'static str {
        "docker"
    }

    fn enabled(&self, config: &CollectorConfig) -> bool {
        config.docker.enabled
    }

    fn run(&self, cx: &CollectContext) -> Collected {
        let (out, err) = docker::collect_docker(&cx.config.docker, &cx.deadline);
        Collected::new(CategoryOutput::Docker(out), err)
    }
}

struct ResourcesCollector;

impl Collector for ResourcesCollector {
    fn name(&self) -> &'static str {
        "system_resources"
    }

    fn enabled(&self, config: &CollectorConfig) -> bool {
        config.system_resources.enabled
    }

    fn run(&self, cx: &CollectContext) -> Collected {
        let (out, err) =
            resources::collect_resources(&cx.config.system_resources, &cx.runner, &cx.deadline);
        Collected::new(CategoryOutput::Resources(out), err)
    }
}

struct ScheduledTasksCollector;

impl Collector for ScheduledTasksCollector {
    fn name(&self) -> &'static str {
        "scheduled_tasks"
    }

    fn enabled(&self, config: &CollectorConfig) -> bool {
        config.scheduled_tasks.enabled
    }

    fn run(&self, cx: &CollectContext) -> Collected {
        let (out, err) =
            tasks::collect_scheduled_tasks(&cx.config.scheduled_tasks, &cx.runner, &cx.deadline);
        Collected::new(CategoryOutput::ScheduledTasks(out), err)
    }
}

struct CertificatesCollector;

impl Collector for CertificatesCollector {
    fn name(&self) -> &'static str {
        "certificates"
    }

    fn enabled(&self, config: &CollectorConfig) -> bool {
        config.certificates.enabled
    }

    fn run(&self, cx: &CollectContext) -> Collected {
        let (out, err) = certificates::collect_certificates(&cx.config.certificates, &cx.deadline);
        Collected::new(CategoryOutput::Certificates(out), err)
    }
}

struct UsersGroupsCollector;

impl Collector for UsersGroupsCollector {
    fn name(&self) -> &'static str {
        "users_groups"
    }

    fn enabled(&self, config: &CollectorConfig) -> bool {
        config.users_groups.enabled
    }

    fn run(&self, cx: &CollectContext) -> Collected {
        let (out, err) = users::collect_users_groups(&cx.config.users_groups, &cx.deadline);
        Collected::new(CategoryOutput::UsersGroups(out), err)
    }
}

/// The full ordered collector set.
fn registry() -> Vec<Box<dyn Collector>> {
    vec![
        Box::new(FilesCollector),
        Box::new(EnvVarsCollector),
        Box::new(ProcessEnvVarsCollector),
        Box::new(PackagesCollector),
        Box::new(ServicesCollector),
        Box::new(NetworkCollector),
        Box::new(DockerCollector),
        Box::new(ResourcesCollector),
        Box::new(ScheduledTasksCollector),
        Box::new(CertificatesCollector),
        Box::new(UsersGroupsCollector),
    ]
}

/// Collect a complete environment snapshot with no overall deadline.
pub fn collect(config: CollectorConfig, name: &str) -> (EnvironmentSnapshot, Vec<CollectorError>) {
    collect_with_deadline(config, name, Deadline::none())
}

/// Collect a complete environment snapshot under a deadline.
///
/// Always returns a snapshot. Disabled collectors leave their category
/// empty; a collector cut short by the deadline contributes its partial
/// output plus an entry in the error list.
pub fn collect_with_deadline(
    config: CollectorConfig,
    name: &str,
    deadline: Deadline,
) -> (EnvironmentSnapshot, Vec<CollectorError>) {
    let cx = CollectContext::new(config, deadline);
    let collectors = registry();

    let mut snapshot = EnvironmentSnapshot {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        hostname: hostname(),
        timestamp: crate::model::monotonic_utc_now(),
        os: os_info::collect_os_info(&cx.runner, &cx.deadline),
        ..Default::default()
    };

    let mut errors = Vec::new();
    let (result_tx, result_rx) = mpsc::channel::<(&'static str, Collected)>();

    thread::scope(|scope| {
        for collector in &collectors {
            if !collector.enabled(&cx.config) {
                debug!(collector = collector.name(), "disabled, skipping");
                continue;
            }
            let result_tx = result_tx.clone();
            let cx = &cx;
            scope.spawn(move || {
                let collected = collector.run(cx);
                let _ = result_tx.send((collector.name(), collected));
            });
        }
        drop(result_tx);

        for (name, collected) in result_rx {
            if let Some(error) = &collected.error {
                errors.push(CollectorError::new(name, error));
            }
            apply_output(&mut snapshot, collected.output);
        }
    });

    info!(
        snapshot = %snapshot.id,
        name = %snapshot.name,
        errors = errors.len(),
        "snapshot collected"
    );
    (snapshot, errors)
}

fn apply_output(snapshot: &mut EnvironmentSnapshot, output: CategoryOutput) {
    match output {
        CategoryOutput::Files(v) => snapshot.files = v,
        CategoryOutput::EnvVars(v) => snapshot.env_vars = v,
        CategoryOutput::ProcessEnvVars(v) => snapshot.process_env_vars = v,
        CategoryOutput::Packages(v) => snapshot.packages = v,
        CategoryOutput::Services(v) => snapshot.services = v,
        CategoryOutput::Network(v) => snapshot.network = v,
        CategoryOutput::Docker(v) => snapshot.docker = v,
        CategoryOutput::Resources(v) => snapshot.system_resources = v,
        CategoryOutput::ScheduledTasks(v) => snapshot.scheduled_tasks = v,
        CategoryOutput::Certificates(v) => snapshot.certificates = v,
        CategoryOutput::UsersGroups(v) => snapshot.users_groups = v,
    }
}

/// Host name via `gethostname`, falling back to the environment.
#[cfg(unix)]
fn hostname() -> String {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc == 0 {
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        if let Ok(name) = std::str::from_utf8(&buf[..end]) {
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }
    hostname_from_env()
}

#[cfg(not(unix))]
fn hostname() -> String {
    hostname_from_env()
}

fn hostname_from_env() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("HOST"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_config::{
        CertificatesConfig, DockerConfig, EnvVarsConfig, FilesConfig, NetworkConfig,
        PackagesConfig, ProcessEnvVarsConfig, ScheduledTasksConfig, ServicesConfig,
        SystemResourcesConfig, UsersGroupsConfig,
    };

    fn minimal_config() -> CollectorConfig {
        CollectorConfig {
            files: FilesConfig {
                enabled: false,
                ..Default::default()
            },
            env_vars: EnvVarsConfig::default(),
            process_env_vars: ProcessEnvVarsConfig {
                enabled: false,
                ..Default::default()
            },
            packages: PackagesConfig {
                enabled: false,
                ..Default::default()
            },
            services: ServicesConfig {
                enabled: false,
                ..Default::default()
            },
            network: NetworkConfig {
                enabled: false,
                ..Default::default()
            },
            docker: DockerConfig {
                enabled: false,
                ..Default::default()
            },
            system_resources: SystemResourcesConfig {
                enabled: false,
                ..Default::default()
            },
            scheduled_tasks: ScheduledTasksConfig {
                enabled: false,
                ..Default::default()
            },
            certificates: CertificatesConfig {
                enabled: false,
                ..Default::default()
            },
            users_groups: UsersGroupsConfig {
                enabled: false,
                ..Default::default()
            },
            severity_rules: Default::default(),
        }
    }

    #[test]
    fn test_snapshot_header_is_well_formed() {
        let (snapshot, errors) = collect(minimal_config(), "baseline");
        assert!(Uuid::parse_str(&snapshot.id).is_ok());
        assert_eq!(snapshot.name, "baseline");
        assert!(!snapshot.hostname.is_empty());
        assert_eq!(snapshot.os.name, std::env::consts::OS);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_disabled_collectors_leave_slots_empty() {
        let (snapshot, _) = collect(minimal_config(), "empty");
        assert!(snapshot.files.is_empty());
        assert!(snapshot.packages.is_empty());
        assert!(snapshot.services.is_empty());
        assert!(snapshot.network.interfaces.is_empty());
        // env vars stay enabled in the minimal config
        assert!(!snapshot.env_vars.is_empty());
    }

    #[test]
    fn test_snapshot_ids_are_unique_and_timestamps_advance() {
        let (a, _) = collect(minimal_config(), "a");
        let (b, _) = collect(minimal_config(), "b");
        assert_ne!(a.id, b.id);
        assert!(a.timestamp < b.timestamp);
    }

    #[test]
    fn test_file_collection_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.conf"), "key=value").unwrap();

        let mut config = minimal_config();
        config.files = FilesConfig {
            enabled: true,
            paths: vec![dir.path().to_string_lossy().to_string()],
            ..Default::default()
        };

        let (snapshot, errors) = collect(config, "files");
        assert!(errors.is_empty());
        assert!(snapshot
            .files
            .keys()
            .any(|path| path.ends_with("app.conf")));
    }

    #[test]
    fn test_default_workers_floor() {
        assert!(default_workers() >= 2);
    }
}
