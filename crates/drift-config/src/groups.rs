//! Per-category configuration groups.

use serde::{Deserialize, Deserializer, Serialize};

fn default_max_processes() -> usize {
    10
}

fn default_socket_path() -> String {
    "/var/run/docker.sock".to_string()
}

fn default_cert_days_threshold() -> i64 {
    30
}

/// File content hash algorithm. Unknown names fall back to sha256.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgo {
    #[default]
    Sha256,
    Md5,
}

impl<'de> Deserialize<'de> for HashAlgo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "md5" => HashAlgo::Md5,
            "sha256" => HashAlgo::Sha256,
            other => {
                tracing::warn!(hash_algo = other, "unknown hash algorithm, using sha256");
                HashAlgo::Sha256
            }
        })
    }
}

/// Init system to query for services. `Auto` picks launchd on macOS and
/// systemd elsewhere; unknown names resolve to `Auto`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InitType {
    #[default]
    Auto,
    Systemd,
    Sysvinit,
    Launchd,
}

impl<'de> Deserialize<'de> for InitType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "systemd" => InitType::Systemd,
            "sysvinit" => InitType::Sysvinit,
            "launchd" => InitType::Launchd,
            "" | "auto" => InitType::Auto,
            other => {
                tracing::warn!(init_type = other, "unknown init type, auto-detecting");
                InitType::Auto
            }
        })
    }
}

/// File collection: walked base paths, exclusion regexes, hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub enabled: bool,
    pub paths: Vec<String>,
    /// Regex patterns; a match skips the entry and prunes directories.
    pub exclude_paths: Vec<String>,
    pub follow_links: bool,
    /// 0 means unlimited depth.
    pub max_depth: usize,
    pub hash_algo: HashAlgo,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            paths: vec!["/etc".to_string()],
            exclude_paths: Vec::new(),
            follow_links: false,
            max_depth: 0,
            hash_algo: HashAlgo::Sha256,
        }
    }
}

/// Process environment variables of this process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvVarsConfig {
    pub enabled: bool,
    /// If non-empty, only names matching at least one pattern are kept.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub mask_secrets: bool,
}

impl Default for EnvVarsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include: Vec::new(),
            exclude: Vec::new(),
            mask_secrets: true,
        }
    }
}

/// Environment variables of selected foreign processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessEnvVarsConfig {
    pub enabled: bool,
    /// Executable base names to inspect.
    pub processes: Vec<String>,
    pub max_processes: usize,
    pub mask_secrets: bool,
    pub exclude: Vec<String>,
}

impl ProcessEnvVarsConfig {
    /// Configured process names, or the default interpreter set.
    pub fn process_names(&self) -> Vec<String> {
        if self.processes.is_empty() {
            ["node", "php", "python", "python3", "ruby", "java", "go"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            self.processes.clone()
        }
    }

    /// Configured bound, or the default of 10.
    pub fn max(&self) -> usize {
        if self.max_processes == 0 {
            default_max_processes()
        } else {
            self.max_processes
        }
    }
}

impl Default for ProcessEnvVarsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            processes: Vec::new(),
            max_processes: default_max_processes(),
            mask_secrets: true,
            exclude: Vec::new(),
        }
    }
}

/// Installed packages across package managers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagesConfig {
    pub enabled: bool,
    /// Manager names: apt/dpkg, yum/rpm, apk, pip/pip3, npm, go, brew.
    pub managers: Vec<String>,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            managers: vec!["dpkg".to_string(), "rpm".to_string(), "pip".to_string()],
        }
    }
}

/// System services under the host's init system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub enabled: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub init_type: InitType,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include: Vec::new(),
            exclude: Vec::new(),
            init_type: InitType::Auto,
        }
    }
}

/// Network interfaces, routes, DNS and firewall rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub enabled: bool,
    pub interfaces: bool,
    pub routes: bool,
    pub dns: bool,
    pub firewall_rules: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interfaces: true,
            routes: true,
            dns: true,
            firewall_rules: false,
        }
    }
}

/// Docker engine state over the UNIX socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    pub enabled: bool,
    pub containers: bool,
    pub images: bool,
    pub volumes: bool,
    pub networks: bool,
    pub socket_path: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            containers: true,
            images: true,
            volumes: false,
            networks: false,
            socket_path: default_socket_path(),
        }
    }
}

/// CPU, memory, disk and load probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemResourcesConfig {
    pub enabled: bool,
    pub cpu: bool,
    pub memory: bool,
    pub disks: bool,
    pub load: bool,
}

impl Default for SystemResourcesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cpu: true,
            memory: true,
            disks: true,
            load: true,
        }
    }
}

/// Cron jobs, systemd timers and launchd jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduledTasksConfig {
    pub enabled: bool,
    pub cron_jobs: bool,
    pub systemd_timers: bool,
    pub launchd_jobs: bool,
}

impl Default for ScheduledTasksConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron_jobs: true,
            systemd_timers: true,
            launchd_jobs: true,
        }
    }
}

/// Certificate discovery paths and extensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificatesConfig {
    pub enabled: bool,
    pub paths: Vec<String>,
    pub extensions: Vec<String>,
    /// Expiry warning horizon in days.
    pub days_threshold: i64,
}

impl CertificatesConfig {
    /// Configured scan roots, or the standard certificate locations.
    pub fn scan_paths(&self) -> Vec<String> {
        if !self.paths.is_empty() {
            return self.paths.clone();
        }
        let mut paths = vec![
            "/etc/ssl/certs".to_string(),
            "/etc/letsencrypt".to_string(),
            "/etc/kubernetes".to_string(),
            "/usr/local/share/ca-certificates".to_string(),
        ];
        if let Ok(home) = std::env::var("HOME") {
            paths.push(format!("{home}/.ssh"));
        }
        paths
    }

    /// Configured extensions, or the standard certificate extensions.
    pub fn cert_extensions(&self) -> Vec<String> {
        if !self.extensions.is_empty() {
            return self.extensions.clone();
        }
        [".pem", ".crt", ".cer", ".key", ".p12", ".pfx"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

impl Default for CertificatesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            paths: Vec::new(),
            extensions: Vec::new(),
            days_threshold: default_cert_days_threshold(),
        }
    }
}

/// Users, groups and sudo rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsersGroupsConfig {
    pub enabled: bool,
    pub users: bool,
    pub groups: bool,
    pub sudo_rules: bool,
}

impl Default for UsersGroupsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            users: true,
            groups: true,
            sudo_rules: false,
        }
    }
}

/// Severity escalation rules consumed by the comparator.
///
/// Each list holds names (or the match-all `"*"`); a hit promotes the
/// drift item to critical severity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityRulesConfig {
    pub critical_packages: Vec<String>,
    pub critical_services: Vec<String>,
    pub critical_files: Vec<String>,
    pub critical_env_vars: Vec<String>,
}

/// Root configuration: one group per snapshot category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub files: FilesConfig,
    pub env_vars: EnvVarsConfig,
    pub process_env_vars: ProcessEnvVarsConfig,
    pub packages: PackagesConfig,
    pub services: ServicesConfig,
    pub network: NetworkConfig,
    pub docker: DockerConfig,
    pub system_resources: SystemResourcesConfig,
    pub scheduled_tasks: ScheduledTasksConfig,
    pub certificates: CertificatesConfig,
    pub users_groups: UsersGroupsConfig,
    pub severity_rules: SeverityRulesConfig,
}
