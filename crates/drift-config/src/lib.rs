//! Collection configuration for driftmon.
//!
//! This crate defines the typed configuration consumed by the collection
//! orchestrator: one group per snapshot category plus the severity rules
//! used by the comparator. Parsing the on-disk config file is the CLI's
//! concern; this crate only fixes the shape and the defaults.
//!
//! Invalid values degrade rather than fail:
//! - unknown `hash_algo` falls back to sha256
//! - unknown `init_type` falls back to the OS default
//! - invalid regular expressions are dropped at compile time

pub mod compile;
mod groups;

pub use compile::{compile_patterns, matches_filters};
pub use groups::{
    CertificatesConfig, CollectorConfig, DockerConfig, EnvVarsConfig, FilesConfig, HashAlgo,
    InitType, NetworkConfig, PackagesConfig, ProcessEnvVarsConfig, ScheduledTasksConfig,
    ServicesConfig, SeverityRulesConfig, SystemResourcesConfig, UsersGroupsConfig,
};
