//! driftmon core library.
//!
//! Two-stage pipeline over host state:
//! - `collect` fans out to per-category collectors and aggregates an
//!   [`model::EnvironmentSnapshot`]
//! - `compare` reduces two snapshots to a severity-classified
//!   [`compare::DriftReport`]
//!
//! The CLI surface, config file parsing, output encoders and the periodic
//! scheduler live in collaborating crates; this crate fixes the contracts
//! they consume.

pub mod collect;
pub mod compare;
pub mod exit_codes;
pub mod model;

pub use collect::{collect, CollectContext};
pub use compare::{Comparator, DriftReport};
pub use exit_codes::ExitCode;
pub use model::EnvironmentSnapshot;
