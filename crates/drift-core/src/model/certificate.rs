//! X.509 certificate entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One certificate found on disk.
///
/// Snapshot keys are the file path, or `path:index` when one file holds
/// multiple PEM blocks. The fingerprint is the MD5 of the raw file bytes,
/// hex encoded, so any byte-level change to the file reads as a changed
/// certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub path: String,
    /// Subject common name.
    pub domain: String,
    /// Issuer common name.
    pub issuer: String,
    pub subject: String,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    pub serial_number: String,
    pub fingerprint: String,
    /// `now >= not_before && !is_expired` at collection time.
    pub is_valid: bool,
    /// `now >= not_after` at collection time.
    pub is_expired: bool,
    /// `floor((not_after - now) / 24h)`; negative once expired.
    pub days_to_expire: i64,
}
