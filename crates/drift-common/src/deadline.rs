//! Cooperative deadline token shared by all collectors.
//!
//! One `Deadline` is created per collection run and cloned into every
//! collector task. Collectors poll it between units of work (one directory
//! entry, one PID, one environment pair) and return whatever partial state
//! they have accumulated once it expires. Cancellation is cooperative,
//! never preemptive.

use std::time::{Duration, Instant};
use thiserror::Error;

/// Returned by [`Deadline::check`] once the deadline has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deadline exceeded")]
pub struct DeadlineExceeded;

/// A point in time after which collection should wind down.
///
/// `Deadline::none()` never expires; it is used when the caller imposes no
/// overall time limit.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            expires_at: Some(Instant::now() + timeout),
        }
    }

    /// A deadline at an absolute instant.
    pub fn at(instant: Instant) -> Self {
        Self {
            expires_at: Some(instant),
        }
    }

    /// A deadline that never expires.
    pub fn none() -> Self {
        Self { expires_at: None }
    }

    /// Whether the deadline has passed.
    pub fn expired(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }

    /// Poll point for collectors: `Err(DeadlineExceeded)` once expired.
    pub fn check(&self) -> Result<(), DeadlineExceeded> {
        if self.expired() {
            Err(DeadlineExceeded)
        } else {
            Ok(())
        }
    }

    /// Time left before expiry. `None` for an unbounded deadline; zero once
    /// expired.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Remaining time clamped to `cap`, for deriving per-command timeouts.
    pub fn remaining_or(&self, cap: Duration) -> Duration {
        match self.remaining() {
            Some(left) => left.min(cap),
            None => cap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_expires() {
        let d = Deadline::none();
        assert!(!d.expired());
        assert!(d.check().is_ok());
        assert_eq!(d.remaining(), None);
        assert_eq!(d.remaining_or(Duration::from_secs(5)), Duration::from_secs(5));
    }

    #[test]
    fn test_expired_deadline_fails_check() {
        let d = Deadline::at(Instant::now() - Duration::from_millis(1));
        assert!(d.expired());
        assert_eq!(d.check(), Err(DeadlineExceeded));
        assert_eq!(d.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_future_deadline_passes_check() {
        let d = Deadline::after(Duration::from_secs(60));
        assert!(!d.expired());
        assert!(d.check().is_ok());
        assert!(d.remaining().unwrap() > Duration::from_secs(59));
        assert!(d.remaining_or(Duration::from_secs(5)) <= Duration::from_secs(5));
    }
}
