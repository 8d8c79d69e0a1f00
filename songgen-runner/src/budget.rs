//! Session time budget
//!
//! Every job runs under a caller-set wall-clock ceiling. The last
//! `safety_margin` seconds of that ceiling are reserved for teardown (profile
//! upload, directory cleanup), so the usable window is
//! `max_runtime - safety_margin`.
//!
//! The budget is consulted between phases only; it never interrupts a phase
//! that is already running.

use std::time::Duration;
use tokio::time::Instant;

/// Lower bound accepted for `max_runtime` (7 minutes)
pub const MIN_RUNTIME_SECS: u64 = 420;
/// Upper bound accepted for `max_runtime` (14 minutes)
pub const MAX_RUNTIME_SECS: u64 = 840;
/// Time reserved for teardown
pub const SAFETY_MARGIN_SECS: u64 = 100;

/// Immutable deadline arithmetic for one job
#[derive(Debug, Clone, Copy)]
pub struct SessionBudget {
    start_time: Instant,
    max_runtime: Duration,
    safety_margin: Duration,
}

impl SessionBudget {
    /// Create a budget starting at `start_time`
    ///
    /// `max_runtime` must already be validated against
    /// [`MIN_RUNTIME_SECS`]..=[`MAX_RUNTIME_SECS`].
    pub fn new(start_time: Instant, max_runtime: Duration) -> Self {
        Self {
            start_time,
            max_runtime,
            safety_margin: Duration::from_secs(SAFETY_MARGIN_SECS),
        }
    }

    /// Check whether a runtime (in seconds) is inside the accepted window
    pub fn is_valid_runtime(max_runtime_secs: u64) -> bool {
        (MIN_RUNTIME_SECS..=MAX_RUNTIME_SECS).contains(&max_runtime_secs)
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn max_runtime(&self) -> Duration {
        self.max_runtime
    }

    /// The part of `max_runtime` usable by the main flow
    pub fn usable_window(&self) -> Duration {
        self.max_runtime.saturating_sub(self.safety_margin)
    }

    /// `now - start_time < max_runtime - safety_margin`
    pub fn has_time_remaining(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.start_time) < self.usable_window()
    }

    /// Whether a phase of length `needed` fits entirely before the deadline
    pub fn has_time_for(&self, now: Instant, needed: Duration) -> bool {
        self.has_time_remaining(now + needed)
    }

    /// [`has_time_remaining`](Self::has_time_remaining) against the current instant
    pub fn remaining(&self) -> bool {
        self.has_time_remaining(Instant::now())
    }

    /// Seconds elapsed since the job started
    pub fn elapsed(&self) -> Duration {
        Instant::now().saturating_duration_since(self.start_time)
    }
}
