//! Randomised human-like waits between page interactions
//!
//! Four tiers (micro, short, normal, long), each a closed range of whole
//! seconds. The runner sleeps for a uniformly random value in the tier's range.

use rand::Rng;
use serde::Deserialize;
use std::time::Duration;

/// Closed range of seconds to wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WaitRange {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl WaitRange {
    pub const fn new(min_secs: u64, max_secs: u64) -> Self {
        Self { min_secs, max_secs }
    }

    /// No waiting at all (used by tests)
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    /// Pick a duration inside the range
    pub fn sample(&self) -> Duration {
        let (low, high) = if self.min_secs <= self.max_secs {
            (self.min_secs, self.max_secs)
        } else {
            (self.max_secs, self.min_secs)
        };
        if low == high {
            return Duration::from_secs(low);
        }
        Duration::from_secs(rand::thread_rng().gen_range(low..=high))
    }
}

/// Pacing tiers
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Pacing {
    pub micro: WaitRange,
    pub short: WaitRange,
    pub normal: WaitRange,
    pub long: WaitRange,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            micro: WaitRange::new(1, 2),
            short: WaitRange::new(2, 5),
            normal: WaitRange::new(15, 20),
            long: WaitRange::new(25, 30),
        }
    }
}

impl Pacing {
    /// Pacing with every tier set to zero
    pub fn immediate() -> Self {
        Self {
            micro: WaitRange::zero(),
            short: WaitRange::zero(),
            normal: WaitRange::zero(),
            long: WaitRange::zero(),
        }
    }

    pub async fn micro(&self) {
        sleep_for(self.micro.sample()).await;
    }

    pub async fn short(&self) {
        sleep_for(self.short.sample()).await;
    }

    pub async fn normal(&self) {
        sleep_for(self.normal.sample()).await;
    }

    pub async fn long(&self) {
        sleep_for(self.long.sample()).await;
    }
}

/// Sleep unless the duration is zero
pub async fn sleep_for(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
