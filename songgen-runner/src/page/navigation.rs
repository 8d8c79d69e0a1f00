//! Bounded reload-on-timeout navigation
//!
//! A page load is given `load_wait` to reach `document.readyState ==
//! "complete"`. On timeout the page is refreshed and waited on again, up to
//! `max_attempts` waits in total.

use super::{PageClient, PageError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Attempt budget for one load ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationSettings {
    pub max_attempts: u32,
    pub load_wait: Duration,
    pub poll_interval: Duration,
}

impl NavigationSettings {
    /// Top-level page loads: 3 attempts of 20s
    pub fn page_load() -> Self {
        Self {
            max_attempts: 3,
            load_wait: Duration::from_secs(20),
            poll_interval: Duration::from_millis(500),
        }
    }

    /// Detail view loads: 5 attempts of 15s
    pub fn detail_load() -> Self {
        Self {
            max_attempts: 5,
            load_wait: Duration::from_secs(15),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Load ladder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationLadder {
    /// Waiting on attempt `attempt` (1-based)
    Loading { attempt: u32 },
    Loaded { attempt: u32 },
    Failed { attempts: u32 },
}

impl NavigationLadder {
    pub fn start() -> Self {
        NavigationLadder::Loading { attempt: 1 }
    }

    /// Feed the outcome of the current wait
    pub fn advance(self, loaded: bool, max_attempts: u32) -> Self {
        match self {
            NavigationLadder::Loading { attempt } if loaded => NavigationLadder::Loaded { attempt },
            NavigationLadder::Loading { attempt } if attempt >= max_attempts => {
                NavigationLadder::Failed { attempts: attempt }
            }
            NavigationLadder::Loading { attempt } => NavigationLadder::Loading { attempt: attempt + 1 },
            terminal => terminal,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, NavigationLadder::Loading { .. })
    }
}

/// Poll the ready state until complete or `timeout` elapses
pub async fn wait_until_ready<P: PageClient + ?Sized>(
    page: &P,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<bool, PageError> {
    let deadline = Instant::now() + timeout;
    loop {
        if page.ready_state_complete().await? {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Wait for the current page, refreshing on timeout; returns the final ladder state
pub async fn reload_until_ready<P: PageClient + ?Sized>(
    page: &P,
    settings: &NavigationSettings,
) -> Result<NavigationLadder, PageError> {
    let mut ladder = NavigationLadder::start();

    while let NavigationLadder::Loading { attempt } = ladder {
        let loaded = wait_until_ready(page, settings.load_wait, settings.poll_interval).await?;
        ladder = ladder.advance(loaded, settings.max_attempts);

        if let NavigationLadder::Loading { .. } = ladder {
            warn!(attempt, "Page load timed out, refreshing");
            page.refresh().await?;
        }
    }

    Ok(ladder)
}

/// Open `url` and wait for it to load
pub async fn navigate<P: PageClient + ?Sized>(
    page: &P,
    url: &str,
    settings: &NavigationSettings,
) -> Result<(), PageError> {
    info!(url, "Navigating");
    page.goto(url).await?;

    match reload_until_ready(page, settings).await? {
        NavigationLadder::Loaded { attempt } => {
            info!(url, attempt, "Page loaded");
            Ok(())
        }
        _ => Err(PageError::NavigationFailed {
            url: url.to_string(),
            attempts: settings.max_attempts,
        }),
    }
}
