//! Generation poller
//!
//! After submission the list holds the rows this job created (older pending
//! rows were reaped). Those unfinished rows are tracked by position and
//! re-read every interval until all of them report a duration or the
//! generation timeout passes. The leader is the longest finished row of at
//! least the minimum length.

use crate::models::{
    parse_duration, SelectionTracker, SongCandidate, MAX_SONGS_PER_GENERATION,
};
use crate::page::{locate, locate_within, ElementHandle, PageClient, PageError, Selectors};
use crate::utils::{sleep_for, Pacing};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PollError {
    #[error("Could not find the song list")]
    ListMissing,

    #[error("Expected 1 to {max} new songs, found {0}", max = MAX_SONGS_PER_GENERATION)]
    CandidateCount(usize),

    #[error("No song reached the minimum length")]
    NoQualifyingCandidate,

    #[error(transparent)]
    Page(#[from] PageError),
}

impl PollError {
    pub fn kind(&self) -> crate::error::ErrorKind {
        match self {
            PollError::ListMissing | PollError::Page(_) => crate::error::ErrorKind::Interaction,
            PollError::CandidateCount(_) => crate::error::ErrorKind::Structural,
            PollError::NoQualifyingCandidate => crate::error::ErrorKind::Content,
        }
    }
}

/// Timing for one polling run
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub timeout: Duration,
    pub interval: Duration,
}

/// Duration of a row, `None` while it is still generating
pub async fn row_duration<P: PageClient + ?Sized>(
    page: &P,
    row: &ElementHandle,
    selector: &str,
) -> Result<Option<u32>, PageError> {
    match locate_within(page, row, selector).await? {
        Some(label) => Ok(parse_duration(&page.read_text(&label).await?)),
        None => Ok(None),
    }
}

/// Make sure the song list is on the page, retrying once
pub async fn wait_for_song_list<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
    pacing: &Pacing,
) -> Result<ElementHandle, PollError> {
    if let Some(list) = locate(page, &selectors.song_list).await? {
        return Ok(list);
    }

    debug!("Song list not found, retrying");
    pacing.normal().await;

    locate(page, &selectors.song_list)
        .await?
        .ok_or(PollError::ListMissing)
}

/// Rows without a duration, in list order
async fn unfinished_rows<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
) -> Result<Vec<ElementHandle>, PageError> {
    let mut pending = Vec::new();
    for row in page.find_all(&selectors.song_row).await? {
        if row_duration(page, &row, &selectors.row_duration).await?.is_none() {
            pending.push(row);
        }
    }
    Ok(pending)
}

/// Wait for this job's rows to finish and return the leader
pub async fn await_best_candidate<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
    pacing: &Pacing,
    settings: PollSettings,
) -> Result<SongCandidate, PollError> {
    let mut tracked = unfinished_rows(page, selectors).await?;
    if tracked.is_empty() {
        pacing.short().await;
        tracked = unfinished_rows(page, selectors).await?;
    }

    if tracked.is_empty() || tracked.len() > MAX_SONGS_PER_GENERATION {
        warn!(count = tracked.len(), "Unexpected number of new songs");
        return Err(PollError::CandidateCount(tracked.len()));
    }

    info!(count = tracked.len(), "Waiting for songs to finish");
    let deadline = Instant::now() + settings.timeout;
    let mut tracker = SelectionTracker::new();

    loop {
        let mut finished = 0;
        for (index, row) in tracked.iter().enumerate() {
            let duration = row_duration(page, row, &selectors.row_duration).await?;
            if duration.is_some() {
                finished += 1;
            }
            if tracker.observe(index, duration) {
                debug!(index, duration, "New leading song");
            }
        }

        if finished == tracked.len() {
            info!(finished, "All songs finished");
            break;
        }
        if Instant::now() >= deadline {
            warn!(finished, total = tracked.len(), "Generation timed out");
            break;
        }
        sleep_for(settings.interval).await;
    }

    let (index, duration) = tracker.best().ok_or(PollError::NoQualifyingCandidate)?;
    info!(index, duration, "Selected song");
    Ok(SongCandidate {
        handle: tracked[index].clone(),
        duration_seconds: Some(duration),
    })
}
