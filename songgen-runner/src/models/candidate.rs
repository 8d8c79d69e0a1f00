//! Song candidates and the selection policy

use crate::page::ElementHandle;
use once_cell::sync::Lazy;
use regex::Regex;

/// Shortest duration accepted as a real song
pub const MIN_SONG_LENGTH_SECS: u32 = 14;
/// Candidates one submission produces
pub const MAX_SONGS_PER_GENERATION: usize = 2;
/// Duration text shown while a row is still generating
pub const UNFINISHED_DURATION: &str = "--:--";

const MAX_DURATION_TEXT_LENGTH: usize = 5;

static DURATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-1]?[0-9]|2[0-3]):([0-5][0-9])$").expect("duration pattern is valid")
});

/// One row in the result list
///
/// Rows are rediscovered on every poll; the handle is only meaningful until
/// the next listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongCandidate {
    pub handle: ElementHandle,
    /// `None` while the song is still generating
    pub duration_seconds: Option<u32>,
}

impl SongCandidate {
    pub fn is_finished(&self) -> bool {
        self.duration_seconds.is_some()
    }
}

/// Parse `m:ss` duration text into seconds
///
/// Returns `None` for the unfinished placeholder, anything longer than five
/// characters, or text outside the accepted pattern.
pub fn parse_duration(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() || text.len() > MAX_DURATION_TEXT_LENGTH || text == UNFINISHED_DURATION {
        return None;
    }

    let caps = DURATION_PATTERN.captures(text)?;
    let minutes: u32 = caps.get(1)?.as_str().parse().ok()?;
    let seconds: u32 = caps.get(2)?.as_str().parse().ok()?;
    Some(minutes * 60 + seconds)
}

/// Running maximum over candidate durations
///
/// Only durations of at least [`MIN_SONG_LENGTH_SECS`] qualify. A later
/// candidate replaces the leader only with a strictly greater duration, so on
/// ties the first candidate seen keeps the lead.
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    best: Option<(usize, u32)>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a candidate at list position `index`; returns whether it took the lead
    pub fn observe(&mut self, index: usize, duration_seconds: Option<u32>) -> bool {
        let Some(duration) = duration_seconds else {
            return false;
        };
        if duration < MIN_SONG_LENGTH_SECS {
            return false;
        }

        match self.best {
            Some((_, best)) if duration <= best => false,
            _ => {
                self.best = Some((index, duration));
                true
            }
        }
    }

    /// List position and duration of the leader
    pub fn best(&self) -> Option<(usize, u32)> {
        self.best
    }
}
