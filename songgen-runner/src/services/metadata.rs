//! Song metadata: title, genre and lyrics of the selected candidate

use crate::models::GenerationRequest;
use crate::page::{
    locate, locate_within, reload_until_ready, ElementHandle, NavigationLadder, NavigationSettings,
    PageClient, PageError, Selectors,
};
use crate::utils::{sleep_for, Pacing};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lyrics stored for instrumental songs
pub const INSTRUMENTAL_LYRICS: &str = "[Instrumental]";
/// Shortest lyrics text accepted from the detail page
pub const MIN_LYRICS_LENGTH: usize = 30;
/// Placeholder shown while a row's metadata is still being generated
const LOADING_MARKER: &str = "Loading";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Could not read the song title")]
    TitleMissing,

    #[error("Could not read the song genre")]
    GenreMissing,

    #[error("Song metadata is still loading")]
    StillLoading,

    #[error("Could not find the song's title link")]
    TitleLinkMissing,

    #[error("Song detail page failed to load after {attempts} attempts")]
    DetailNavigation { attempts: u32 },

    #[error("Not on the song detail page (at {0})")]
    NotOnDetailPage(String),

    #[error("Could not find the lyrics text area")]
    LyricsMissing,

    #[error("Lyrics are only {0} characters long")]
    LyricsTooShort(usize),

    #[error(transparent)]
    Page(#[from] PageError),
}

impl ExtractionError {
    pub fn kind(&self) -> crate::error::ErrorKind {
        match self {
            ExtractionError::StillLoading | ExtractionError::LyricsTooShort(_) => {
                crate::error::ErrorKind::Content
            }
            _ => crate::error::ErrorKind::Interaction,
        }
    }
}

/// Title and genre shown on the candidate row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongMetadata {
    pub title: String,
    pub genre: String,
}

async fn read_label<P: PageClient + ?Sized>(
    page: &P,
    row: &ElementHandle,
    selector: &str,
    missing: ExtractionError,
) -> Result<String, ExtractionError> {
    let Some(label) = locate_within(page, row, selector).await? else {
        return Err(missing);
    };
    let text = page.read_text(&label).await?;
    let text = text.trim();
    if text.is_empty() {
        return Err(missing);
    }
    if text.contains(LOADING_MARKER) {
        return Err(ExtractionError::StillLoading);
    }
    Ok(text.to_string())
}

/// Read title and genre from the selected row
pub async fn read_title_and_genre<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
    row: &ElementHandle,
) -> Result<SongMetadata, ExtractionError> {
    let title = read_label(page, row, &selectors.row_title, ExtractionError::TitleMissing).await?;
    let genre = read_label(page, row, &selectors.row_genre, ExtractionError::GenreMissing).await?;
    info!(title = %title, genre = %genre, "Read song metadata");
    Ok(SongMetadata { title, genre })
}

/// Open the detail page of `row` through its title link
pub async fn open_song_details<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
    pacing: &Pacing,
    row: &ElementHandle,
    settings: &NavigationSettings,
    details_url: &str,
) -> Result<(), ExtractionError> {
    let link = locate_within(page, row, &selectors.row_title)
        .await?
        .ok_or(ExtractionError::TitleLinkMissing)?;
    page.click(&link).await?;
    pacing.micro().await;

    match reload_until_ready(page, settings).await? {
        NavigationLadder::Loaded { attempt } => {
            debug!(attempt, "Detail page loaded");
        }
        _ => {
            return Err(ExtractionError::DetailNavigation {
                attempts: settings.max_attempts,
            })
        }
    }

    let location = page.current_location().await?;
    if !location.starts_with(details_url) {
        return Err(ExtractionError::NotOnDetailPage(location));
    }
    info!("Landed on the song detail page");
    Ok(())
}

/// Read lyrics from the detail page
///
/// Waits `extra_wait` once more if the page has drifted away from the detail
/// view since it loaded.
pub async fn read_lyrics<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
    details_url: &str,
    extra_wait: Duration,
) -> Result<String, ExtractionError> {
    if !page.current_location().await?.starts_with(details_url) {
        warn!("Detail page not current yet, waiting");
        sleep_for(extra_wait).await;
    }

    let area = locate(page, &selectors.lyrics_area).await?;
    let location = page.current_location().await?;
    let Some(area) = area else {
        return Err(ExtractionError::LyricsMissing);
    };
    if !location.starts_with(details_url) {
        return Err(ExtractionError::NotOnDetailPage(location));
    }

    let lyrics = page.read_text(&area).await?;
    let length = lyrics.chars().count();
    if length < MIN_LYRICS_LENGTH {
        return Err(ExtractionError::LyricsTooShort(length));
    }
    Ok(lyrics)
}

/// Lyrics that need no page visit, or `None` when they must be scraped
///
/// Instrumentals get [`INSTRUMENTAL_LYRICS`]; custom vocal songs keep the
/// author's lyrics verbatim.
pub fn known_lyrics(request: &GenerationRequest) -> Option<String> {
    if request.instrumental {
        return Some(INSTRUMENTAL_LYRICS.to_string());
    }
    request.submitted_lyrics().map(str::to_string)
}
