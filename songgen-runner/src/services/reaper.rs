//! Invalid-candidate reaper
//!
//! Rows without a finished duration are left over from earlier jobs (stuck or
//! failed generations). They are deleted before a new submission so the
//! poller only ever sees this job's candidates.

use super::poller::row_duration;
use crate::page::{locate, locate_within, ElementHandle, PageClient, PageError, Selectors};
use crate::utils::Pacing;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ReapError {
    #[error("{count} pending songs exceed the deletion limit of {max}")]
    TooManyPending { count: usize, max: usize },

    #[error("Could not find a song's menu toggle")]
    MenuToggleMissing,

    #[error("Couldn't find a song's menu")]
    MenuNotOpened,

    #[error("Couldn't find a song's delete action")]
    DeleteActionMissing,

    #[error(transparent)]
    Page(#[from] PageError),
}

impl ReapError {
    pub fn kind(&self) -> crate::error::ErrorKind {
        match self {
            ReapError::TooManyPending { .. } => crate::error::ErrorKind::Structural,
            _ => crate::error::ErrorKind::Interaction,
        }
    }
}

/// Delete every pending row; returns how many were deleted
///
/// All menu toggles are located before anything is clicked, and the pending
/// count is checked against `max_deletions` up front, so a failure in either
/// leaves the list untouched. After each deletion `shared_input` is clicked to
/// dismiss leftover menu state.
pub async fn reap_pending<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
    pacing: &Pacing,
    shared_input: &ElementHandle,
    max_deletions: usize,
) -> Result<usize, ReapError> {
    let rows = page.find_all(&selectors.song_row).await?;
    if rows.is_empty() {
        return Ok(0);
    }

    let mut toggles = Vec::new();
    for row in &rows {
        if row_duration(page, row, &selectors.row_duration).await?.is_some() {
            continue;
        }
        let toggle = locate_within(page, row, &selectors.row_menu_toggle)
            .await?
            .ok_or(ReapError::MenuToggleMissing)?;
        toggles.push(toggle);
    }

    if toggles.is_empty() {
        return Ok(0);
    }

    if toggles.len() > max_deletions {
        warn!(pending = toggles.len(), max = max_deletions, "Too many songs to delete");
        return Err(ReapError::TooManyPending {
            count: toggles.len(),
            max: max_deletions,
        });
    }

    let mut deleted = 0;
    for toggle in &toggles {
        page.click(toggle).await?;
        pacing.micro().await;

        let menu = locate(page, &selectors.options_menu)
            .await?
            .ok_or(ReapError::MenuNotOpened)?;
        let delete = find_delete_action(page, selectors, &menu)
            .await?
            .ok_or(ReapError::DeleteActionMissing)?;

        page.click(&delete).await?;
        pacing.micro().await;
        page.click(shared_input).await?;
        pacing.micro().await;
        deleted += 1;
    }

    info!(deleted, "Deleted pending songs");
    Ok(deleted)
}

/// The single menu entry whose label names the delete action
async fn find_delete_action<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
    menu: &ElementHandle,
) -> Result<Option<ElementHandle>, PageError> {
    let mut matches = Vec::new();
    for label in page.find_all_within(menu, &selectors.menu_item_label).await? {
        if selectors.is_delete_label(&page.read_text(&label).await?) {
            matches.push(label);
        }
    }

    Ok(if matches.len() == 1 { matches.pop() } else { None })
}
