//! Artifact downloader
//!
//! The browser saves into a job-exclusive directory that starts empty, so the
//! download is complete exactly when that directory holds one file with an
//! accepted extension. Any other non-empty state means the directory is dirty
//! and is never resolved by guessing.

use crate::page::{locate, locate_within, ElementHandle, PageClient, PageError, Selectors};
use crate::utils::{sleep_for, Pacing};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Lowercase extensions accepted as a finished audio download
pub const ACCEPTED_EXTENSIONS: &[&str] = &["mp3", "wav", "mpeg"];

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Could not find the song's menu toggle")]
    MenuMissing,

    #[error("Could not find the {0}")]
    ActionMissing(&'static str),

    #[error("No file appeared after {waited_secs} seconds")]
    Timeout { waited_secs: u64 },

    #[error("Download directory is dirty: {0}")]
    Integrity(String),

    #[error("Download directory {0} does not exist")]
    DirectoryMissing(PathBuf),

    #[error("Could not read the download directory: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Page(#[from] PageError),
}

impl DownloadError {
    pub fn kind(&self) -> crate::error::ErrorKind {
        match self {
            DownloadError::Timeout { .. } => crate::error::ErrorKind::Timeout,
            DownloadError::Integrity(_) => crate::error::ErrorKind::Structural,
            DownloadError::DirectoryMissing(_) | DownloadError::Io(_) => {
                crate::error::ErrorKind::Unexpected
            }
            _ => crate::error::ErrorKind::Interaction,
        }
    }
}

/// State of the download directory at one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryState {
    Empty,
    Ready(PathBuf),
    /// One file with a rejected extension
    Rejected(PathBuf),
    TooMany(usize),
}

fn has_accepted_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ACCEPTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Classify the regular files directly inside `dir`
pub fn inspect_directory(dir: &Path) -> Result<DirectoryState, DownloadError> {
    if !dir.is_dir() {
        return Err(DownloadError::DirectoryMissing(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }

    Ok(match files.len() {
        0 => DirectoryState::Empty,
        1 => {
            let file = files.remove(0);
            if has_accepted_extension(&file) {
                DirectoryState::Ready(file)
            } else {
                DirectoryState::Rejected(file)
            }
        }
        n => DirectoryState::TooMany(n),
    })
}

/// Poll `dir` until exactly one accepted file appears
pub async fn wait_for_download(
    dir: &Path,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<PathBuf, DownloadError> {
    let started = Instant::now();
    let deadline = started + timeout;

    loop {
        match inspect_directory(dir)? {
            DirectoryState::Ready(path) => {
                info!(path = %path.display(), "Song downloaded");
                return Ok(path);
            }
            DirectoryState::Rejected(path) => {
                warn!(path = %path.display(), "Downloaded file has a rejected extension");
                return Err(DownloadError::Integrity(format!(
                    "unexpected file {}",
                    path.display()
                )));
            }
            DirectoryState::TooMany(n) => {
                warn!(files = n, "Too many files in the download directory");
                return Err(DownloadError::Integrity(format!("{} files present", n)));
            }
            DirectoryState::Empty => {
                if Instant::now() >= deadline {
                    return Err(DownloadError::Timeout {
                        waited_secs: started.elapsed().as_secs(),
                    });
                }
                debug!("Download directory still empty");
                sleep_for(poll_interval).await;
            }
        }
    }
}

/// Row menu → download entry → audio format
pub async fn trigger_download<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
    pacing: &Pacing,
    row: &ElementHandle,
) -> Result<(), DownloadError> {
    let toggle = locate_within(page, row, &selectors.row_menu_toggle)
        .await?
        .ok_or(DownloadError::MenuMissing)?;
    page.click(&toggle).await?;
    pacing.short().await;

    let download = locate(page, &selectors.download_menu_item)
        .await?
        .ok_or(DownloadError::ActionMissing("download menu entry"))?;
    page.click(&download).await?;
    pacing.short().await;

    let audio = locate(page, &selectors.audio_download_option)
        .await?
        .ok_or(DownloadError::ActionMissing("audio download option"))?;
    page.click(&audio).await?;
    pacing.short().await;

    info!("Requested the audio download");
    Ok(())
}

/// Trigger the download of `row` and wait for the file
pub async fn download_song<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
    pacing: &Pacing,
    row: &ElementHandle,
    dir: &Path,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<PathBuf, DownloadError> {
    trigger_download(page, selectors, pacing, row).await?;
    wait_for_download(dir, timeout, poll_interval).await
}
