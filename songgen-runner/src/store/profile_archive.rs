//! Browser profile archive
//!
//! A signed-in browser profile is archived after every job and restored
//! before the next one, so most jobs skip the phone sign-in entirely.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Profile directory {0} does not exist")]
    SourceMissing(PathBuf),

    #[error("Archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Archive task failed: {0}")]
    Task(String),
}

/// Profile storage keyed by identity
#[async_trait]
pub trait ProfileArchive: Send + Sync {
    async fn exists(&self, identity: &str) -> Result<bool, ArchiveError>;

    /// Replace the stored profile of `identity` with `local_dir`
    async fn upload(&self, identity: &str, local_dir: &Path) -> Result<(), ArchiveError>;

    /// Restore the stored profile into `local_dir`; `false` when nothing is stored
    async fn download(&self, identity: &str, local_dir: &Path) -> Result<bool, ArchiveError>;
}

/// Directory-backed archive: one subdirectory per identity
#[derive(Debug, Clone)]
pub struct LocalProfileArchive {
    archive_dir: PathBuf,
}

impl LocalProfileArchive {
    pub fn new(archive_dir: PathBuf) -> Self {
        Self { archive_dir }
    }

    fn stored_path(&self, identity: &str) -> PathBuf {
        self.archive_dir.join(format!("{}_chrome_profile", identity))
    }
}

#[async_trait]
impl ProfileArchive for LocalProfileArchive {
    async fn exists(&self, identity: &str) -> Result<bool, ArchiveError> {
        Ok(self.stored_path(identity).is_dir())
    }

    async fn upload(&self, identity: &str, local_dir: &Path) -> Result<(), ArchiveError> {
        if !local_dir.is_dir() {
            return Err(ArchiveError::SourceMissing(local_dir.to_path_buf()));
        }

        let stored = self.stored_path(identity);
        let source = local_dir.to_path_buf();
        let files = tokio::task::spawn_blocking(move || -> Result<usize, ArchiveError> {
            if stored.exists() {
                std::fs::remove_dir_all(&stored)?;
            }
            copy_tree(&source, &stored)
        })
        .await
        .map_err(|e| ArchiveError::Task(e.to_string()))??;

        info!(identity, files, "Archived browser profile");
        Ok(())
    }

    async fn download(&self, identity: &str, local_dir: &Path) -> Result<bool, ArchiveError> {
        let stored = self.stored_path(identity);
        if !stored.is_dir() {
            info!(identity, "No archived browser profile");
            return Ok(false);
        }

        let target = local_dir.to_path_buf();
        let files = tokio::task::spawn_blocking(move || -> Result<usize, ArchiveError> {
            if target.exists() {
                std::fs::remove_dir_all(&target)?;
            }
            copy_tree(&stored, &target)
        })
        .await
        .map_err(|e| ArchiveError::Task(e.to_string()))??;

        info!(identity, files, "Restored browser profile");
        Ok(true)
    }
}

/// Copy every directory and regular file under `source` into `target`
///
/// Symlinks (browser lock files) are skipped. Returns the number of files
/// copied.
fn copy_tree(source: &Path, target: &Path) -> Result<usize, ArchiveError> {
    let mut files = 0;
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| ArchiveError::Task(e.to_string()))?;
        let destination = target.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&destination)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &destination)?;
            files += 1;
        } else {
            debug!(path = %entry.path().display(), "Skipping non-regular file");
        }
    }
    Ok(files)
}
