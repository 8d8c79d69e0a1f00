//! Job-scoped working directories
//!
//! One job owns a download directory, a local profiles directory and a browser
//! extension directory under the root folder. They are created at job start
//! and deleted at job end.

use songgen_common::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directories owned by a single job
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    /// Browser download target; must hold nothing but the job's artifact
    pub downloads_dir: PathBuf,
    /// Unpacked browser profiles
    pub profiles_dir: PathBuf,
    /// Proxy credentials extension
    pub extension_dir: PathBuf,
}

impl JobWorkspace {
    /// Lay out the workspace for one identity under `root`
    pub fn new(root: &Path, identity: &str) -> Self {
        Self {
            downloads_dir: root.join("downloads").join(identity),
            profiles_dir: root.join("profiles"),
            extension_dir: root.join("extensions").join(identity),
        }
    }

    /// Local profile directory for `identity`
    pub fn profile_dir(&self, identity: &str) -> PathBuf {
        self.profiles_dir.join(format!("{}_chrome_profile", identity))
    }

    /// Create a fresh, empty download directory
    ///
    /// Leftovers from a previous crashed job are removed before the browser is
    /// started, so the download check never sees files it did not cause.
    pub fn prepare_downloads(&self) -> Result<()> {
        if self.downloads_dir.exists() {
            warn!(
                "Download directory {} already exists, clearing leftovers",
                self.downloads_dir.display()
            );
            std::fs::remove_dir_all(&self.downloads_dir)?;
        }
        std::fs::create_dir_all(&self.downloads_dir)?;
        std::fs::create_dir_all(&self.profiles_dir)?;
        Ok(())
    }

    /// Remove both directories, logging instead of failing
    pub fn cleanup(&self) {
        delete_directory(&self.downloads_dir);
        delete_directory(&self.profiles_dir);
        delete_directory(&self.extension_dir);
    }
}

/// Delete a directory tree; returns whether it was removed
pub fn delete_directory(path: &Path) -> bool {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {
            info!("Deleted directory {}", path.display());
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("Directory not found during deletion attempt: {}", path.display());
            false
        }
        Err(e) => {
            warn!("Error deleting directory {}: {}", path.display(), e);
            false
        }
    }
}
