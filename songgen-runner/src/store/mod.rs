//! Record store and profile archive
//!
//! The runner reads generation requests and identity status from the record
//! store and writes credits, errors and the final song back. Error writes are
//! first-write-wins: once a message is recorded, later reports of the same
//! failure leave it untouched.

pub mod profile_archive;
pub mod sqlite;

pub use profile_archive::{ArchiveError, LocalProfileArchive, ProfileArchive};
pub use sqlite::SqliteRecordStore;

use crate::models::{GenerationRecord, GenerationRequest, ValidationError, MIN_CREDIT_BALANCE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] songgen_common::Error),

    #[error("Invalid generation: {0}")]
    Invalid(#[from] ValidationError),

    #[error("No status row for identity {0}")]
    IdentityNotFound(String),

    #[error("Identity {identity} cannot create songs: {reason}")]
    IdentityBlocked { identity: String, reason: String },

    #[error("Credit value {0} outside the accepted range")]
    InvalidCredits(i64),

    #[error("Incomplete song output: missing {0}")]
    IncompleteOutput(&'static str),

    #[error("Downloaded song not found at {0}")]
    ArtifactMissing(PathBuf),

    #[error("User {0} has no platform identifier")]
    UserMissing(String),

    #[error("Artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn kind(&self) -> crate::error::ErrorKind {
        use crate::error::ErrorKind;
        match self {
            StoreError::Invalid(_)
            | StoreError::IdentityNotFound(_)
            | StoreError::IdentityBlocked { .. }
            | StoreError::UserMissing(_) => ErrorKind::Validation,
            StoreError::InvalidCredits(_)
            | StoreError::IncompleteOutput(_)
            | StoreError::ArtifactMissing(_) => ErrorKind::Structural,
            StoreError::Database(_) | StoreError::Io(_) => ErrorKind::Unexpected,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(songgen_common::Error::from(err))
    }
}

/// Status row of one runner identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdentityStatus {
    pub identity: String,
    pub remaining_credits: Option<i64>,
    pub latest_error: Option<String>,
}

impl IdentityStatus {
    /// Why this identity may not take a job, if anything
    pub fn blocking_reason(&self) -> Option<String> {
        if let Some(error) = &self.latest_error {
            return Some(format!("previous run failed: {}", error));
        }
        match self.remaining_credits {
            None => Some("credit balance unknown".to_string()),
            Some(credits) if credits <= i64::from(MIN_CREDIT_BALANCE) => {
                Some(format!("only {} credits left", credits))
            }
            Some(_) => None,
        }
    }
}

/// Everything persisted for a finished song
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongOutput {
    pub title: String,
    pub genre: String,
    pub lyrics: String,
    /// Downloaded file inside the job's download directory
    pub artifact: PathBuf,
}

impl SongOutput {
    /// Name of the first empty field
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.title.trim().is_empty() {
            Some("title")
        } else if self.genre.trim().is_empty() {
            Some("genre")
        } else if self.lyrics.trim().is_empty() {
            Some("lyrics")
        } else if self.artifact.as_os_str().is_empty() {
            Some("artifact")
        } else {
            None
        }
    }
}

/// Result of [`RecordStore::save_output`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Stored under this artifact key
    Saved(String),
    /// The generation already carries an error or output; nothing written
    Skipped,
}

/// Persistent job records
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch_generation(&self, generation_id: &str) -> Result<Option<GenerationRecord>, StoreError>;

    /// Whether an artifact is already stored for `record`
    async fn has_stored_artifact(&self, record: &GenerationRecord) -> Result<bool, StoreError>;

    async fn identity_status(&self, identity: &str) -> Result<Option<IdentityStatus>, StoreError>;

    /// Replace the identity's credit balance
    async fn update_credits(&self, identity: &str, credits: i64) -> Result<(), StoreError>;

    /// Set `latest_error` unless already set; returns whether it was written
    async fn record_identity_error(&self, identity: &str, message: &str) -> Result<bool, StoreError>;

    /// Set the generation's `error_message` unless already set
    async fn record_generation_error(&self, generation_id: &str, message: &str) -> Result<bool, StoreError>;

    async fn save_output(&self, generation_id: &str, output: &SongOutput) -> Result<SaveOutcome, StoreError>;

    /// Load a generation and turn it into a validated request
    async fn validate_generation(&self, generation_id: &str) -> Result<GenerationRequest, StoreError> {
        let record = self
            .fetch_generation(generation_id)
            .await?
            .ok_or(ValidationError::NotFound)?;
        let request = GenerationRequest::from_record(&record)?;
        if self.has_stored_artifact(&record).await? {
            return Err(ValidationError::AlreadyHasOutput.into());
        }
        Ok(request)
    }

    /// Require the identity to be free of errors and above the credit floor
    async fn check_identity(&self, identity: &str) -> Result<IdentityStatus, StoreError> {
        let status = self
            .identity_status(identity)
            .await?
            .ok_or_else(|| StoreError::IdentityNotFound(identity.to_string()))?;
        if let Some(reason) = status.blocking_reason() {
            return Err(StoreError::IdentityBlocked {
                identity: identity.to_string(),
                reason,
            });
        }
        Ok(status)
    }
}

/// Best-effort ASCII rendering of `text`
///
/// Compatibility decomposition splits accented letters into base letter plus
/// combining mark; everything still outside ASCII is dropped.
pub fn to_ascii(text: &str) -> String {
    text.nfkd().filter(char::is_ascii).collect()
}
