//! SQLite record store
//!
//! Generation rows live in `song_generations`, identity rows in
//! `runner_status`. Finished songs are copied under the artifacts directory
//! at `user-id:<platform user>/guild-id:<guild>/output-reply-id:<reply>/<file>`
//! and that key is stored in `output_song`.

use super::{to_ascii, IdentityStatus, RecordStore, SaveOutcome, SongOutput, StoreError};
use crate::models::{GenerationRecord, ValidationError, MAX_CREDITS};
use crate::utils::retry_on_lock;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Longest total wait on a locked database before a write gives up
const MAX_LOCK_WAIT: Duration = Duration::from_secs(5);

const GENERATION_COLUMNS: &str = "generation_id, song_prompt, use_custom_mode, \
    use_instrumental_only, song_input_genre, second_song_input_genre, song_input_vibe, \
    song_input_custom_title, song_input_custom_lyrics, error_message, user_id, replies_guild, \
    initial_reply_id, output_reply_id, output_song, song_output_genre, song_output_title, \
    song_output_lyrics, song_output_cover";

pub struct SqliteRecordStore {
    pool: SqlitePool,
    artifacts_dir: PathBuf,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool, artifacts_dir: PathBuf) -> Self {
        Self { pool, artifacts_dir }
    }

    /// Open (or create) the database file and its schema
    pub async fn open(db_path: &Path, artifacts_dir: PathBuf) -> Result<Self, StoreError> {
        let pool = songgen_common::db::init_database(db_path).await?;
        Ok(Self::new(pool, artifacts_dir))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace a generation row
    pub async fn insert_generation(&self, record: &GenerationRecord) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO song_generations ({}) VALUES \
             (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            GENERATION_COLUMNS
        ))
        .bind(&record.generation_id)
        .bind(&record.song_prompt)
        .bind(record.use_custom_mode)
        .bind(record.use_instrumental_only)
        .bind(&record.song_input_genre)
        .bind(&record.second_song_input_genre)
        .bind(&record.song_input_vibe)
        .bind(&record.song_input_custom_title)
        .bind(&record.song_input_custom_lyrics)
        .bind(&record.error_message)
        .bind(&record.user_id)
        .bind(&record.replies_guild)
        .bind(&record.initial_reply_id)
        .bind(&record.output_reply_id)
        .bind(&record.output_song)
        .bind(&record.song_output_genre)
        .bind(&record.song_output_title)
        .bind(&record.song_output_lyrics)
        .bind(&record.song_output_cover)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or replace an identity status row
    pub async fn insert_identity(&self, status: &IdentityStatus) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO runner_status (identity, remaining_credits, latest_error) \
             VALUES (?, ?, ?)",
        )
        .bind(&status.identity)
        .bind(status.remaining_credits)
        .bind(&status.latest_error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or replace a user's platform identifier
    pub async fn insert_user(&self, user_id: &str, platform_user_id: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT OR REPLACE INTO users (user_id, platform_user_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(platform_user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn platform_user_id(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let id: Option<Option<String>> =
            sqlx::query_scalar("SELECT platform_user_id FROM users WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id.flatten().filter(|id| !id.trim().is_empty()))
    }

    /// Artifact folder of a generation, `None` when routing data is incomplete
    async fn artifact_folder(&self, record: &GenerationRecord) -> Result<Option<String>, StoreError> {
        let (Some(user_id), Some(guild), Some(reply)) = (
            record.user_id.as_deref(),
            record.replies_guild.as_deref(),
            record.output_reply_id.as_deref(),
        ) else {
            return Ok(None);
        };

        let platform_user_id = self
            .platform_user_id(user_id)
            .await?
            .ok_or_else(|| StoreError::UserMissing(user_id.to_string()))?;

        Ok(Some(format!(
            "user-id:{}/guild-id:{}/output-reply-id:{}",
            platform_user_id, guild, reply
        )))
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn fetch_generation(&self, generation_id: &str) -> Result<Option<GenerationRecord>, StoreError> {
        let record = sqlx::query_as::<_, GenerationRecord>(&format!(
            "SELECT {} FROM song_generations WHERE generation_id = ?",
            GENERATION_COLUMNS
        ))
        .bind(generation_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn has_stored_artifact(&self, record: &GenerationRecord) -> Result<bool, StoreError> {
        let Some(folder) = self.artifact_folder(record).await? else {
            return Ok(false);
        };
        let dir = self.artifacts_dir.join(folder);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        Ok(entries.next_entry().await?.is_some())
    }

    async fn identity_status(&self, identity: &str) -> Result<Option<IdentityStatus>, StoreError> {
        let status = sqlx::query_as::<_, IdentityStatus>(
            "SELECT identity, remaining_credits, latest_error FROM runner_status WHERE identity = ?",
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(status)
    }

    async fn update_credits(&self, identity: &str, credits: i64) -> Result<(), StoreError> {
        if !(0..=i64::from(MAX_CREDITS)).contains(&credits) {
            return Err(StoreError::InvalidCredits(credits));
        }

        let pool = &self.pool;
        let updated = retry_on_lock("update_credits", MAX_LOCK_WAIT, || async move {
            let result = sqlx::query(
                "UPDATE runner_status SET remaining_credits = ?, updated_at = CURRENT_TIMESTAMP \
                 WHERE identity = ?",
            )
            .bind(credits)
            .bind(identity)
            .execute(pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await?;

        if updated == 0 {
            return Err(StoreError::IdentityNotFound(identity.to_string()));
        }
        info!(identity, credits, "Saved credit balance");
        Ok(())
    }

    async fn record_identity_error(&self, identity: &str, message: &str) -> Result<bool, StoreError> {
        if message.trim().is_empty() {
            warn!(identity, "Refusing to record an empty identity error");
            return Ok(false);
        }

        let pool = &self.pool;
        let updated = retry_on_lock("record_identity_error", MAX_LOCK_WAIT, || async move {
            let result = sqlx::query(
                "UPDATE runner_status SET latest_error = ?, updated_at = CURRENT_TIMESTAMP \
                 WHERE identity = ? AND latest_error IS NULL",
            )
            .bind(message)
            .bind(identity)
            .execute(pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await?;

        Ok(updated > 0)
    }

    async fn record_generation_error(&self, generation_id: &str, message: &str) -> Result<bool, StoreError> {
        if message.trim().is_empty() {
            warn!(generation_id, "Refusing to record an empty generation error");
            return Ok(false);
        }

        let pool = &self.pool;
        let updated = retry_on_lock("record_generation_error", MAX_LOCK_WAIT, || async move {
            let result = sqlx::query(
                "UPDATE song_generations SET error_message = ?, updated_at = CURRENT_TIMESTAMP \
                 WHERE generation_id = ? AND error_message IS NULL",
            )
            .bind(message)
            .bind(generation_id)
            .execute(pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await?;

        Ok(updated > 0)
    }

    async fn save_output(&self, generation_id: &str, output: &SongOutput) -> Result<SaveOutcome, StoreError> {
        if let Some(field) = output.missing_field() {
            return Err(StoreError::IncompleteOutput(field));
        }
        if !output.artifact.is_file() {
            return Err(StoreError::ArtifactMissing(output.artifact.clone()));
        }

        let record = self
            .fetch_generation(generation_id)
            .await?
            .ok_or(ValidationError::NotFound)?;
        if record.error_message.is_some() || record.has_output() {
            info!(generation_id, "Generation already finalized, skipping save");
            return Ok(SaveOutcome::Skipped);
        }

        let folder = self
            .artifact_folder(&record)
            .await?
            .ok_or(ValidationError::MissingField("output_reply_id"))?;
        let file_name = output
            .artifact
            .file_name()
            .map(|name| to_ascii(&name.to_string_lossy()))
            .filter(|name| !name.is_empty())
            .ok_or(StoreError::IncompleteOutput("artifact"))?;
        let key = format!("{}/{}", folder, file_name);

        let target = self.artifacts_dir.join(&key);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&output.artifact, &target).await?;
        info!(key = %key, "Stored song artifact");

        let output_song = serde_json::json!({ "song": key }).to_string();
        let title = to_ascii(&output.title);
        let pool = &self.pool;
        let (output_song, title) = (&output_song, &title);

        let updated = retry_on_lock("save_output", MAX_LOCK_WAIT, || async move {
            let result = sqlx::query(
                "UPDATE song_generations SET output_song = ?, song_output_genre = ?, \
                 song_output_title = ?, song_output_lyrics = ?, updated_at = CURRENT_TIMESTAMP \
                 WHERE generation_id = ? AND error_message IS NULL AND output_song IS NULL",
            )
            .bind(output_song)
            .bind(&output.genre)
            .bind(title)
            .bind(&output.lyrics)
            .bind(generation_id)
            .execute(pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await?;

        if updated == 0 {
            warn!(generation_id, "Generation changed while saving, output not recorded");
            return Ok(SaveOutcome::Skipped);
        }

        info!(generation_id, title = %title, "Saved song data");
        Ok(SaveOutcome::Saved(key))
    }
}
