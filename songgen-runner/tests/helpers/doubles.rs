//! In-memory stand-ins for the runner's collaborators

use super::fake_page::FakePage;
use async_trait::async_trait;
use songgen_runner::alerts::{AlertError, Alerter};
use songgen_runner::config::IdentityProfile;
use songgen_runner::models::GenerationRecord;
use songgen_runner::page::{BrowserLauncher, BrowserOptions, PageClient, PageError};
use songgen_runner::store::{
    to_ascii, ArchiveError, IdentityStatus, ProfileArchive, RecordStore, SaveOutcome, SongOutput,
    StoreError,
};
use songgen_runner::verification::{ChannelProvider, VerificationChannel, VerificationError};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Record store
// =============================================================================

/// Record store backed by hash maps
#[derive(Default)]
pub struct MemoryStore {
    generations: Mutex<HashMap<String, GenerationRecord>>,
    identities: Mutex<HashMap<String, IdentityStatus>>,
    pub saved: Mutex<Vec<(String, SongOutput)>>,
    pub credit_updates: Mutex<Vec<(String, i64)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_generation(&self, record: GenerationRecord) {
        self.generations
            .lock()
            .unwrap()
            .insert(record.generation_id.clone(), record);
    }

    pub fn put_identity(&self, status: IdentityStatus) {
        self.identities
            .lock()
            .unwrap()
            .insert(status.identity.clone(), status);
    }

    pub fn generation(&self, generation_id: &str) -> Option<GenerationRecord> {
        self.generations.lock().unwrap().get(generation_id).cloned()
    }

    pub fn identity(&self, identity: &str) -> Option<IdentityStatus> {
        self.identities.lock().unwrap().get(identity).cloned()
    }

    pub fn generation_error(&self, generation_id: &str) -> Option<String> {
        self.generation(generation_id).and_then(|r| r.error_message)
    }

    pub fn identity_error(&self, identity: &str) -> Option<String> {
        self.identity(identity).and_then(|s| s.latest_error)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_generation(&self, generation_id: &str) -> Result<Option<GenerationRecord>, StoreError> {
        Ok(self.generation(generation_id))
    }

    async fn has_stored_artifact(&self, record: &GenerationRecord) -> Result<bool, StoreError> {
        Ok(self
            .saved
            .lock()
            .unwrap()
            .iter()
            .any(|(id, _)| id == &record.generation_id))
    }

    async fn identity_status(&self, identity: &str) -> Result<Option<IdentityStatus>, StoreError> {
        Ok(self.identity(identity))
    }

    async fn update_credits(&self, identity: &str, credits: i64) -> Result<(), StoreError> {
        let mut identities = self.identities.lock().unwrap();
        let status = identities
            .get_mut(identity)
            .ok_or_else(|| StoreError::IdentityNotFound(identity.to_string()))?;
        status.remaining_credits = Some(credits);
        self.credit_updates
            .lock()
            .unwrap()
            .push((identity.to_string(), credits));
        Ok(())
    }

    async fn record_identity_error(&self, identity: &str, message: &str) -> Result<bool, StoreError> {
        let mut identities = self.identities.lock().unwrap();
        match identities.get_mut(identity) {
            Some(status) if status.latest_error.is_none() => {
                status.latest_error = Some(message.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_generation_error(&self, generation_id: &str, message: &str) -> Result<bool, StoreError> {
        let mut generations = self.generations.lock().unwrap();
        match generations.get_mut(generation_id) {
            Some(record) if record.error_message.is_none() => {
                record.error_message = Some(message.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn save_output(&self, generation_id: &str, output: &SongOutput) -> Result<SaveOutcome, StoreError> {
        if let Some(field) = output.missing_field() {
            return Err(StoreError::IncompleteOutput(field));
        }
        if !output.artifact.is_file() {
            return Err(StoreError::ArtifactMissing(output.artifact.clone()));
        }

        let mut generations = self.generations.lock().unwrap();
        let Some(record) = generations.get_mut(generation_id) else {
            return Ok(SaveOutcome::Skipped);
        };
        if record.error_message.is_some() || record.has_output() {
            return Ok(SaveOutcome::Skipped);
        }

        let key = format!("memory/{}", generation_id);
        record.output_song = Some(key.clone());
        record.song_output_title = Some(to_ascii(&output.title));
        record.song_output_genre = Some(output.genre.clone());
        record.song_output_lyrics = Some(output.lyrics.clone());
        self.saved
            .lock()
            .unwrap()
            .push((generation_id.to_string(), output.clone()));
        Ok(SaveOutcome::Saved(key))
    }
}

// =============================================================================
// Alerts
// =============================================================================

/// Keeps every alert instead of sending it
#[derive(Default)]
pub struct RecordingAlerter {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingAlerter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, body)| body.clone()).collect()
    }
}

#[async_trait]
impl Alerter for RecordingAlerter {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), AlertError> {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

// =============================================================================
// Verification
// =============================================================================

/// Answers fetches from a queue; an exhausted queue means "no code"
#[derive(Clone, Default)]
pub struct ScriptedChannel {
    answers: Arc<Mutex<VecDeque<Result<Option<String>, String>>>>,
    pub fetches: Arc<Mutex<u32>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(&self, code: Option<&str>) -> &Self {
        self.answers
            .lock()
            .unwrap()
            .push_back(Ok(code.map(str::to_string)));
        self
    }

    pub fn fail(&self, message: &str) -> &Self {
        self.answers.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    pub fn fetch_count(&self) -> u32 {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl VerificationChannel for ScriptedChannel {
    async fn fetch_code(
        &self,
        _window: Duration,
        _max_messages: u32,
    ) -> Result<Option<String>, VerificationError> {
        *self.fetches.lock().unwrap() += 1;
        match self.answers.lock().unwrap().pop_front() {
            Some(Ok(code)) => Ok(code),
            Some(Err(message)) => Err(VerificationError::NetworkError(message)),
            None => Ok(None),
        }
    }
}

/// Hands out the same scripted channel for every identity
#[derive(Clone, Default)]
pub struct ScriptedChannels {
    pub channel: ScriptedChannel,
}

impl ChannelProvider for ScriptedChannels {
    fn channel_for(
        &self,
        _identity: &IdentityProfile,
    ) -> Result<Box<dyn VerificationChannel>, VerificationError> {
        Ok(Box::new(self.channel.clone()))
    }
}

// =============================================================================
// Profile archive
// =============================================================================

/// Records archive traffic without copying anything
#[derive(Default)]
pub struct FakeArchive {
    pub stored: Mutex<HashMap<String, PathBuf>>,
    pub uploads: Mutex<Vec<String>>,
    pub downloads: Mutex<Vec<String>>,
}

impl FakeArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl ProfileArchive for FakeArchive {
    async fn exists(&self, identity: &str) -> Result<bool, ArchiveError> {
        Ok(self.stored.lock().unwrap().contains_key(identity))
    }

    async fn upload(&self, identity: &str, local_dir: &Path) -> Result<(), ArchiveError> {
        if !local_dir.is_dir() {
            return Err(ArchiveError::SourceMissing(local_dir.to_path_buf()));
        }
        self.uploads.lock().unwrap().push(identity.to_string());
        self.stored
            .lock()
            .unwrap()
            .insert(identity.to_string(), local_dir.to_path_buf());
        Ok(())
    }

    async fn download(&self, identity: &str, _local_dir: &Path) -> Result<bool, ArchiveError> {
        self.downloads.lock().unwrap().push(identity.to_string());
        Ok(self.stored.lock().unwrap().contains_key(identity))
    }
}

// =============================================================================
// Browser
// =============================================================================

/// Launches the shared fake page, optionally failing instead
pub struct FakeLauncher {
    page: FakePage,
    pub fail: bool,
    pub launched: Mutex<Vec<BrowserOptions>>,
}

impl FakeLauncher {
    pub fn new(page: FakePage) -> Self {
        Self {
            page,
            fail: false,
            launched: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(page: FakePage) -> Self {
        Self {
            fail: true,
            ..Self::new(page)
        }
    }

    pub fn launch_count(&self) -> usize {
        self.launched.lock().unwrap().len()
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, options: &BrowserOptions) -> Result<Box<dyn PageClient>, PageError> {
        self.launched.lock().unwrap().push(options.clone());
        if self.fail {
            return Err(PageError::Transport("browser endpoint unreachable".to_string()));
        }
        // A real browser writes its profile on start
        std::fs::create_dir_all(&options.profile_dir)
            .map_err(|e| PageError::Transport(e.to_string()))?;
        std::fs::write(options.profile_dir.join("Preferences"), b"{}")
            .map_err(|e| PageError::Transport(e.to_string()))?;
        Ok(Box::new(self.page.clone()))
    }
}
