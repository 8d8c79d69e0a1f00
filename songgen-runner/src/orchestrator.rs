//! Generation job orchestrator
//!
//! Runs one job end to end:
//! validate → prepare → navigate → sign in → configure → reap → submit →
//! poll → extract → download → persist.
//!
//! The session budget is checked between phases, never inside one. Every
//! failure is reported (record store and operator alert) exactly where the job
//! gives up, and teardown runs whenever a browser was started.

use crate::alerts::{Alerter, ErrorReporter};
use crate::budget::SessionBudget;
use crate::config::{IdentityProfile, JobParams, RunnerConfig};
use crate::error::{JobError, JobResult};
use crate::models::{GenerationRequest, JobSession, JobState};
use crate::page::{navigate, BrowserLauncher, BrowserOptions, PageClient};
use crate::services::{self, PollError, PollSettings, SignInError, SignInFlow, SubmissionError};
use crate::store::{ProfileArchive, RecordStore, SaveOutcome, SongOutput};
use crate::utils::{delete_directory, JobWorkspace};
use crate::verification::{ChannelProvider, VerificationChannel};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Collaborators of a job run
pub struct JobRunner {
    config: Arc<RunnerConfig>,
    store: Arc<dyn RecordStore>,
    archive: Arc<dyn ProfileArchive>,
    alerter: Arc<dyn Alerter>,
    browser: Arc<dyn BrowserLauncher>,
    channels: Arc<dyn ChannelProvider>,
}

/// Everything the browser phases need, resolved before launch
struct PreparedJob<'a> {
    request: GenerationRequest,
    profile: &'a IdentityProfile,
    channel: Box<dyn VerificationChannel>,
}

impl JobRunner {
    pub fn new(
        config: Arc<RunnerConfig>,
        store: Arc<dyn RecordStore>,
        archive: Arc<dyn ProfileArchive>,
        alerter: Arc<dyn Alerter>,
        browser: Arc<dyn BrowserLauncher>,
        channels: Arc<dyn ChannelProvider>,
    ) -> Self {
        Self {
            config,
            store,
            archive,
            alerter,
            browser,
            channels,
        }
    }

    /// Run one job; `true` only when the song was persisted
    ///
    /// A `false` result always follows a reported failure.
    pub async fn run_job(&self, params: &JobParams) -> bool {
        let budget = SessionBudget::new(Instant::now(), params.max_runtime);
        let mut session = JobSession::new(params.generation_id.clone(), params.identity.clone());
        let reporter = ErrorReporter::new(
            self.store.clone(),
            self.alerter.clone(),
            params.generation_id.clone(),
            params.identity.clone(),
        );

        info!(
            job_id = %session.job_id,
            generation_id = %params.generation_id,
            identity = %params.identity,
            max_runtime_secs = params.max_runtime.as_secs(),
            "Starting generation job"
        );

        let prepared = match self.validate(params).await {
            Ok(prepared) => prepared,
            Err(e) => {
                self.fail(&mut session, &reporter, &e).await;
                return false;
            }
        };

        session.transition_to(JobState::Preparing);
        let workspace = JobWorkspace::new(&self.config.root_folder, &params.identity);
        let page = match self.prepare(&workspace, prepared.profile, &params.identity).await {
            Ok(page) => page,
            Err(e) => {
                self.fail(&mut session, &reporter, &e).await;
                workspace.cleanup();
                return false;
            }
        };

        let result = self
            .drive(&*page, &prepared, &workspace, &budget, &mut session, &reporter)
            .await;

        self.teardown(&*page, &workspace, &params.identity, &budget).await;

        match result {
            Ok(()) => {
                session.transition_to(JobState::Completed);
                info!(
                    generation_id = %params.generation_id,
                    elapsed_secs = budget.elapsed().as_secs(),
                    "Finished downloading and saving the song"
                );
                true
            }
            Err(e) => {
                self.fail(&mut session, &reporter, &e).await;
                false
            }
        }
    }

    async fn fail(&self, session: &mut JobSession, reporter: &ErrorReporter, err: &JobError) {
        error!(
            generation_id = %session.generation_id,
            kind = %err.kind(),
            error = %err,
            "Generation job failed"
        );
        reporter.report_failure(err).await;
        let state = match err {
            JobError::OutOfTime(_) => JobState::OutOfTime,
            other => JobState::Failed(other.kind()),
        };
        session.transition_to(state);
    }

    /// Parameters, generation record, identity gate and verification channel
    async fn validate(&self, params: &JobParams) -> JobResult<PreparedJob<'_>> {
        let profile = params.validate(&self.config)?;
        let request = self.store.validate_generation(&params.generation_id).await?;
        self.store.check_identity(&params.identity).await?;
        let channel = self
            .channels
            .channel_for(profile)
            .map_err(|e| JobError::Parameters(format!("verification channel: {}", e)))?;

        info!(
            generation_id = %request.generation_id,
            mode = ?request.mode(),
            "Generation request validated"
        );
        Ok(PreparedJob {
            request,
            profile,
            channel,
        })
    }

    /// Fresh download directory, archived profile, browser session
    async fn prepare(
        &self,
        workspace: &JobWorkspace,
        profile: &IdentityProfile,
        identity: &str,
    ) -> JobResult<Box<dyn PageClient>> {
        workspace.prepare_downloads()?;

        let profile_dir = workspace.profile_dir(identity);
        if let Err(e) = self.archive.download(identity, &profile_dir).await {
            warn!(identity, error = %e, "Could not restore the browser profile, starting fresh");
        }

        let options = BrowserOptions {
            profile_dir,
            downloads_dir: workspace.downloads_dir.clone(),
            user_agent: self.config.webdriver.user_agent.clone(),
            headless: self.config.webdriver.headless,
            proxy: profile.proxy.clone(),
            extension_dir: workspace.extension_dir.clone(),
        };
        Ok(self.browser.launch(&options).await?)
    }

    fn ensure_time(budget: &SessionBudget, before: &'static str) -> JobResult<()> {
        if budget.remaining() {
            Ok(())
        } else {
            warn!(before, elapsed_secs = budget.elapsed().as_secs(), "Out of time");
            Err(JobError::OutOfTime(before))
        }
    }

    async fn drive(
        &self,
        page: &dyn PageClient,
        job: &PreparedJob<'_>,
        workspace: &JobWorkspace,
        budget: &SessionBudget,
        session: &mut JobSession,
        reporter: &ErrorReporter,
    ) -> JobResult<()> {
        let config = &*self.config;
        let selectors = &config.selectors;
        let pacing = config.pacing();
        let identity = session.identity.clone();

        // Navigation and sign-in
        session.transition_to(JobState::Navigating);
        if !config.allowed_ips.is_empty() {
            self.check_egress(page).await?;
        }
        navigate(page, &config.urls.create_url, &config.page_navigation()).await?;
        pacing.long().await;

        let location = page.current_location().await?;
        if location.starts_with(&config.urls.sign_in_url) {
            session.transition_to(JobState::SigningIn);
            SignInFlow::new(
                page,
                selectors,
                &config.urls,
                pacing,
                job.channel.as_ref(),
                &config.verification,
            )
            .sign_in(job.profile)
            .await?;
        } else if location.starts_with(&config.urls.create_url) {
            info!("Already signed in, skipping the sign-in flow");
        } else {
            return Err(SignInError::NotSignedIn(location).into());
        }

        // Creation form
        session.transition_to(JobState::Configuring);
        let request = &job.request;
        services::dismiss_tutorial(page, selectors, pacing).await?;
        services::negotiate_mode(page, selectors, pacing, request.mode()).await?;
        let controls = services::locate_form(page, selectors, request.mode()).await?;

        let shared_input = controls
            .shared_input()
            .cloned()
            .ok_or(SubmissionError::ControlMissing("text input"))?;
        page.click(&shared_input).await?;
        pacing.micro().await;
        Self::ensure_time(budget, "reaping")?;

        session.transition_to(JobState::Reaping);
        services::reap_pending(
            page,
            selectors,
            pacing,
            &shared_input,
            config.limits.max_songs_to_delete,
        )
        .await?;
        Self::ensure_time(budget, "model selection")?;

        session.transition_to(JobState::Submitting);
        services::select_model(
            page,
            selectors,
            pacing,
            &controls.model_label,
            &config.limits.preferred_models,
            config.limits.model_pick_attempts,
        )
        .await?;
        services::fill_form(page, pacing, &controls, request).await?;
        Self::ensure_time(budget, "submission")?;
        services::submit(page, &controls, config.timings.initialize_wait()).await?;

        // Generation
        session.transition_to(JobState::Polling);
        if let Err(e) = services::wait_for_song_list(page, selectors, pacing).await {
            if let Err(refresh) =
                services::refresh_credits(page, selectors, self.store.as_ref(), reporter, &identity).await
            {
                warn!(error = %refresh, "Could not refresh credits after losing the song list");
            }
            return Err(e.into());
        }

        let poll_window = config.timings.generation_timeout();
        if !budget.has_time_for(Instant::now(), poll_window) {
            return Err(JobError::OutOfTime("polling"));
        }

        let settings = PollSettings {
            timeout: poll_window,
            interval: config.timings.generation_poll(),
        };
        let candidate = match services::await_best_candidate(page, selectors, pacing, settings).await {
            Ok(candidate) => candidate,
            Err(PollError::NoQualifyingCandidate) => {
                if let Err(e) = services::reap_pending(
                    page,
                    selectors,
                    pacing,
                    &shared_input,
                    config.limits.max_songs_to_delete,
                )
                .await
                {
                    warn!(error = %e, "Could not clean up after an unusable generation");
                }
                return Err(PollError::NoQualifyingCandidate.into());
            }
            Err(e) => return Err(e.into()),
        };

        // Metadata, credits, artifact
        session.transition_to(JobState::Extracting);
        let metadata = services::read_title_and_genre(page, selectors, &candidate.handle).await?;
        services::refresh_credits(page, selectors, self.store.as_ref(), reporter, &identity).await?;
        Self::ensure_time(budget, "download")?;

        session.transition_to(JobState::Downloading);
        let artifact = services::download_song(
            page,
            selectors,
            pacing,
            &candidate.handle,
            &workspace.downloads_dir,
            config.timings.download_timeout(),
            config.timings.download_poll(),
        )
        .await?;

        let lyrics = match services::known_lyrics(request) {
            Some(lyrics) => lyrics,
            None => {
                session.transition_to(JobState::Extracting);
                services::open_song_details(
                    page,
                    selectors,
                    pacing,
                    &candidate.handle,
                    &config.detail_navigation(),
                    &config.urls.song_details_url,
                )
                .await?;
                Self::ensure_time(budget, "reading lyrics")?;
                services::read_lyrics(
                    page,
                    selectors,
                    &config.urls.song_details_url,
                    config.timings.detail_extra_wait(),
                )
                .await?
            }
        };

        session.transition_to(JobState::Persisting);
        let output = SongOutput {
            title: metadata.title,
            genre: metadata.genre,
            lyrics,
            artifact,
        };
        match self.store.save_output(&request.generation_id, &output).await? {
            SaveOutcome::Saved(key) => info!(key = %key, "Song data saved"),
            SaveOutcome::Skipped => warn!("Generation was already finalized, nothing saved"),
        }
        Ok(())
    }

    /// Require the browser's public address to be an allowed one
    async fn check_egress(&self, page: &dyn PageClient) -> JobResult<()> {
        let config = &*self.config;
        navigate(page, &config.urls.ip_echo_url, &config.page_navigation()).await?;
        config.pacing().short().await;

        let address = page.page_text().await?.trim().to_string();
        if config.allowed_ips.iter().any(|ip| ip == &address) {
            info!(address = %address, "Egress address allowed");
            Ok(())
        } else {
            Err(JobError::EgressDenied(address))
        }
    }

    /// Close the browser, archive the profile, remove local directories
    async fn teardown(
        &self,
        page: &dyn PageClient,
        workspace: &JobWorkspace,
        identity: &str,
        budget: &SessionBudget,
    ) {
        if let Err(e) = page.quit().await {
            warn!(error = %e, "Could not close the browser session");
        }

        delete_directory(&workspace.downloads_dir);

        let profile_dir = workspace.profile_dir(identity);
        if profile_dir.is_dir() {
            if let Err(e) = self.archive.upload(identity, &profile_dir).await {
                warn!(identity, error = %e, "Could not archive the browser profile");
            }
        }
        delete_directory(&workspace.profiles_dir);
        delete_directory(&workspace.extension_dir);

        info!(elapsed_secs = budget.elapsed().as_secs(), "Job teardown complete");
    }
}
