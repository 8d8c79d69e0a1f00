//! Generation job state machine
//!
//! A job progresses through these states:
//! VALIDATING → PREPARING → NAVIGATING → SIGNING_IN → CONFIGURING → REAPING →
//! SUBMITTING → POLLING → EXTRACTING → DOWNLOADING → PERSISTING → COMPLETED
//!
//! Any state may end in FAILED or OUT_OF_TIME instead.

use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Generation job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Job parameters and record validation
    Validating,
    /// Profile restore, download directory
    Preparing,
    /// Opening the creation surface
    Navigating,
    /// Phone sign-in with verification code
    SigningIn,
    /// Tutorial, form controls, creation mode, model
    Configuring,
    /// Deleting pending candidates left by earlier jobs
    Reaping,
    /// Filling the form and clicking create
    Submitting,
    /// Waiting for candidates to finish
    Polling,
    /// Title, genre, lyrics, credits
    Extracting,
    /// Waiting for the artifact file
    Downloading,
    /// Writing output to the record store
    Persisting,
    /// Output persisted
    Completed,
    /// Failed with a classified error
    Failed(ErrorKind),
    /// Budget exhausted between phases
    OutOfTime,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Failed(kind) => write!(f, "FAILED({})", kind),
            other => write!(f, "{:?}", other),
        }
    }
}

/// State transition event
#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    pub job_id: Uuid,
    pub old_state: JobState,
    pub new_state: JobState,
    pub transitioned_at: DateTime<Utc>,
}

/// In-memory record of one job's progress
#[derive(Debug, Clone, Serialize)]
pub struct JobSession {
    /// Unique job identifier, used to correlate log lines
    pub job_id: Uuid,

    pub generation_id: String,

    /// Identity (phone number) the job runs as
    pub identity: String,

    pub state: JobState,

    /// Every transition taken so far
    pub history: Vec<StateTransition>,

    pub started_at: DateTime<Utc>,

    /// Set once a terminal state is reached
    pub ended_at: Option<DateTime<Utc>>,
}

impl JobSession {
    pub fn new(generation_id: String, identity: String) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            generation_id,
            identity,
            state: JobState::Validating,
            history: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: JobState) -> StateTransition {
        let transition = StateTransition {
            job_id: self.job_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if self.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
        }

        tracing::info!(
            job_id = %self.job_id,
            generation_id = %self.generation_id,
            old_state = %transition.old_state,
            new_state = %transition.new_state,
            "Job state transition"
        );

        self.history.push(transition.clone());
        transition
    }

    /// Check if session is terminal (finished)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            JobState::Completed | JobState::Failed(_) | JobState::OutOfTime
        )
    }

    pub fn succeeded(&self) -> bool {
        self.state == JobState::Completed
    }
}
