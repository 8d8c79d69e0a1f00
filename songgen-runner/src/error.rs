//! Error types for songgen-runner
//!
//! Each component owns a `thiserror` enum; [`JobError`] aggregates them at the
//! orchestrator boundary and classifies every failure into an [`ErrorKind`].

use crate::models::ValidationError;
use crate::page::PageError;
use crate::services::{
    CreditError, DownloadError, ExtractionError, NegotiationError, PollError, ReapError,
    SignInError, SubmissionError,
};
use crate::store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Failure taxonomy used for reporting and exit handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing input, detected before any external interaction
    Validation,
    /// Element not found, page not loaded, transport failure
    Interaction,
    /// A deadline-bound wait exhausted its local budget
    Timeout,
    /// A violated invariant (candidate count, file count, toggle state)
    Structural,
    /// The upstream generation itself produced nothing usable
    Content,
    /// The job budget ran out between phases
    OutOfTime,
    /// Anything else
    Unexpected,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Interaction => "interaction",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Structural => "structural",
            ErrorKind::Content => "content",
            ErrorKind::OutOfTime => "out_of_time",
            ErrorKind::Unexpected => "unexpected",
        };
        f.write_str(name)
    }
}

/// Where a failure is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportScope {
    /// Identity status row and generation record
    IdentityAndGeneration,
    /// Generation record only; the identity stays usable
    GenerationOnly,
}

/// Terminal failure of a generation job
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Invalid generation: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid job parameters: {0}")]
    Parameters(String),

    #[error("Ran out of time before {0}")]
    OutOfTime(&'static str),

    #[error("Egress address {0} is not in the allowed list")]
    EgressDenied(String),

    #[error("Page error: {0}")]
    Page(#[from] PageError),

    #[error("Sign-in failed: {0}")]
    SignIn(#[from] SignInError),

    #[error("Creation mode negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),

    #[error("Reaping invalid songs failed: {0}")]
    Reap(#[from] ReapError),

    #[error("Submission failed: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Generation polling failed: {0}")]
    Poll(#[from] PollError),

    #[error("Metadata extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Credit check failed: {0}")]
    Credits(#[from] CreditError),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::Validation(_) | JobError::Parameters(_) => ErrorKind::Validation,
            JobError::OutOfTime(_) => ErrorKind::OutOfTime,
            JobError::EgressDenied(_) => ErrorKind::Structural,
            JobError::Page(e) => e.kind(),
            JobError::SignIn(e) => e.kind(),
            JobError::Negotiation(e) => e.kind(),
            JobError::Reap(e) => e.kind(),
            JobError::Submission(e) => e.kind(),
            JobError::Poll(e) => e.kind(),
            JobError::Extraction(e) => e.kind(),
            JobError::Download(e) => e.kind(),
            JobError::Credits(e) => e.kind(),
            JobError::Store(e) => e.kind(),
            JobError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// Generation-level poll failures must not block the identity
    pub fn scope(&self) -> ReportScope {
        match self {
            JobError::Poll(PollError::NoQualifyingCandidate)
            | JobError::Poll(PollError::CandidateCount(_)) => ReportScope::GenerationOnly,
            _ => ReportScope::IdentityAndGeneration,
        }
    }
}

impl From<songgen_common::Error> for JobError {
    fn from(err: songgen_common::Error) -> Self {
        JobError::Unexpected(err.to_string())
    }
}

/// Result alias for orchestrator phases
pub type JobResult<T> = std::result::Result<T, JobError>;
