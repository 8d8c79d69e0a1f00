//! Data models for songgen-runner

pub mod candidate;
pub mod credits;
pub mod job_session;
pub mod request;

pub use candidate::{
    parse_duration, SelectionTracker, SongCandidate, MAX_SONGS_PER_GENERATION, MIN_SONG_LENGTH_SECS,
};
pub use credits::{CreditBalance, CreditError, MAX_CREDITS, MIN_CREDIT_BALANCE};
pub use job_session::{JobSession, JobState, StateTransition};
pub use request::{
    compose_style_prompt, CreationMode, GenerationRecord, GenerationRequest, SongInput,
    ValidationError,
};
