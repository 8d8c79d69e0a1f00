//! Page-level steps of a generation job
//!
//! Each module drives one part of the external surface through
//! [`PageClient`](crate::page::PageClient) and owns its error enum.

pub mod creation_mode;
pub mod credits;
pub mod downloader;
pub mod metadata;
pub mod poller;
pub mod reaper;
pub mod sign_in;
pub mod submission;

pub use crate::models::CreditError;
pub use creation_mode::{dismiss_custom_onboarding, negotiate_mode, observe_mode, NegotiationError};
pub use credits::{read_balance, refresh_credits, RefreshError};
pub use downloader::{download_song, inspect_directory, wait_for_download, DirectoryState, DownloadError};
pub use metadata::{
    known_lyrics, open_song_details, read_lyrics, read_title_and_genre, ExtractionError,
    SongMetadata, INSTRUMENTAL_LYRICS,
};
pub use poller::{await_best_candidate, row_duration, wait_for_song_list, PollError, PollSettings};
pub use reaper::{reap_pending, ReapError};
pub use sign_in::{SignInError, SignInFlow, SignInLadder, SignInState};
pub use submission::{
    dismiss_tutorial, fill_form, locate_form, select_model, submit, FormControls, SubmissionError,
};
