//! Utility modules for songgen-runner

pub mod db_retry;
pub mod pacing;
pub mod workspace;

pub use db_retry::retry_on_lock;
pub use pacing::{sleep_for, Pacing, WaitRange};
pub use workspace::{delete_directory, JobWorkspace};
