//! songgen-runner library interface
//!
//! One process runs one generation job: it signs an identity into the music
//! generation service, submits a request, waits for the candidates and
//! persists the best one. [`orchestrator::JobRunner`] is the entry point; the
//! binary only wires configuration and concrete adapters into it.

pub mod alerts;
pub mod budget;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod page;
pub mod services;
pub mod store;
pub mod utils;
pub mod verification;

pub use crate::error::{ErrorKind, JobError, JobResult};
pub use crate::orchestrator::JobRunner;
