//! # songgen Common Library
//!
//! Shared code for the songgen workspace:
//! - Error type used by configuration and storage layers
//! - SQLite database creation and schema
//! - TOML bootstrap configuration loading and folder resolution
//! - Tracing subscriber initialisation

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
