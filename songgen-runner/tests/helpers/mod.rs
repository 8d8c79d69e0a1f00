//! Test Helper Utilities
//!
//! Shared doubles and fixtures for songgen-runner integration tests

#![allow(dead_code)]

pub mod doubles;
pub mod fake_page;
pub mod fixtures;

// Re-export commonly used items
pub use doubles::{
    FakeArchive, FakeLauncher, MemoryStore, RecordingAlerter, ScriptedChannel, ScriptedChannels,
};
pub use fake_page::{FakePage, PageState};
pub use fixtures::*;
