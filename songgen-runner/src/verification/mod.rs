//! SMS verification code retrieval
//!
//! Two providers are supported; the identity profile picks one. Both list the
//! most recent inbound messages inside a trailing window and return the first
//! six-digit code found in a message carrying the sender tag.

pub mod bird;
pub mod twilio;

pub use bird::BirdChannel;
pub use twilio::TwilioChannel;

use crate::config::{IdentityProfile, VerificationConfig};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

static STANDALONE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{6})\b").expect("code pattern is valid"));

static LEADING_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{6})").expect("code pattern is valid"));

/// Verification provider errors
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Missing provider setting: {0}")]
    MissingSetting(&'static str),
}

/// SMS provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Twilio,
    MessageBird,
}

/// Source of sign-in verification codes for one identity
#[async_trait]
pub trait VerificationChannel: Send + Sync {
    /// Scan up to `max_messages` recent messages received within `window`
    async fn fetch_code(
        &self,
        window: Duration,
        max_messages: u32,
    ) -> Result<Option<String>, VerificationError>;
}

/// Build the channel configured for `identity`
pub fn channel_for(
    identity: &IdentityProfile,
    config: &VerificationConfig,
) -> Result<Box<dyn VerificationChannel>, VerificationError> {
    match identity.provider {
        Provider::Twilio => {
            let sid = config
                .twilio_account_sid
                .clone()
                .ok_or(VerificationError::MissingSetting("twilio_account_sid"))?;
            let token = config
                .twilio_auth_token
                .clone()
                .ok_or(VerificationError::MissingSetting("twilio_auth_token"))?;
            Ok(Box::new(TwilioChannel::new(
                &config.twilio_base_url,
                sid,
                token,
                identity.full_number(),
                config.sender_tag.clone(),
            )?))
        }
        Provider::MessageBird => {
            let key = config
                .bird_access_key
                .clone()
                .ok_or(VerificationError::MissingSetting("bird_access_key"))?;
            let workspace = identity
                .workspace_id
                .clone()
                .filter(|w| !w.is_empty())
                .ok_or(VerificationError::MissingSetting("workspace_id"))?;
            let channel = identity
                .channel_id
                .clone()
                .filter(|c| !c.is_empty())
                .ok_or(VerificationError::MissingSetting("channel_id"))?;
            Ok(Box::new(BirdChannel::new(
                &config.bird_base_url,
                key,
                workspace,
                channel,
                config.sender_tag.clone(),
            )?))
        }
    }
}

/// Builds the verification channel of an identity
pub trait ChannelProvider: Send + Sync {
    fn channel_for(
        &self,
        identity: &IdentityProfile,
    ) -> Result<Box<dyn VerificationChannel>, VerificationError>;
}

/// Channels built from the `[verification]` settings
#[derive(Debug, Clone)]
pub struct ConfiguredChannels {
    config: VerificationConfig,
}

impl ConfiguredChannels {
    pub fn new(config: VerificationConfig) -> Self {
        Self { config }
    }
}

impl ChannelProvider for ConfiguredChannels {
    fn channel_for(
        &self,
        identity: &IdentityProfile,
    ) -> Result<Box<dyn VerificationChannel>, VerificationError> {
        channel_for(identity, &self.config)
    }
}

/// First standalone six-digit token in `text`
pub fn extract_code(text: &str) -> Option<String> {
    STANDALONE_CODE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Six-digit code the message starts with
pub fn leading_code(text: &str) -> Option<String> {
    LEADING_CODE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
