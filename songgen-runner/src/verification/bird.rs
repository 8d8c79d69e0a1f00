//! Bird (MessageBird) channel lookup

use super::{extract_code, VerificationChannel, VerificationError};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BirdMessageList {
    #[serde(default)]
    pub results: Vec<BirdMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BirdMessage {
    #[serde(default)]
    pub body: BirdBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BirdBody {
    #[serde(default)]
    pub text: BirdText,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BirdText {
    #[serde(default)]
    pub text: String,
}

/// Reads codes from the incoming messages of one Bird channel
pub struct BirdChannel {
    http_client: reqwest::Client,
    base_url: String,
    access_key: String,
    workspace_id: String,
    channel_id: String,
    sender_tag: String,
}

impl BirdChannel {
    pub fn new(
        base_url: &str,
        access_key: String,
        workspace_id: String,
        channel_id: String,
        sender_tag: String,
    ) -> Result<Self, VerificationError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| VerificationError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_key,
            workspace_id,
            channel_id,
            sender_tag,
        })
    }

    /// First standalone six-digit code in a message carrying the sender tag
    pub fn select_code(list: &BirdMessageList, sender_tag: &str) -> Option<String> {
        list.results
            .iter()
            .map(|msg| msg.body.text.text.as_str())
            .filter(|text| text.contains(sender_tag))
            .find_map(extract_code)
    }
}

#[async_trait]
impl VerificationChannel for BirdChannel {
    async fn fetch_code(
        &self,
        window: Duration,
        max_messages: u32,
    ) -> Result<Option<String>, VerificationError> {
        let url = format!(
            "{}/workspaces/{}/channels/{}/messages",
            self.base_url, self.workspace_id, self.channel_id
        );
        let window = chrono::Duration::from_std(window)
            .map_err(|e| VerificationError::ParseError(e.to_string()))?;
        let start_at = (Utc::now() - window).to_rfc3339_opts(SecondsFormat::Secs, true);
        let limit = max_messages.to_string();

        tracing::debug!(channel = %self.channel_id, max_messages, "Listing Bird messages");

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("AccessKey {}", self.access_key))
            .header("Accept", "application/json")
            .query(&[
                ("limit", limit.as_str()),
                ("direction", "incoming"),
                ("startAt", start_at.as_str()),
            ])
            .send()
            .await
            .map_err(|e| VerificationError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VerificationError::ApiError(status.as_u16(), error_text));
        }

        let list: BirdMessageList = response
            .json()
            .await
            .map_err(|e| VerificationError::ParseError(e.to_string()))?;

        Ok(Self::select_code(&list, &self.sender_tag))
    }
}
