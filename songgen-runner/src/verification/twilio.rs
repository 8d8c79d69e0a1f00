//! Twilio message lookup

use super::{leading_code, VerificationChannel, VerificationError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct TwilioMessageList {
    #[serde(default)]
    pub messages: Vec<TwilioMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwilioMessage {
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub to: String,
    /// RFC 2822 timestamp
    pub date_sent: Option<String>,
}

/// Reads codes sent to one number from the Twilio REST API
pub struct TwilioChannel {
    http_client: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    /// Full international number the codes are sent to
    number: String,
    sender_tag: String,
}

impl TwilioChannel {
    pub fn new(
        base_url: &str,
        account_sid: String,
        auth_token: String,
        number: String,
        sender_tag: String,
    ) -> Result<Self, VerificationError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| VerificationError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
            number,
            sender_tag,
        })
    }

    /// Pick the first message that is addressed to `number`, recent enough,
    /// carries the sender tag and starts with a six-digit code
    pub fn select_code(
        messages: &[TwilioMessage],
        number: &str,
        sender_tag: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Option<String> {
        let window = chrono::Duration::from_std(window).ok()?;

        messages
            .iter()
            .filter(|msg| msg.to == number && msg.body.contains(sender_tag))
            .filter(|msg| {
                msg.date_sent
                    .as_deref()
                    .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                    .map(|sent| now.signed_duration_since(sent.with_timezone(&Utc)) <= window)
                    .unwrap_or(false)
            })
            .find_map(|msg| leading_code(&msg.body))
    }
}

#[async_trait]
impl VerificationChannel for TwilioChannel {
    async fn fetch_code(
        &self,
        window: Duration,
        max_messages: u32,
    ) -> Result<Option<String>, VerificationError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );
        let page_size = max_messages.to_string();

        tracing::debug!(to = %self.number, max_messages, "Listing Twilio messages");

        let response = self
            .http_client
            .get(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .query(&[("To", self.number.as_str()), ("PageSize", page_size.as_str())])
            .send()
            .await
            .map_err(|e| VerificationError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VerificationError::ApiError(status.as_u16(), error_text));
        }

        let list: TwilioMessageList = response
            .json()
            .await
            .map_err(|e| VerificationError::ParseError(e.to_string()))?;

        Ok(Self::select_code(
            &list.messages,
            &self.number,
            &self.sender_tag,
            Utc::now(),
            window,
        ))
    }
}
