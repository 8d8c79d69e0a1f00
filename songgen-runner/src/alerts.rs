//! Operator alerts and failure reporting
//!
//! Every failure the runner gives up on is persisted to the record store and
//! mailed to the operators. Neither side of that may mask the original
//! failure, so delivery and persistence problems are logged and dropped.

use crate::config::AlertsConfig;
use crate::error::{JobError, ReportScope};
use crate::store::RecordStore;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SENDGRID_URL: &str = "https://api.sendgrid.com";

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Mail API rejected the message ({0}): {1}")]
    Rejected(u16, String),

    #[error("Missing alert setting: {0}")]
    MissingSetting(&'static str),
}

/// Operator notification channel
#[async_trait]
pub trait Alerter: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), AlertError>;
}

/// Writes alerts to the log only
#[derive(Debug, Default)]
pub struct LogAlerter;

#[async_trait]
impl Alerter for LogAlerter {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), AlertError> {
        warn!(subject, body, "Operator alert");
        Ok(())
    }
}

/// Plain-text mail through the SendGrid v3 API
pub struct SendGridAlerter {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    from: String,
    to: String,
}

impl SendGridAlerter {
    pub fn new(config: &AlertsConfig) -> Result<Self, AlertError> {
        let api_key = config
            .sendgrid_api_key
            .clone()
            .ok_or(AlertError::MissingSetting("sendgrid_api_key"))?;
        let from = config
            .email_from
            .clone()
            .ok_or(AlertError::MissingSetting("email_from"))?;
        let to = config
            .email_to
            .clone()
            .ok_or(AlertError::MissingSetting("email_to"))?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AlertError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config
                .sendgrid_url
                .as_deref()
                .unwrap_or(DEFAULT_SENDGRID_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            from,
            to,
        })
    }

    fn request_body(&self, subject: &str, body: &str) -> serde_json::Value {
        json!({
            "personalizations": [{ "to": [{ "email": self.to }] }],
            "from": { "email": self.from },
            "subject": subject,
            "content": [{ "type": "text/plain", "value": body }],
        })
    }
}

#[async_trait]
impl Alerter for SendGridAlerter {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), AlertError> {
        let response = self
            .http_client
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(subject, body))
            .send()
            .await
            .map_err(|e| AlertError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 200 || status == 202 {
            info!("Sent the error over email");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(AlertError::Rejected(status, text))
    }
}

/// SendGrid when configured, the log otherwise
pub fn alerter_from_config(config: &AlertsConfig) -> Arc<dyn Alerter> {
    if config.sendgrid_api_key.is_none() {
        info!("No mail API key configured, alerts go to the log");
        return Arc::new(LogAlerter);
    }
    match SendGridAlerter::new(config) {
        Ok(alerter) => Arc::new(alerter),
        Err(e) => {
            warn!(error = %e, "Mail alerts misconfigured, alerts go to the log");
            Arc::new(LogAlerter)
        }
    }
}

/// Alert subject naming the identity
pub fn alert_subject(identity: &str) -> String {
    format!("Error from the Scraping Bot - Phone Number {}", identity)
}

/// Persists and mails failures for one job
#[derive(Clone)]
pub struct ErrorReporter {
    store: Arc<dyn RecordStore>,
    alerter: Arc<dyn Alerter>,
    generation_id: String,
    identity: String,
}

impl ErrorReporter {
    pub fn new(
        store: Arc<dyn RecordStore>,
        alerter: Arc<dyn Alerter>,
        generation_id: impl Into<String>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            store,
            alerter,
            generation_id: generation_id.into(),
            identity: identity.into(),
        }
    }

    /// Block the identity, fail the generation and alert
    pub async fn report(&self, message: &str) {
        if let Err(e) = self.store.record_identity_error(&self.identity, message).await {
            error!(error = %e, "Could not save the identity error");
        }
        self.report_generation(message).await;
    }

    /// Fail the generation and alert; the identity stays usable
    pub async fn report_generation(&self, message: &str) {
        if let Err(e) = self
            .store
            .record_generation_error(&self.generation_id, message)
            .await
        {
            error!(error = %e, "Could not save the generation error");
        }
        self.notify_only(message).await;
    }

    /// Alert without touching any record
    pub async fn notify_only(&self, message: &str) {
        if message.trim().is_empty() {
            warn!("Refusing to send an empty alert");
            return;
        }
        if let Err(e) = self
            .alerter
            .notify(&alert_subject(&self.identity), message)
            .await
        {
            error!(error = %e, "Could not send the alert");
        }
    }

    /// Report a job failure with the scope its kind calls for
    pub async fn report_failure(&self, err: &JobError) {
        let message = format!("[{}] {}", err.kind(), err);
        match err.scope() {
            ReportScope::IdentityAndGeneration => self.report(&message).await,
            ReportScope::GenerationOnly => self.report_generation(&message).await,
        }
    }
}
