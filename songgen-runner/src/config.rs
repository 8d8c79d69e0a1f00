//! Runner configuration
//!
//! Settings come from the TOML bootstrap file (see
//! `songgen_common::config`) with compiled defaults for every field. The
//! binary builds one [`RunnerConfig`] at startup and passes it by reference to
//! every component; nothing below reads the process environment.

use crate::budget::SessionBudget;
use crate::error::JobError;
use crate::page::{NavigationSettings, Selectors};
use crate::utils::Pacing;
use crate::verification::Provider;
use serde::Deserialize;
use songgen_common::config::LoggingConfig;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Longest accepted generation identifier
pub const MAX_GENERATION_ID_LENGTH: usize = 50;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.6478.114 Safari/537.36";

/// Raw TOML document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunnerToml {
    pub root_folder: Option<PathBuf>,
    pub database_file: Option<PathBuf>,
    pub archive_dir: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub urls: UrlConfig,
    pub webdriver: WebDriverConfig,
    pub limits: LimitsConfig,
    pub timings: TimingsConfig,
    pub selectors: Selectors,
    pub alerts: AlertsConfig,
    pub verification: VerificationConfig,
    /// Egress addresses the browser may use; empty disables the check
    pub allowed_ips: Vec<String>,
    /// Login profiles keyed by phone number
    pub identities: HashMap<String, IdentityProfile>,
}

/// External surfaces
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UrlConfig {
    /// Creation surface; also the signed-in landing page
    pub create_url: String,
    pub sign_in_url: String,
    /// Prefix of every song detail page
    pub song_details_url: String,
    /// Returns the caller's public address as plain text
    pub ip_echo_url: String,
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self {
            create_url: "https://suno.com/create".to_string(),
            sign_in_url: "https://accounts.suno.com/sign-in".to_string(),
            song_details_url: "https://suno.com/song/".to_string(),
            ip_echo_url: "http://ipecho.net/plain".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    pub endpoint: String,
    pub headless: bool,
    pub user_agent: String,
    /// Refuse identities without a `proxy` section
    pub require_proxy: bool,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9515".to_string(),
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            require_proxy: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Pending rows the reaper may delete in one pass
    pub max_songs_to_delete: usize,
    pub page_load_attempts: u32,
    pub detail_load_attempts: u32,
    pub model_pick_attempts: u32,
    /// Model labels in order of preference
    pub preferred_models: Vec<String>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_songs_to_delete: 4,
            page_load_attempts: 3,
            detail_load_attempts: 5,
            model_pick_attempts: 3,
            preferred_models: vec!["v3.5".to_string(), "v3".to_string(), "v2".to_string()],
        }
    }
}

/// Waits and deadlines, in seconds
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TimingsConfig {
    pub page_load_wait_secs: u64,
    pub detail_load_wait_secs: u64,
    /// Extra wait when the detail page is not yet current before reading lyrics
    pub detail_extra_wait_secs: u64,
    /// Wait after clicking create before the list is inspected
    pub initialize_wait_secs: u64,
    pub generation_timeout_secs: u64,
    pub generation_poll_secs: u64,
    pub download_timeout_secs: u64,
    pub download_poll_secs: u64,
    pub ready_poll_millis: u64,
    pub pacing: Pacing,
}

impl Default for TimingsConfig {
    fn default() -> Self {
        Self {
            page_load_wait_secs: 20,
            detail_load_wait_secs: 15,
            detail_extra_wait_secs: 15,
            initialize_wait_secs: 15,
            generation_timeout_secs: 270,
            generation_poll_secs: 10,
            download_timeout_secs: 50,
            download_poll_secs: 5,
            ready_poll_millis: 500,
            pacing: Pacing::default(),
        }
    }
}

impl TimingsConfig {
    pub fn initialize_wait(&self) -> Duration {
        Duration::from_secs(self.initialize_wait_secs)
    }

    pub fn detail_extra_wait(&self) -> Duration {
        Duration::from_secs(self.detail_extra_wait_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn generation_poll(&self) -> Duration {
        Duration::from_secs(self.generation_poll_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn download_poll(&self) -> Duration {
        Duration::from_secs(self.download_poll_secs)
    }

    /// Timings with every wait collapsed, for tests
    pub fn immediate() -> Self {
        Self {
            page_load_wait_secs: 0,
            detail_load_wait_secs: 0,
            detail_extra_wait_secs: 0,
            initialize_wait_secs: 0,
            ready_poll_millis: 0,
            pacing: Pacing::immediate(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// SendGrid key; alerts only go to the log when absent
    pub sendgrid_api_key: Option<String>,
    pub sendgrid_url: Option<String>,
    pub email_from: Option<String>,
    pub email_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_base_url: String,
    pub bird_access_key: Option<String>,
    pub bird_base_url: String,
    /// Marker identifying verification messages
    pub sender_tag: String,
    pub window_minutes: u32,
    pub max_messages: u32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_base_url: "https://api.twilio.com".to_string(),
            bird_access_key: None,
            bird_base_url: "https://api.bird.com".to_string(),
            sender_tag: "Suno".to_string(),
            window_minutes: 3,
            max_messages: 3,
        }
    }
}

impl VerificationConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(u64::from(self.window_minutes) * 60)
    }
}

/// Authenticated egress proxy for one identity
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProxyProfile {
    pub address: String,
    #[serde(default)]
    pub port: u16,
    pub username: String,
    pub password: String,
    /// `http` or `https`; credentials are answered by the browser extension
    #[serde(default = "default_proxy_scheme")]
    pub scheme: String,
}

fn default_proxy_scheme() -> String {
    "http".to_string()
}

impl ProxyProfile {
    /// Name of the first field that is empty or unusable
    pub fn invalid_field(&self) -> Option<&'static str> {
        if self.address.trim().is_empty() {
            Some("address")
        } else if self.port == 0 {
            Some("port")
        } else if self.username.trim().is_empty() {
            Some("username")
        } else if self.password.is_empty() {
            Some("password")
        } else if !matches!(self.scheme.as_str(), "http" | "https") {
            Some("scheme")
        } else {
            None
        }
    }

    /// Value for `--proxy-server`, e.g. `http://proxy.example.net:8080`
    pub fn server(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.address.trim(), self.port)
    }
}

/// Login details for one identity
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdentityProfile {
    pub phone: String,
    pub country: String,
    /// Dial prefix as shown on the sign-in page, e.g. `+1`
    pub country_code: String,
    pub provider: Provider,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub proxy: Option<ProxyProfile>,
}

impl IdentityProfile {
    /// Name of the first required field that is empty
    pub fn missing_field(&self) -> Option<&'static str> {
        let required = [
            ("phone", self.phone.as_str()),
            ("country", self.country.as_str()),
            ("country_code", self.country_code.as_str()),
        ];
        required
            .iter()
            .find(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
    }

    /// Full international number, e.g. `+15550001111`
    pub fn full_number(&self) -> String {
        format!("{}{}", self.country_code, self.phone)
    }
}

/// Immutable process-wide configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub root_folder: PathBuf,
    pub database_path: PathBuf,
    pub archive_dir: PathBuf,
    pub urls: UrlConfig,
    pub webdriver: WebDriverConfig,
    pub limits: LimitsConfig,
    pub timings: TimingsConfig,
    pub selectors: Selectors,
    pub alerts: AlertsConfig,
    pub verification: VerificationConfig,
    pub allowed_ips: Vec<String>,
    pub identities: HashMap<String, IdentityProfile>,
}

impl RunnerConfig {
    /// Build the configuration from a parsed TOML document and a resolved root
    pub fn from_toml(toml: RunnerToml, root_folder: PathBuf) -> Self {
        let database_path = toml
            .database_file
            .unwrap_or_else(|| root_folder.join("songgen.db"));
        let archive_dir = toml
            .archive_dir
            .unwrap_or_else(|| root_folder.join("profile_archive"));

        Self {
            root_folder,
            database_path,
            archive_dir,
            urls: toml.urls,
            webdriver: toml.webdriver,
            limits: toml.limits,
            timings: toml.timings,
            selectors: toml.selectors,
            alerts: toml.alerts,
            verification: toml.verification,
            allowed_ips: toml.allowed_ips,
            identities: toml.identities,
        }
    }

    pub fn page_navigation(&self) -> NavigationSettings {
        NavigationSettings {
            max_attempts: self.limits.page_load_attempts,
            load_wait: Duration::from_secs(self.timings.page_load_wait_secs),
            poll_interval: Duration::from_millis(self.timings.ready_poll_millis),
        }
    }

    pub fn detail_navigation(&self) -> NavigationSettings {
        NavigationSettings {
            max_attempts: self.limits.detail_load_attempts,
            load_wait: Duration::from_secs(self.timings.detail_load_wait_secs),
            poll_interval: Duration::from_millis(self.timings.ready_poll_millis),
        }
    }

    pub fn pacing(&self) -> &Pacing {
        &self.timings.pacing
    }
}

/// Per-job parameters, validated before any external interaction
#[derive(Debug, Clone)]
pub struct JobParams {
    pub generation_id: String,
    pub identity: String,
    pub max_runtime: Duration,
}

impl JobParams {
    /// Check the parameters against the configuration
    ///
    /// Returns the identity's login profile on success.
    pub fn validate<'a>(&self, config: &'a RunnerConfig) -> Result<&'a IdentityProfile, JobError> {
        let id = self.generation_id.trim();
        if id.is_empty() || id.chars().count() > MAX_GENERATION_ID_LENGTH {
            return Err(JobError::Parameters(format!(
                "generation id must be 1..={} characters",
                MAX_GENERATION_ID_LENGTH
            )));
        }

        if !SessionBudget::is_valid_runtime(self.max_runtime.as_secs()) {
            return Err(JobError::Parameters(format!(
                "max runtime {}s outside the accepted window",
                self.max_runtime.as_secs()
            )));
        }

        let profile = config
            .identities
            .get(&self.identity)
            .ok_or_else(|| JobError::Parameters(format!("unknown identity {}", self.identity)))?;

        if let Some(field) = profile.missing_field() {
            return Err(JobError::Parameters(format!(
                "identity {} has an empty {}",
                self.identity, field
            )));
        }

        match &profile.proxy {
            Some(proxy) => {
                if let Some(field) = proxy.invalid_field() {
                    return Err(JobError::Parameters(format!(
                        "identity {} has an invalid proxy {}",
                        self.identity, field
                    )));
                }
            }
            None if config.webdriver.require_proxy => {
                return Err(JobError::Parameters(format!(
                    "identity {} has no proxy",
                    self.identity
                )));
            }
            None => {}
        }

        Ok(profile)
    }
}
