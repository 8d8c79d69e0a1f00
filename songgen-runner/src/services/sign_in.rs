//! Phone sign-in
//!
//! NOT_STARTED → DETAILS_VALIDATED → ON_SIGN_IN_PAGE → COUNTRY_SELECTED →
//! PHONE_ENTERED → CODE_REQUESTED → FETCHING_CODE → SIGNED_IN | FAILED
//!
//! The code fetch is its own small ladder ([`SignInLadder`]): three fetches,
//! the second and third each preceded by one click on "resend". No state is
//! revisited, and any missing control ends the flow with a distinct error.

use crate::config::{IdentityProfile, UrlConfig, VerificationConfig};
use crate::page::{locate, locate_within, PageClient, PageError, Selectors};
use crate::utils::Pacing;
use crate::verification::VerificationChannel;
use thiserror::Error;
use tracing::{info, warn};

/// Text shown once a code has been sent
pub const CHECK_PHONE_MARKER: &str = "Check your phone";

#[derive(Debug, Error)]
pub enum SignInError {
    #[error("Invalid sign in details: empty {0}")]
    InvalidDetails(&'static str),

    #[error("Not on the phone sign in page (at {0})")]
    NotOnSignInPage(String),

    #[error("Could not find the country code selector")]
    CountrySelectorMissing,

    #[error("Could not find the country code search field")]
    CountrySearchMissing,

    #[error("Could not find the target country {0}")]
    CountryNotFound(String),

    #[error("Country code {code} matched {matches} rows")]
    CountryAmbiguous { code: String, matches: usize },

    #[error("Could not find the phone input field")]
    PhoneFieldMissing,

    #[error("Could not find the Continue button")]
    ContinueMissing,

    #[error("Not on the Check your phone screen")]
    VerificationScreenMissing,

    #[error("Could not find the Resend button")]
    ResendMissing,

    #[error("No verification code after {attempts} fetches")]
    CodeNotReceived { attempts: u32 },

    #[error("Could not find the input field for the sign in code")]
    CodeFieldMissing,

    #[error("Not on the create page after entering the code (at {0})")]
    NotSignedIn(String),

    #[error(transparent)]
    Page(#[from] PageError),
}

impl SignInError {
    pub fn kind(&self) -> crate::error::ErrorKind {
        match self {
            SignInError::InvalidDetails(_) => crate::error::ErrorKind::Validation,
            SignInError::CountryAmbiguous { .. } => crate::error::ErrorKind::Structural,
            _ => crate::error::ErrorKind::Interaction,
        }
    }
}

/// Sign-in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInState {
    NotStarted,
    DetailsValidated,
    OnSignInPage,
    CountrySelected,
    PhoneEntered,
    CodeRequested,
    FetchingCode(SignInLadder),
    SignedIn,
    Failed,
}

/// Verification code fetch ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInLadder {
    /// Fetch without resending
    FirstFetch,
    /// Resend once, then fetch
    ResendAttempt1,
    /// Resend again, then fetch; last chance
    ResendAttempt2,
    Exhausted,
}

impl SignInLadder {
    pub fn start() -> Self {
        SignInLadder::FirstFetch
    }

    /// Whether this rung clicks "resend" before fetching
    pub fn requires_resend(&self) -> bool {
        matches!(self, SignInLadder::ResendAttempt1 | SignInLadder::ResendAttempt2)
    }

    /// Rung to try after a fetch came back empty
    pub fn next(self) -> Self {
        match self {
            SignInLadder::FirstFetch => SignInLadder::ResendAttempt1,
            SignInLadder::ResendAttempt1 => SignInLadder::ResendAttempt2,
            SignInLadder::ResendAttempt2 | SignInLadder::Exhausted => SignInLadder::Exhausted,
        }
    }

    /// 1-based fetch number
    pub fn attempt(&self) -> u32 {
        match self {
            SignInLadder::FirstFetch => 1,
            SignInLadder::ResendAttempt1 => 2,
            SignInLadder::ResendAttempt2 | SignInLadder::Exhausted => 3,
        }
    }
}

/// One sign-in run against the page
pub struct SignInFlow<'a, P: PageClient + ?Sized> {
    page: &'a P,
    selectors: &'a Selectors,
    urls: &'a UrlConfig,
    pacing: &'a Pacing,
    channel: &'a dyn VerificationChannel,
    verification: &'a VerificationConfig,
    state: SignInState,
}

impl<'a, P: PageClient + ?Sized> SignInFlow<'a, P> {
    pub fn new(
        page: &'a P,
        selectors: &'a Selectors,
        urls: &'a UrlConfig,
        pacing: &'a Pacing,
        channel: &'a dyn VerificationChannel,
        verification: &'a VerificationConfig,
    ) -> Self {
        Self {
            page,
            selectors,
            urls,
            pacing,
            channel,
            verification,
            state: SignInState::NotStarted,
        }
    }

    pub fn state(&self) -> SignInState {
        self.state
    }

    fn advance(&mut self, next: SignInState) {
        info!(from = ?self.state, to = ?next, "Sign-in state");
        self.state = next;
    }

    /// Run the whole flow; the state ends in `SignedIn` or `Failed`
    pub async fn sign_in(&mut self, identity: &IdentityProfile) -> Result<(), SignInError> {
        let result = self.run(identity).await;
        match &result {
            Ok(()) => self.advance(SignInState::SignedIn),
            Err(e) => {
                warn!(error = %e, "Sign-in failed");
                self.advance(SignInState::Failed);
            }
        }
        result
    }

    async fn run(&mut self, identity: &IdentityProfile) -> Result<(), SignInError> {
        if let Some(field) = identity.missing_field() {
            return Err(SignInError::InvalidDetails(field));
        }
        self.advance(SignInState::DetailsValidated);

        let location = self.page.current_location().await?;
        if !location.starts_with(&self.urls.sign_in_url) {
            return Err(SignInError::NotOnSignInPage(location));
        }
        self.advance(SignInState::OnSignInPage);

        self.select_country(&identity.country, &identity.country_code)
            .await?;
        self.advance(SignInState::CountrySelected);

        self.enter_phone_number(&identity.phone).await?;
        self.advance(SignInState::PhoneEntered);

        self.request_code().await?;
        self.advance(SignInState::CodeRequested);

        let code = self.fetch_code_ladder().await?;
        self.enter_code(&code).await?;

        let location = self.page.current_location().await?;
        if !location.starts_with(&self.urls.create_url) {
            return Err(SignInError::NotSignedIn(location));
        }
        Ok(())
    }

    async fn select_country(&mut self, country: &str, country_code: &str) -> Result<(), SignInError> {
        let selector = locate(self.page, &self.selectors.country_code_button)
            .await?
            .ok_or(SignInError::CountrySelectorMissing)?;
        self.page.click(&selector).await?;
        self.pacing.short().await;

        let search = locate(self.page, &self.selectors.country_code_search_field)
            .await?
            .ok_or(SignInError::CountrySearchMissing)?;
        self.page.type_text(&search, country).await?;
        self.pacing.short().await;

        let mut matching = Vec::new();
        for row in self.page.find_all(&self.selectors.country_code_row).await? {
            // A row qualifies only with exactly one code label
            if let Some(label) = locate_within(self.page, &row, &self.selectors.country_code_label).await? {
                let text = self.page.read_text(&label).await?;
                if text.trim().eq_ignore_ascii_case(country_code.trim()) {
                    matching.push(row);
                }
            }
        }

        match matching.len() {
            0 => Err(SignInError::CountryNotFound(country_code.to_string())),
            1 => {
                self.page.click(&matching[0]).await?;
                self.pacing.short().await;
                Ok(())
            }
            n => Err(SignInError::CountryAmbiguous {
                code: country_code.to_string(),
                matches: n,
            }),
        }
    }

    async fn enter_phone_number(&mut self, phone: &str) -> Result<(), SignInError> {
        let field = locate(self.page, &self.selectors.phone_input)
            .await?
            .ok_or(SignInError::PhoneFieldMissing)?;
        self.page.click(&field).await?;
        self.page.type_text(&field, phone).await?;
        self.pacing.short().await;
        Ok(())
    }

    async fn request_code(&mut self) -> Result<(), SignInError> {
        let button = locate(self.page, &self.selectors.continue_button)
            .await?
            .ok_or(SignInError::ContinueMissing)?;
        self.page.click(&button).await?;
        self.pacing.long().await;
        self.pacing.normal().await;

        if !self.page.page_text().await?.contains(CHECK_PHONE_MARKER) {
            return Err(SignInError::VerificationScreenMissing);
        }
        Ok(())
    }

    async fn fetch_code_ladder(&mut self) -> Result<String, SignInError> {
        let mut rung = SignInLadder::start();

        while rung != SignInLadder::Exhausted {
            self.advance(SignInState::FetchingCode(rung));

            if rung.requires_resend() {
                let resend = locate(self.page, &self.selectors.resend_code_button)
                    .await?
                    .ok_or(SignInError::ResendMissing)?;
                self.page.click(&resend).await?;
                info!(attempt = rung.attempt(), "Resent verification code");
                self.pacing.long().await;
                self.pacing.short().await;
            }

            if let Some(code) = self.fetch_once(rung.attempt()).await {
                info!(attempt = rung.attempt(), "Got the verification code");
                return Ok(code);
            }

            rung = rung.next();
        }

        Err(SignInError::CodeNotReceived { attempts: 3 })
    }

    async fn fetch_once(&self, attempt: u32) -> Option<String> {
        match self
            .channel
            .fetch_code(self.verification.window(), self.verification.max_messages)
            .await
        {
            Ok(code) => code,
            Err(e) => {
                warn!(attempt, error = %e, "Verification code fetch failed");
                None
            }
        }
    }

    async fn enter_code(&mut self, code: &str) -> Result<(), SignInError> {
        let field = locate(self.page, &self.selectors.code_first_digit)
            .await?
            .ok_or(SignInError::CodeFieldMissing)?;
        self.page.type_text(&field, code).await?;
        info!("Typed the verification code, waiting for the create page");
        self.pacing.long().await;
        Ok(())
    }
}
