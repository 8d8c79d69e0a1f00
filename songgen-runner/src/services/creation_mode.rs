//! Creation mode negotiation
//!
//! The instrumental and custom toggles are each observed through two
//! mutually exclusive locators (enabled / disabled). Exactly one of the pair
//! must match; anything else is an ambiguous read and negotiation fails
//! without touching the page.

use crate::models::CreationMode;
use crate::page::{locate, PageClient, PageError, Selectors};
use crate::utils::Pacing;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("Ambiguous {0} toggle state")]
    AmbiguousState(&'static str),

    #[error("Could not click the {0} toggle")]
    ToggleMissing(&'static str),

    #[error(transparent)]
    Page(#[from] PageError),
}

impl NegotiationError {
    pub fn kind(&self) -> crate::error::ErrorKind {
        match self {
            NegotiationError::AmbiguousState(_) => crate::error::ErrorKind::Structural,
            _ => crate::error::ErrorKind::Interaction,
        }
    }
}

/// Read one toggle from its enabled/disabled locator pair
async fn read_toggle<P: PageClient + ?Sized>(
    page: &P,
    axis: &'static str,
    enabled_selector: &str,
    disabled_selector: &str,
) -> Result<bool, NegotiationError> {
    let enabled = locate(page, enabled_selector).await?.is_some();
    let disabled = locate(page, disabled_selector).await?.is_some();

    match (enabled, disabled) {
        (true, false) => Ok(true),
        (false, true) => Ok(false),
        _ => Err(NegotiationError::AmbiguousState(axis)),
    }
}

/// Observe both toggles
pub async fn observe_mode<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
) -> Result<CreationMode, NegotiationError> {
    let instrumental = read_toggle(
        page,
        "instrumental",
        &selectors.instrumental_enabled,
        &selectors.instrumental_disabled,
    )
    .await?;
    let custom = read_toggle(
        page,
        "custom",
        &selectors.custom_enabled,
        &selectors.custom_disabled,
    )
    .await?;

    Ok(CreationMode { instrumental, custom })
}

/// Dismiss the custom-mode onboarding popups; each step is skipped when absent
pub async fn dismiss_custom_onboarding<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
    pacing: &Pacing,
) -> Result<(), PageError> {
    for selector in [&selectors.custom_get_started_button, &selectors.custom_terms_button] {
        if let Some(button) = locate(page, selector).await? {
            page.click(&button).await?;
            pacing.micro().await;
            pacing.micro().await;
        }
    }
    Ok(())
}

/// Bring the page toggles in line with `desired`
///
/// Each mismatched axis gets exactly one click on the locator matching its
/// current state. Entering custom mode triggers the onboarding dismissal.
/// Returns the number of toggles clicked.
pub async fn negotiate_mode<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
    pacing: &Pacing,
    desired: CreationMode,
) -> Result<usize, NegotiationError> {
    let observed = observe_mode(page, selectors).await?;
    info!(?observed, ?desired, "Negotiating creation mode");

    let mut clicks = 0;

    if observed.instrumental != desired.instrumental {
        let selector = if observed.instrumental {
            &selectors.instrumental_enabled
        } else {
            &selectors.instrumental_disabled
        };
        let toggle = locate(page, selector)
            .await?
            .ok_or(NegotiationError::ToggleMissing("instrumental"))?;
        page.click(&toggle).await?;
        pacing.short().await;
        clicks += 1;
        info!("Toggled instrumental");
    }

    if observed.custom != desired.custom {
        let selector = if observed.custom {
            &selectors.custom_enabled
        } else {
            &selectors.custom_disabled
        };
        let toggle = locate(page, selector)
            .await?
            .ok_or(NegotiationError::ToggleMissing("custom"))?;
        page.click(&toggle).await?;
        pacing.short().await;
        clicks += 1;
        info!("Toggled custom mode");

        if desired.custom {
            dismiss_custom_onboarding(page, selectors, pacing).await?;
        }
    }

    Ok(clicks)
}
