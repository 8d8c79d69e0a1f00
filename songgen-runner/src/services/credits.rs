//! Credit monitor

use crate::alerts::ErrorReporter;
use crate::models::{CreditBalance, CreditError};
use crate::page::{locate, PageClient, Selectors};
use crate::store::{RecordStore, StoreError};
use thiserror::Error;
use tracing::{info, warn};

/// Read the balance shown on the page
pub async fn read_balance<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
) -> Result<CreditBalance, CreditError> {
    let element = match locate(page, &selectors.credits_balance).await {
        Ok(Some(element)) => element,
        Ok(None) => return Err(CreditError::Unreadable),
        Err(e) => {
            warn!(error = %e, "Could not look up the credit balance");
            return Err(CreditError::Unreadable);
        }
    };

    let text = page.read_text(&element).await.map_err(|e| {
        warn!(error = %e, "Could not read the credit balance");
        CreditError::Unreadable
    })?;
    CreditBalance::parse(&text)
}

/// Why refreshing the balance failed
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Could not read the credit balance: {0}")]
    Read(CreditError),

    #[error("Could not save the credit balance: {0}")]
    Save(StoreError),
}

/// Read the balance, alert when low and persist it
pub async fn refresh_credits<P: PageClient + ?Sized>(
    page: &P,
    selectors: &Selectors,
    store: &dyn RecordStore,
    reporter: &ErrorReporter,
    identity: &str,
) -> Result<CreditBalance, RefreshError> {
    let balance = read_balance(page, selectors)
        .await
        .map_err(RefreshError::Read)?;
    info!(identity, balance = %balance, "Read credit balance");

    if balance.is_low() {
        reporter
            .notify_only(
                "This account's credit balance is at or below the minimum. Please top up the account soon.",
            )
            .await;
    }

    store
        .update_credits(identity, i64::from(balance.value()))
        .await
        .map_err(RefreshError::Save)?;
    Ok(balance)
}

impl From<RefreshError> for crate::error::JobError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Read(e) => e.into(),
            RefreshError::Save(e) => e.into(),
        }
    }
}
