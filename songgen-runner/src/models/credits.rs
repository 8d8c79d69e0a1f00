//! Account credit balance

use once_cell::sync::Lazy;
use regex::Regex;
use std::num::IntErrorKind;
use thiserror::Error;

/// Largest balance accepted as plausible
pub const MAX_CREDITS: u32 = 50_000;
/// Balance at or below which operators are alerted
pub const MIN_CREDIT_BALANCE: u32 = 50;

static CREDITS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([0-9]{1,3}(?:,[0-9]{3})*|[0-9]+)\s*Credits$").expect("credits pattern is valid")
});

/// Credit balance errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreditError {
    #[error("Unrecognised credit text: {0:?}")]
    Format(String),

    #[error("Credit balance {0} outside [0, {max}]", max = MAX_CREDITS)]
    OutOfRange(u64),

    #[error("Credit balance element not found")]
    Unreadable,
}

impl CreditError {
    pub fn kind(&self) -> crate::error::ErrorKind {
        match self {
            CreditError::Unreadable => crate::error::ErrorKind::Interaction,
            CreditError::Format(_) | CreditError::OutOfRange(_) => crate::error::ErrorKind::Structural,
        }
    }
}

/// Balance in `[0, MAX_CREDITS]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CreditBalance(u32);

impl CreditBalance {
    pub fn new(value: u64) -> Result<Self, CreditError> {
        if value > MAX_CREDITS as u64 {
            return Err(CreditError::OutOfRange(value));
        }
        Ok(Self(value as u32))
    }

    /// Parse display text such as `"1,250 Credits"`
    pub fn parse(text: &str) -> Result<Self, CreditError> {
        let trimmed = text.trim();
        let caps = CREDITS_PATTERN
            .captures(trimmed)
            .ok_or_else(|| CreditError::Format(trimmed.to_string()))?;
        let digits: String = caps[1].chars().filter(|c| c.is_ascii_digit()).collect();
        let value: u64 = digits.parse().map_err(|e: std::num::ParseIntError| match e.kind() {
            IntErrorKind::PosOverflow => CreditError::OutOfRange(u64::MAX),
            _ => CreditError::Format(trimmed.to_string()),
        })?;
        Self::new(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn is_low(&self) -> bool {
        self.0 <= MIN_CREDIT_BALANCE
    }
}

impl std::fmt::Display for CreditBalance {
    /// Comma-grouped digits followed by ` Credits`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digits = self.0.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        write!(f, "{} Credits", grouped)
    }
}
