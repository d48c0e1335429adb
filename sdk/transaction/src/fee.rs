//! Transaction fees.
//!
//! Fees are entered in credits and sent to the gateway in integer microcredits.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const MICROCREDITS_PER_CREDIT: f64 = 1_000_000.0;

/// Largest fee, in credits, whose microcredit amount fits in a `u64`.
pub const MAX_FEE_CREDITS: f64 = u64::MAX as f64 / MICROCREDITS_PER_CREDIT;

#[derive(Debug, Error, PartialEq)]
pub enum FeeError {
    #[error("fee `{0}` is not a number")]
    NotANumber(String),
    #[error("fee must be finite")]
    NotFinite,
    #[error("fee must be non-negative, got {0}")]
    Negative(f64),
    #[error("fee of {0} credits exceeds the largest representable fee")]
    TooLarge(f64),
}

/// A validated, finite, non-negative fee in credits.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Fee {
    credits: f64,
}

impl Fee {
    pub fn from_credits(credits: f64) -> Result<Self, FeeError> {
        if !credits.is_finite() {
            return Err(FeeError::NotFinite);
        }
        if credits < 0.0 {
            return Err(FeeError::Negative(credits));
        }
        // u64::MAX as f64 rounds up to 2^64, so the bound itself is excluded
        if credits >= MAX_FEE_CREDITS {
            return Err(FeeError::TooLarge(credits));
        }
        // normalise -0.0
        Ok(Self {
            credits: credits.abs(),
        })
    }

    pub fn credits(&self) -> f64 {
        self.credits
    }

    /// Fee in microcredits, rounded to the nearest unit.
    pub fn microcredits(&self) -> u64 {
        (self.credits * MICROCREDITS_PER_CREDIT).round() as u64
    }
}

impl FromStr for Fee {
    type Err = FeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let credits: f64 = trimmed
            .parse()
            .map_err(|_| FeeError::NotANumber(trimmed.to_string()))?;
        Self::from_credits(credits)
    }
}

impl fmt::Display for Fee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} credits", self.credits)
    }
}
