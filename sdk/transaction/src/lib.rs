use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod fee;
pub mod literal;

pub use fee::{Fee, FeeError, MICROCREDITS_PER_CREDIT};
pub use literal::{Literal, LiteralError, LiteralType};

/// Suffix every deployed program id carries.
pub const PROGRAM_SUFFIX: &str = ".aleo";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,
    #[error("`{0}` is not a valid identifier")]
    Invalid(String),
    #[error("program id `{0}` must end with `{PROGRAM_SUFFIX}`")]
    MissingProgramSuffix(String),
}

/// Returns true for `[A-Za-z][A-Za-z0-9_]*`.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A deployed program, e.g. `private_donation.aleo`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProgramId(String);

impl ProgramId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ProgramId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdentifierError::Empty);
        }
        let name = s
            .strip_suffix(PROGRAM_SUFFIX)
            .ok_or_else(|| IdentifierError::MissingProgramSuffix(s.to_string()))?;
        if !is_identifier(name) {
            return Err(IdentifierError::Invalid(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ProgramId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProgramId> for String {
    fn from(value: ProgramId) -> Self {
        value.0
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier the gateway assigns to a broadcast transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Ledger status of a submitted transaction, as observed by the poller.
///
/// Transitions only move forward: `Submitted → Pending* → {Finalized | Rejected | Failed}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    Submitted,
    Pending,
    Finalized,
    Rejected,
    Failed,
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Rejected | Self::Failed)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Submitted => "Submitted",
            Self::Pending => "Pending",
            Self::Finalized => "Finalized",
            Self::Rejected => "Rejected",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}
