use std::fmt;

use serde::{Deserialize, Serialize};

/// An account as handed to the presentation layer.
///
/// Both fields are in their canonical text form. The address is always the one
/// derived from `private_key`; the pair is never split or mutated.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub private_key: String,
    pub address: String,
}

impl Account {
    pub fn new(private_key: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            private_key: private_key.into(),
            address: address.into(),
        }
    }
}

// Keeps the secret out of logs and panic messages.
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("private_key", &"<redacted>")
            .field("address", &self.address)
            .finish()
    }
}
