use std::fmt;
use std::str::FromStr;

use bech32::primitives::decode::{CheckedHrpstring, CheckedHrpstringError};
use bech32::{Bech32m, Hrp};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Human readable part of every ledger address.
pub const ADDRESS_HRP: Hrp = Hrp::parse_unchecked("aleo");

/// Text prefix of an encoded address (`hrp` + separator).
pub const ADDRESS_PREFIX: &str = "aleo1";

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("invalid bech32m encoding: {0}")]
    Encoding(#[from] CheckedHrpstringError),
    #[error("unexpected address prefix `{0}`")]
    WrongHrp(String),
    #[error("address payload must be 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// A public ledger address: 32 bytes, bech32m encoded as `aleo1…`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Address(pub [u8; 32]);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        bech32::encode_to_fmt::<Bech32m, _>(f, ADDRESS_HRP, &self.0).map_err(|_| fmt::Error)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let checked = CheckedHrpstring::new::<Bech32m>(s)?;
        if checked.hrp() != ADDRESS_HRP {
            return Err(AddressError::WrongHrp(checked.hrp().to_string()));
        }
        let bytes: Vec<u8> = checked.byte_iter().collect();
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The public half of an account's key set.
#[derive(Clone, Debug)]
pub struct PublicKeys {
    pub signer_pk: [u8; 32], // Ed25519
    pub view_pk: [u8; 32],   // X25519
}

impl PublicKeys {
    /// Deterministically derives the ledger address.
    /// Formula: SHA256( signer_pk_bytes || view_pk_bytes )
    pub fn derive_address(&self) -> Address {
        let mut hasher = Sha256::new();
        hasher.update(self.signer_pk);
        hasher.update(self.view_pk);
        Address(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(a: u8, b: u8) -> PublicKeys {
        PublicKeys {
            signer_pk: [a; 32],
            view_pk: [b; 32],
        }
    }

    #[test]
    fn test_display_parse() {
        let address = keys(1, 2).derive_address();
        let text = address.to_string();

        assert!(text.starts_with(ADDRESS_PREFIX));
        assert_eq!(text.len(), 63);
        assert_eq!(text.parse::<Address>().unwrap(), address);
    }

    #[test]
    fn test_derivation_depends_on_both_keys() {
        let base = keys(1, 2).derive_address();
        assert_eq!(base, keys(1, 2).derive_address());
        assert_ne!(base, keys(1, 3).derive_address());
        assert_ne!(base, keys(3, 2).derive_address());
    }

    #[test]
    fn test_rejects_foreign_hrp() {
        let foreign = bech32::encode::<Bech32m>(Hrp::parse_unchecked("zeta"), &[7u8; 32]).unwrap();
        assert!(matches!(
            foreign.parse::<Address>(),
            Err(AddressError::WrongHrp(_))
        ));
    }

    #[test]
    fn test_rejects_short_payload() {
        let short = bech32::encode::<Bech32m>(ADDRESS_HRP, &[7u8; 20]).unwrap();
        assert!(matches!(
            short.parse::<Address>(),
            Err(AddressError::InvalidLength(20))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("aleo1abc".parse::<Address>().is_err());
        assert!("not an address".parse::<Address>().is_err());
    }
}
