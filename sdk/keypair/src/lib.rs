use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signer, SigningKey};
use hkdf::Hkdf;
use rand_core::{OsRng, TryRngCore};
use sha2::Sha256;
use shroud_account::Account;
use shroud_address::{Address, PublicKeys};
use thiserror::Error;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// Text prefix of an encoded private key.
pub const PRIVATE_KEY_PREFIX: &str = "APrivateKey1";
/// Text prefix of an encoded view key.
pub const VIEW_KEY_PREFIX: &str = "AViewKey1";

// Leading bytes that base58-encode to the text prefixes above.
const PRIVATE_KEY_TAG: [u8; 11] = [127, 134, 189, 116, 210, 221, 210, 137, 145, 18, 253];
const VIEW_KEY_TAG: [u8; 7] = [14, 138, 223, 204, 247, 224, 122];

const SIGNING_KEY_INFO: &[u8] = b"shroud-signing-key";
const VIEW_KEY_INFO: &[u8] = b"shroud-view-key";

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("entropy source unavailable: {0}")]
    Entropy(String),
    #[error("private key must start with `{PRIVATE_KEY_PREFIX}`")]
    MissingPrefix,
    #[error("private key is not valid base58: {0}")]
    Base58(#[from] bs58::decode::Error),
    #[error("private key must decode to 43 bytes, got {0}")]
    InvalidLength(usize),
}

/// A user's key set, derived from a single 32-byte seed.
/// NEVER expose this struct's internals.
pub struct Keypair {
    seed: Zeroizing<[u8; 32]>,
    signing_key: SigningKey,
    view_key: StaticSecret,
}

impl Keypair {
    /// Generates a fresh random key set from the OS entropy source.
    pub fn generate() -> Result<Self, KeyError> {
        let mut seed = Zeroizing::new([0u8; 32]);
        OsRng
            .try_fill_bytes(&mut *seed)
            .map_err(|e| KeyError::Entropy(e.to_string()))?;
        Ok(Self::from_seed(&seed))
    }

    /// Reconstructs the key set from its seed.
    /// Signing and view keys are expanded with HKDF-SHA256 under distinct labels.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let hk = Hkdf::<Sha256>::new(None, seed);

        let mut signing_bytes = Zeroizing::new([0u8; 32]);
        hk.expand(SIGNING_KEY_INFO, &mut *signing_bytes)
            .expect("HKDF expansion failed");
        let mut view_bytes = Zeroizing::new([0u8; 32]);
        hk.expand(VIEW_KEY_INFO, &mut *view_bytes)
            .expect("HKDF expansion failed");

        Self {
            seed: Zeroizing::new(*seed),
            signing_key: SigningKey::from_bytes(&signing_bytes),
            view_key: StaticSecret::from(*view_bytes),
        }
    }

    /// Parses the `APrivateKey1…` text form.
    ///
    /// The whole string is base58 over an 11-byte tag followed by the seed.
    pub fn from_private_key(private_key: &str) -> Result<Self, KeyError> {
        let bytes = Zeroizing::new(bs58::decode(private_key.trim()).into_vec()?);
        let seed = bytes
            .strip_prefix(&PRIVATE_KEY_TAG[..])
            .ok_or(KeyError::MissingPrefix)?;
        let seed: &[u8; 32] = seed
            .try_into()
            .map_err(|_| KeyError::InvalidLength(bytes.len()))?;
        Ok(Self::from_seed(seed))
    }

    /// The private key in its `APrivateKey1…` text form.
    pub fn private_key(&self) -> Zeroizing<String> {
        Zeroizing::new(encode_tagged(&PRIVATE_KEY_TAG, &self.seed))
    }

    /// The view key in its `AViewKey1…` text form.
    /// Grants read access to the owner's records, not spending rights.
    pub fn view_key(&self) -> Zeroizing<String> {
        let bytes = Zeroizing::new(self.view_key.to_bytes());
        Zeroizing::new(encode_tagged(&VIEW_KEY_TAG, &bytes))
    }

    /// Returns the public key set (safe to share).
    pub fn public_keys(&self) -> PublicKeys {
        PublicKeys {
            signer_pk: self.signing_key.verifying_key().to_bytes(),
            view_pk: X25519PublicKey::from(&self.view_key).to_bytes(),
        }
    }

    /// Returns the public address.
    pub fn address(&self) -> Address {
        self.public_keys().derive_address()
    }

    /// The account pair handed to the presentation layer.
    pub fn to_account(&self) -> Account {
        Account::new(self.private_key().as_str(), self.address().to_string())
    }

    /// Ed25519 public key used to check [`Keypair::sign`] output.
    pub fn signer_pubkey(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Signs an arbitrary message with the account's signing key.
    pub fn sign(&self, msg: &[u8]) -> [u8; 64] {
        self.signing_key.sign(msg).to_bytes()
    }
}

fn encode_tagged(tag: &[u8], key: &[u8; 32]) -> String {
    let mut raw = Zeroizing::new(Vec::with_capacity(tag.len() + key.len()));
    raw.extend_from_slice(tag);
    raw.extend_from_slice(key);
    bs58::encode(&raw[..]).into_string()
}

impl FromStr for Keypair {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_private_key(s)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
