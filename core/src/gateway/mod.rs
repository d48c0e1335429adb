//! Ledger gateway
//!
//! The gateway is the only network collaborator of the worker:
//!
//! ```text
//!   GatewayProofBackend ── POST {base}/execute ─────────────▶ ┐
//!                                                            │
//!   StatusPoller ──────── GET  {base}/transaction/{id}/status ▶ │  ledger gateway
//!                 └────── GET  {base}/transaction/{id} ────────▶ ┘
//! ```
//!
//! [`LedgerGateway`] is the seam the executor and poller are generic over, so
//! tests can swap the HTTP client for an in-memory stub.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use shroud_transaction::{TransactionId, TxStatus};

pub mod http;

pub use http::HttpGateway;

/// Errors talking to the ledger gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection refused, DNS failure, request timeout
    #[error("gateway unreachable: {0}")]
    Transport(String),

    /// Gateway answered with a non-success status code
    #[error("gateway returned {status}: {body}")]
    Http { status: u16, body: String },

    /// Response body could not be interpreted
    #[error("unexpected gateway response: {0}")]
    Decode(String),

    /// The HTTP client itself could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// What the gateway said about a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReply {
    /// A status token such as `Finalized` or `pending`
    Token(String),
    /// Not indexed yet, or a body without a recognisable status
    Unknown,
}

impl StatusReply {
    /// Map the reply onto the poller's status vocabulary.
    pub fn to_status(&self) -> TxStatus {
        match self {
            Self::Token(token) => map_status_token(token),
            Self::Unknown => TxStatus::Pending,
        }
    }
}

/// Case-insensitive mapping of gateway status tokens.
///
/// `accepted` is treated as finalized; every unrecognised token is still pending.
pub fn map_status_token(token: &str) -> TxStatus {
    let token = token.trim().trim_matches('"').trim().to_ascii_lowercase();
    match token.as_str() {
        "finalized" | "accepted" => TxStatus::Finalized,
        "rejected" => TxStatus::Rejected,
        "failed" | "aborted" => TxStatus::Failed,
        _ => TxStatus::Pending,
    }
}

/// Signed execution request sent to `POST {base}/execute`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionEnvelope {
    #[serde(flatten)]
    pub body: UnsignedExecution,
    /// Hex-encoded Ed25519 verifying key of the owner
    pub signer_pubkey: String,
    /// Hex-encoded Ed25519 signature over the JSON encoding of `body`
    pub signature: String,
}

/// The part of an [`ExecutionEnvelope`] covered by the signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedExecution {
    pub program_id: String,
    pub function_name: String,
    /// Canonical literal text, in call order
    pub inputs: Vec<String>,
    pub fee_microcredits: u64,
    /// Owner address, used by the gateway to resolve private state
    pub owner: String,
}

impl UnsignedExecution {
    /// Bytes the owner signs.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, GatewayError> {
        serde_json::to_vec(self).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

/// Ledger gateway operations
pub trait LedgerGateway: Send + Sync + 'static {
    /// Broadcast a signed execution, returning the id the ledger assigned.
    fn submit(
        &self,
        envelope: &ExecutionEnvelope,
    ) -> impl Future<Output = Result<TransactionId, GatewayError>> + Send;

    /// Look up the current status of a transaction.
    fn get_status(
        &self,
        id: &TransactionId,
    ) -> impl Future<Output = Result<StatusReply, GatewayError>> + Send;

    /// Fetch the full transaction as the ledger stores it.
    fn get_transaction(
        &self,
        id: &TransactionId,
    ) -> impl Future<Output = Result<Value, GatewayError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_tokens() {
        assert_eq!(map_status_token("Finalized"), TxStatus::Finalized);
        assert_eq!(map_status_token("  FINALIZED\n"), TxStatus::Finalized);
        assert_eq!(map_status_token("\"accepted\""), TxStatus::Finalized);
        assert_eq!(map_status_token("Rejected"), TxStatus::Rejected);
        assert_eq!(map_status_token("failed"), TxStatus::Failed);
        assert_eq!(map_status_token("Aborted"), TxStatus::Failed);
    }

    #[test]
    fn test_unknown_tokens_are_pending() {
        assert_eq!(map_status_token("pending"), TxStatus::Pending);
        assert_eq!(map_status_token("in_mempool"), TxStatus::Pending);
        assert_eq!(map_status_token(""), TxStatus::Pending);
        assert_eq!(StatusReply::Unknown.to_status(), TxStatus::Pending);
    }

    #[test]
    fn test_envelope_flattens_body() {
        let envelope = ExecutionEnvelope {
            body: UnsignedExecution {
                program_id: "private_donation.aleo".into(),
                function_name: "donate".into(),
                inputs: vec!["5u64".into()],
                fee_microcredits: 100_000,
                owner: "aleo1owner".into(),
            },
            signer_pubkey: "ab".into(),
            signature: "cd".into(),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["program_id"], "private_donation.aleo");
        assert_eq!(json["fee_microcredits"], 100_000);
        assert_eq!(json["signature"], "cd");
        assert!(json.get("body").is_none());
    }
}
