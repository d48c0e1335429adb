//! Worker message protocol
//!
//! Requests and responses are JSON objects tagged by `type`:
//!
//! ```text
//!   → {"type":"generate_account"}
//!   → {"type":"execute_transaction","payload":{"privateKeyString":..,"functionName":..,"inputs":[..],"fee":1}}
//!   → {"type":"track_transaction","payload":{"transactionId":..}}
//!
//!   ← {"type":"worker_loaded"}
//!   ← {"type":"account_generated","result":{"privateKey":..,"address":..}}
//!   ← {"type":"transaction_broadcasted","result":{"transactionId":..,"functionName":..}}
//!   ← {"type":"transaction_status_updated" | "transaction_failed","result":{..}}
//!   ← {"type":"transaction_finalized","result":{..,"transaction":{..}}}
//!   ← {"type":"error","result":"..."}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use zeroize::Zeroizing;

use shroud_account::Account;
use shroud_transaction::{TransactionId, TxStatus};

use crate::executor::{ExecutionRequest, FeeInput, TransactionOutcome};
use crate::poller::PollState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("message is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("message must be a JSON object")]
    NotAnObject,

    #[error("message has no type")]
    MissingType,

    #[error("unhandled message type")]
    UnhandledType(String),

    #[error("malformed {kind} payload: {reason}")]
    MalformedPayload { kind: &'static str, reason: String },
}

/// Raw message as received from the presentation layer
#[derive(Debug, Clone)]
pub enum Inbound {
    Json(Value),
    Text(String),
}

impl From<Value> for Inbound {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for Inbound {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Inbound {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// A decoded request
#[derive(Debug)]
pub enum WorkerRequest {
    GenerateAccount,
    ExecuteTransaction(ExecutePayload),
    TrackTransaction(TrackPayload),
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExecutePayload {
    #[serde(default)]
    pub private_key_string: Option<String>,
    #[serde(default)]
    pub function_name: Option<String>,
    #[serde(default)]
    pub inputs: Option<Vec<String>>,
    /// Number, numeric string, or anything else (rejected as an invalid fee)
    #[serde(default)]
    pub fee: Option<Value>,
}

// Keeps the private key out of logs.
impl std::fmt::Debug for ExecutePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutePayload")
            .field("private_key_string", &"<redacted>")
            .field("function_name", &self.function_name)
            .field("inputs", &self.inputs)
            .field("fee", &self.fee)
            .finish()
    }
}

impl ExecutePayload {
    pub fn into_request(self) -> ExecutionRequest {
        let fee = match self.fee {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => Some(match n.as_f64() {
                Some(credits) => FeeInput::Credits(credits),
                None => FeeInput::Text(n.to_string()),
            }),
            Some(Value::String(s)) => Some(FeeInput::Text(s)),
            Some(other) => Some(FeeInput::Text(other.to_string())),
        };

        ExecutionRequest {
            private_key: Zeroizing::new(self.private_key_string.unwrap_or_default()),
            function_name: self.function_name.unwrap_or_default(),
            inputs: self.inputs.unwrap_or_default(),
            fee,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPayload {
    pub transaction_id: TransactionId,
}

impl WorkerRequest {
    pub fn decode(inbound: Inbound) -> Result<Self, ProtocolError> {
        match inbound {
            Inbound::Json(value) => Self::from_value(value),
            Inbound::Text(text) => {
                let value: Value = serde_json::from_str(&text)
                    .map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
                Self::from_value(value)
            }
        }
    }

    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(mut map) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        let kind = match map.remove("type") {
            Some(Value::String(kind)) => kind,
            Some(_) | None => return Err(ProtocolError::MissingType),
        };
        let payload = map.remove("payload").filter(|p| !p.is_null());

        match kind.as_str() {
            "generate_account" => Ok(Self::GenerateAccount),
            "execute_transaction" => {
                let payload = match payload {
                    Some(p) => serde_json::from_value(p).map_err(|e| malformed("execute_transaction", e))?,
                    None => ExecutePayload::default(),
                };
                Ok(Self::ExecuteTransaction(payload))
            }
            "track_transaction" => {
                let payload = payload.ok_or_else(|| ProtocolError::MalformedPayload {
                    kind: "track_transaction",
                    reason: "missing payload".into(),
                })?;
                let payload: TrackPayload =
                    serde_json::from_value(payload).map_err(|e| malformed("track_transaction", e))?;
                if payload.transaction_id.as_str().trim().is_empty() {
                    return Err(ProtocolError::MalformedPayload {
                        kind: "track_transaction",
                        reason: "transactionId is empty".into(),
                    });
                }
                Ok(Self::TrackTransaction(payload))
            }
            _ => Err(ProtocolError::UnhandledType(kind)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::GenerateAccount => "generate_account",
            Self::ExecuteTransaction(_) => "execute_transaction",
            Self::TrackTransaction(_) => "track_transaction",
        }
    }
}

fn malformed(kind: &'static str, e: serde_json::Error) -> ProtocolError {
    ProtocolError::MalformedPayload {
        kind,
        reason: e.to_string(),
    }
}

/// Terminal state of a finalized transaction plus its ledger record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedTransaction {
    #[serde(flatten)]
    pub state: PollState,
    /// Absent when the ledger record could not be fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Value>,
}

/// Messages sent back to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerResponse {
    WorkerLoaded,
    AccountGenerated { result: Account },
    TransactionBroadcasted { result: TransactionOutcome },
    TransactionStatusUpdated { result: PollState },
    TransactionFinalized { result: FinalizedTransaction },
    TransactionFailed { result: PollState },
    Error { result: String },
}

impl WorkerResponse {
    pub fn error(message: impl ToString) -> Self {
        Self::Error {
            result: message.to_string(),
        }
    }

    /// Final event for a tracked transaction. `transaction` is only reported
    /// alongside a finalized state.
    pub fn terminal(state: PollState, transaction: Option<Value>) -> Self {
        match state.status {
            TxStatus::Finalized => Self::TransactionFinalized {
                result: FinalizedTransaction { state, transaction },
            },
            _ => Self::TransactionFailed { result: state },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::WorkerLoaded => "worker_loaded",
            Self::AccountGenerated { .. } => "account_generated",
            Self::TransactionBroadcasted { .. } => "transaction_broadcasted",
            Self::TransactionStatusUpdated { .. } => "transaction_status_updated",
            Self::TransactionFinalized { .. } => "transaction_finalized",
            Self::TransactionFailed { .. } => "transaction_failed",
            Self::Error { .. } => "error",
        }
    }
}
