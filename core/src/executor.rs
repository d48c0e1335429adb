//! Transaction executor
//!
//! Validates an execution request, derives the owner's keys and hands the call
//! to a [`ProofBackend`]. Validation runs in a fixed order and completes before
//! any key derivation or network traffic:
//!
//! 1. private key, function name and inputs are present
//! 2. fee is a finite, non-negative number
//! 3. function name is an identifier, every input is a typed literal
//! 4. private key decodes

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use shroud_keypair::Keypair;
use shroud_transaction::{Fee, FeeError, Literal, ProgramId, TransactionId, is_identifier};

use crate::backend::{ProgramCall, ProofBackend};

#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Missing or malformed field; never retried
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Fee is not a finite non-negative number
    #[error("invalid fee: {0}")]
    InvalidFee(#[from] FeeError),

    /// Proving or broadcast failed; the backend's reason is kept verbatim
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

/// Fee as supplied by the client, before validation
#[derive(Debug, Clone, PartialEq)]
pub enum FeeInput {
    Credits(f64),
    Text(String),
}

impl FeeInput {
    fn parse(&self) -> Result<Fee, FeeError> {
        match self {
            Self::Credits(credits) => Fee::from_credits(*credits),
            Self::Text(text) => text.parse(),
        }
    }
}

/// A request to run one program function
pub struct ExecutionRequest {
    pub private_key: Zeroizing<String>,
    pub function_name: String,
    pub inputs: Vec<String>,
    /// `None` falls back to the configured default fee
    pub fee: Option<FeeInput>,
}

/// Result of a successful broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutcome {
    pub transaction_id: TransactionId,
    pub function_name: String,
}

/// A request that passed validation
struct ValidatedCall {
    account: Keypair,
    function_name: String,
    inputs: Vec<Literal>,
    fee: Fee,
}

pub struct TransactionExecutor<B> {
    backend: B,
    program_id: ProgramId,
    default_fee: Fee,
}

impl<B: ProofBackend> TransactionExecutor<B> {
    pub fn new(backend: B, program_id: ProgramId, default_fee: Fee) -> Self {
        Self {
            backend,
            program_id,
            default_fee,
        }
    }

    pub fn program_id(&self) -> &ProgramId {
        &self.program_id
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Validate, derive the account, and broadcast through the backend.
    pub async fn execute(
        &self,
        request: ExecutionRequest,
    ) -> Result<TransactionOutcome, ExecutionError> {
        let call = self.validate(request)?;

        let program_call = ProgramCall {
            program_id: &self.program_id,
            function_name: &call.function_name,
            inputs: &call.inputs,
            fee: call.fee,
        };

        match self.backend.execute(&call.account, program_call).await {
            Ok(transaction_id) => {
                info!(
                    "Transaction {} broadcast for {}",
                    transaction_id, call.function_name
                );
                Ok(TransactionOutcome {
                    transaction_id,
                    function_name: call.function_name,
                })
            }
            Err(e) => {
                warn!("Execution of {} failed: {}", call.function_name, e);
                Err(ExecutionError::ExecutionFailed(e.to_string()))
            }
        }
    }

    fn validate(&self, request: ExecutionRequest) -> Result<ValidatedCall, ExecutionError> {
        let ExecutionRequest {
            private_key,
            function_name,
            inputs,
            fee,
        } = request;

        let mut missing = Vec::new();
        if private_key.trim().is_empty() {
            missing.push("privateKeyString");
        }
        if function_name.trim().is_empty() {
            missing.push("functionName");
        }
        if inputs.is_empty() {
            missing.push("inputs");
        }
        if !missing.is_empty() {
            return Err(ExecutionError::InvalidRequest(format!(
                "missing required parameters: {}",
                missing.join(", ")
            )));
        }

        let fee = match fee {
            Some(fee) => fee.parse()?,
            None => self.default_fee,
        };

        let function_name = function_name.trim().to_string();
        if !is_identifier(&function_name) {
            return Err(ExecutionError::InvalidRequest(format!(
                "`{function_name}` is not a valid function name"
            )));
        }

        let inputs = Literal::parse_all(&inputs).map_err(|(index, e)| {
            ExecutionError::InvalidRequest(format!("input {index}: {e}"))
        })?;

        let account = Keypair::from_private_key(private_key.trim())
            .map_err(|e| ExecutionError::InvalidRequest(format!("invalid private key: {e}")))?;

        Ok(ValidatedCall {
            account,
            function_name,
            inputs,
            fee,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records every call and answers with a fixed result
    struct StubBackend {
        calls: AtomicUsize,
        last: Mutex<Option<(String, Vec<String>, u64, String)>>,
        fail_with: Option<String>,
    }

    impl StubBackend {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
                fail_with: None,
            }
        }

        fn failing(reason: &str) -> Self {
            Self {
                fail_with: Some(reason.to_string()),
                ..Self::ok()
            }
        }
    }

    impl ProofBackend for StubBackend {
        async fn execute(
            &self,
            account: &Keypair,
            call: ProgramCall<'_>,
        ) -> Result<TransactionId, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some((
                call.function_name.to_string(),
                call.inputs.iter().map(|l| l.to_string()).collect(),
                call.fee.microcredits(),
                account.address().to_string(),
            ));
            match &self.fail_with {
                Some(reason) => Err(BackendError::Proving(reason.clone())),
                None => Ok(TransactionId::from("at1xyz")),
            }
        }
    }

    fn executor(backend: StubBackend) -> TransactionExecutor<StubBackend> {
        TransactionExecutor::new(
            backend,
            "private_donation.aleo".parse().unwrap(),
            Fee::from_credits(0.1).unwrap(),
        )
    }

    fn request(function_name: &str, inputs: &[&str], fee: Option<FeeInput>) -> ExecutionRequest {
        let key = Keypair::from_seed(&[3u8; 32]);
        ExecutionRequest {
            private_key: key.private_key(),
            function_name: function_name.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            fee,
        }
    }

    #[tokio::test]
    async fn test_execute_success() {
        let exec = executor(StubBackend::ok());
        let outcome = exec
            .execute(request("mint_tokens", &["100u64"], Some(FeeInput::Credits(1.0))))
            .await
            .unwrap();

        assert_eq!(outcome.transaction_id.as_str(), "at1xyz");
        assert_eq!(outcome.function_name, "mint_tokens");

        let last = exec.backend().last.lock().unwrap().clone().unwrap();
        assert_eq!(last.0, "mint_tokens");
        assert_eq!(last.1, vec!["100u64"]);
        assert_eq!(last.2, 1_000_000);
        assert_eq!(last.3, Keypair::from_seed(&[3u8; 32]).address().to_string());
    }

    #[tokio::test]
    async fn test_missing_fee_uses_default() {
        let exec = executor(StubBackend::ok());
        exec.execute(request("donate", &["5u64"], None)).await.unwrap();
        let last = exec.backend().last.lock().unwrap().clone().unwrap();
        assert_eq!(last.2, 100_000);
    }

    #[tokio::test]
    async fn test_empty_function_name_never_reaches_backend() {
        let exec = executor(StubBackend::ok());
        let err = exec.execute(request("", &["1u8"], None)).await.unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidRequest(_)));
        assert_eq!(exec.backend().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_inputs_never_reach_backend() {
        let exec = executor(StubBackend::ok());
        let err = exec.execute(request("donate", &[], None)).await.unwrap_err();
        assert!(err.to_string().contains("inputs"));
        assert_eq!(exec.backend().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_private_key() {
        let exec = executor(StubBackend::ok());
        let mut req = request("donate", &["1u8"], None);
        req.private_key = Zeroizing::new(String::new());
        let err = exec.execute(req).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid request: missing required parameters: privateKeyString"
        );
    }

    #[tokio::test]
    async fn test_invalid_fee() {
        let exec = executor(StubBackend::ok());
        let err = exec
            .execute(request(
                "donate",
                &["1u8"],
                Some(FeeInput::Text("not-a-number".into())),
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::InvalidFee(FeeError::NotANumber(_))
        ));

        let err = exec
            .execute(request("donate", &["1u8"], Some(FeeInput::Credits(-1.0))))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidFee(FeeError::Negative(_))));
        assert_eq!(exec.backend().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fee_checked_before_inputs() {
        let exec = executor(StubBackend::ok());
        let err = exec
            .execute(request("donate", &["nonsense"], Some(FeeInput::Credits(f64::NAN))))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidFee(FeeError::NotFinite)));
    }

    #[tokio::test]
    async fn test_oversized_fee_never_reaches_backend() {
        let exec = executor(StubBackend::ok());
        let err = exec
            .execute(request("donate", &["1u8"], Some(FeeInput::Credits(1e300))))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidFee(FeeError::TooLarge(_))));
        assert_eq!(exec.backend().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bad_literal_names_index() {
        let exec = executor(StubBackend::ok());
        let err = exec
            .execute(request("donate", &["1u8", "300u8"], None))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("invalid request: input 1:"));
        assert_eq!(exec.backend().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bad_function_name() {
        let exec = executor(StubBackend::ok());
        let err = exec
            .execute(request("mint-tokens", &["1u8"], None))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_bad_private_key() {
        let exec = executor(StubBackend::ok());
        let mut req = request("donate", &["1u8"], None);
        req.private_key = Zeroizing::new("APrivateKey1abc".into());
        let err = exec.execute(req).await.unwrap_err();
        assert!(err.to_string().contains("invalid private key"));
        assert_eq!(exec.backend().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wallet_generated_key_reaches_backend() {
        let exec = executor(StubBackend::ok());
        let mut req = request("donate", &["1u8"], None);
        req.private_key =
            Zeroizing::new("APrivateKey1zkp8CZNn3yeCseEtxuVPbDCwSyhGW6yZKUYKfgXmcpoGPWH".into());
        exec.execute(req).await.unwrap();
        assert_eq!(exec.backend().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backend_failure_passes_reason_through() {
        let exec = executor(StubBackend::failing("proof rejected: bad witness"));
        let err = exec
            .execute(request("donate", &["1u8"], None))
            .await
            .unwrap_err();
        match err {
            ExecutionError::ExecutionFailed(reason) => {
                assert_eq!(reason, "proof rejected: bad witness")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_outcome_serializes_camel_case() {
        let outcome = TransactionOutcome {
            transaction_id: TransactionId::from("at1xyz"),
            function_name: "mint_tokens".into(),
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({"transactionId": "at1xyz", "functionName": "mint_tokens"})
        );
    }
}
