//! Proof/broadcast backend
//!
//! The executor hands a validated call to a [`ProofBackend`], which produces
//! the transaction and broadcasts it. Proving itself is delegated to the
//! gateway; locally the backend authorises the call by signing it with the
//! owner's key.

use std::future::Future;
use std::sync::Arc;

use log::{debug, info};
use thiserror::Error;

use shroud_address::Address;
use shroud_keypair::Keypair;
use shroud_transaction::{Fee, Literal, ProgramId, TransactionId};

use crate::gateway::{ExecutionEnvelope, GatewayError, LedgerGateway, UnsignedExecution};

/// Failure inside the backend. The message is surfaced to the client as-is.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0}")]
    Proving(String),

    #[error(transparent)]
    Broadcast(#[from] GatewayError),
}

/// One program function call
#[derive(Debug, Clone, Copy)]
pub struct ProgramCall<'a> {
    pub program_id: &'a ProgramId,
    pub function_name: &'a str,
    pub inputs: &'a [Literal],
    pub fee: Fee,
}

/// Produces and broadcasts a transaction for a program call
pub trait ProofBackend: Send + Sync + 'static {
    fn execute(
        &self,
        account: &Keypair,
        call: ProgramCall<'_>,
    ) -> impl Future<Output = Result<TransactionId, BackendError>> + Send;
}

/// Backend that signs an [`ExecutionEnvelope`] and submits it through a gateway
pub struct GatewayProofBackend<G> {
    gateway: Arc<G>,
}

impl<G: LedgerGateway> GatewayProofBackend<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }
}

impl<G: LedgerGateway> ProofBackend for GatewayProofBackend<G> {
    async fn execute(
        &self,
        account: &Keypair,
        call: ProgramCall<'_>,
    ) -> Result<TransactionId, BackendError> {
        let client = ScopedClient::new(account);
        let envelope = client.authorize(&call)?;
        debug!(
            "Authorized {}/{} for {} ({} inputs)",
            call.program_id,
            call.function_name,
            client.owner,
            call.inputs.len()
        );

        let id = self.gateway.submit(&envelope).await?;
        info!("Broadcast {}/{} as {}", call.program_id, call.function_name, id);
        Ok(id)
    }
}

/// Signing context bound to one account; private state is resolved against `owner`.
struct ScopedClient<'a> {
    account: &'a Keypair,
    owner: Address,
}

impl<'a> ScopedClient<'a> {
    fn new(account: &'a Keypair) -> Self {
        Self {
            account,
            owner: account.address(),
        }
    }

    fn authorize(&self, call: &ProgramCall<'_>) -> Result<ExecutionEnvelope, BackendError> {
        let body = UnsignedExecution {
            program_id: call.program_id.to_string(),
            function_name: call.function_name.to_string(),
            inputs: call.inputs.iter().map(|l| l.as_str().to_string()).collect(),
            fee_microcredits: call.fee.microcredits(),
            owner: self.owner.to_string(),
        };

        let message = body
            .signing_bytes()
            .map_err(|e| BackendError::Proving(e.to_string()))?;
        let signature = self.account.sign(&message);

        Ok(ExecutionEnvelope {
            body,
            signer_pubkey: hex::encode(self.account.signer_pubkey()),
            signature: hex::encode(signature),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::StatusReply;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGateway {
        submitted: Mutex<Vec<ExecutionEnvelope>>,
    }

    impl LedgerGateway for RecordingGateway {
        async fn submit(&self, envelope: &ExecutionEnvelope) -> Result<TransactionId, GatewayError> {
            self.submitted.lock().unwrap().push(envelope.clone());
            Ok(TransactionId::from("at1recorded"))
        }

        async fn get_status(&self, _id: &TransactionId) -> Result<StatusReply, GatewayError> {
            Ok(StatusReply::Unknown)
        }

        async fn get_transaction(&self, _id: &TransactionId) -> Result<serde_json::Value, GatewayError> {
            Ok(serde_json::Value::Null)
        }
    }

    struct FailingGateway;

    impl LedgerGateway for FailingGateway {
        async fn submit(&self, _envelope: &ExecutionEnvelope) -> Result<TransactionId, GatewayError> {
            Err(GatewayError::Http {
                status: 400,
                body: "insufficient fee".into(),
            })
        }

        async fn get_status(&self, _id: &TransactionId) -> Result<StatusReply, GatewayError> {
            Ok(StatusReply::Unknown)
        }

        async fn get_transaction(&self, _id: &TransactionId) -> Result<serde_json::Value, GatewayError> {
            Ok(serde_json::Value::Null)
        }
    }

    fn call<'a>(program: &'a ProgramId, inputs: &'a [Literal]) -> ProgramCall<'a> {
        ProgramCall {
            program_id: program,
            function_name: "donate",
            inputs,
            fee: Fee::from_credits(0.25).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_envelope_is_signed_by_owner() {
        let gateway = Arc::new(RecordingGateway::default());
        let backend = GatewayProofBackend::new(gateway.clone());
        let account = Keypair::from_seed(&[9u8; 32]);
        let program: ProgramId = "private_donation.aleo".parse().unwrap();
        let inputs = vec!["5u64".parse::<Literal>().unwrap(), "true".parse().unwrap()];

        let id = backend.execute(&account, call(&program, &inputs)).await.unwrap();
        assert_eq!(id.as_str(), "at1recorded");

        let submitted = gateway.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        let envelope = &submitted[0];
        assert_eq!(envelope.body.program_id, "private_donation.aleo");
        assert_eq!(envelope.body.inputs, vec!["5u64", "true"]);
        assert_eq!(envelope.body.fee_microcredits, 250_000);
        assert_eq!(envelope.body.owner, account.address().to_string());

        let pubkey: [u8; 32] = hex::decode(&envelope.signer_pubkey).unwrap().try_into().unwrap();
        let sig: [u8; 64] = hex::decode(&envelope.signature).unwrap().try_into().unwrap();
        let key = VerifyingKey::from_bytes(&pubkey).unwrap();
        key.verify(
            &envelope.body.signing_bytes().unwrap(),
            &Signature::from_bytes(&sig),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_gateway_rejection_passes_through() {
        let backend = GatewayProofBackend::new(Arc::new(FailingGateway));
        let account = Keypair::from_seed(&[1u8; 32]);
        let program: ProgramId = "private_donation.aleo".parse().unwrap();
        let inputs = vec!["1u8".parse::<Literal>().unwrap()];

        let err = backend
            .execute(&account, call(&program, &inputs))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "gateway returned 400: insufficient fee");
    }
}
