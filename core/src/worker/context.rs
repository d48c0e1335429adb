//! Worker context, built once at startup and shared by every handler.

use std::sync::Arc;

use thiserror::Error;

use shroud_config::ShroudConfig;
use shroud_transaction::{Fee, FeeError, IdentifierError, ProgramId};

use crate::backend::{GatewayProofBackend, ProofBackend};
use crate::executor::TransactionExecutor;
use crate::gateway::{GatewayError, HttpGateway, LedgerGateway};
use crate::poller::{PollConfig, StatusPoller};

/// Failures that prevent the worker from starting
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid program id: {0}")]
    ProgramId(#[from] IdentifierError),

    #[error("invalid default fee: {0}")]
    DefaultFee(#[from] FeeError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

pub struct WorkerContext<B, G> {
    pub config: ShroudConfig,
    pub executor: TransactionExecutor<B>,
    pub poller: StatusPoller<G>,
}

/// Context wired to the real HTTP gateway
pub type HttpWorkerContext = WorkerContext<GatewayProofBackend<HttpGateway>, HttpGateway>;

impl<B: ProofBackend, G: LedgerGateway> WorkerContext<B, G> {
    /// Assemble a context from explicit collaborators.
    pub fn new(config: ShroudConfig, backend: B, gateway: Arc<G>) -> Result<Self, StartupError> {
        let program_id: ProgramId = config.program.id.parse()?;
        let default_fee = Fee::from_credits(config.program.default_fee)?;

        let executor = TransactionExecutor::new(backend, program_id, default_fee);
        let poller = StatusPoller::new(gateway, PollConfig::from(&config.poller));

        Ok(Self {
            config,
            executor,
            poller,
        })
    }
}

impl HttpWorkerContext {
    /// Build the HTTP gateway client and everything that depends on it.
    pub fn from_config(config: ShroudConfig) -> Result<Self, StartupError> {
        let gateway = Arc::new(HttpGateway::from_config(&config.gateway)?);
        let backend = GatewayProofBackend::new(gateway.clone());
        Self::new(config, backend, gateway)
    }
}
