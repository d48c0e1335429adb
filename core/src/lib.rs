//! Shroud core
//!
//! Background execution of private program calls: validate a request, sign
//! and broadcast it through the ledger gateway, then follow the transaction
//! until it is finalized or fails.

pub mod account_factory;
pub mod backend;
pub mod executor;
pub mod gateway;
pub mod poller;
pub mod worker;

pub use account_factory::generate_account;
pub use backend::{BackendError, GatewayProofBackend, ProgramCall, ProofBackend};
pub use executor::{ExecutionError, ExecutionRequest, FeeInput, TransactionExecutor, TransactionOutcome};
pub use gateway::{GatewayError, HttpGateway, LedgerGateway, StatusReply};
pub use poller::{FailureReason, PollConfig, PollState, StatusPoller};
pub use worker::{WorkerContext, WorkerHandle, WorkerRequest, WorkerResponse, WorkerService};
