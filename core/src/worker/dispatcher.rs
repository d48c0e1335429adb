//! Command Dispatcher
//!
//! Routes decoded requests to the account factory, executor and poller, and
//! turns every outcome (including every failure) into response messages.

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendError;

use shroud_transaction::{TransactionId, TxStatus};

use crate::account_factory::generate_account;
use crate::backend::ProofBackend;
use crate::gateway::LedgerGateway;
use crate::poller::PollState;

use super::context::WorkerContext;
use super::protocol::{Inbound, WorkerRequest, WorkerResponse};

/// Outbound channel to the presentation layer
pub type Outbound = mpsc::Sender<WorkerResponse>;

pub struct Dispatcher<B, G> {
    ctx: WorkerContext<B, G>,
}

impl<B: ProofBackend, G: LedgerGateway> Dispatcher<B, G> {
    pub fn new(ctx: WorkerContext<B, G>) -> Self {
        Self { ctx }
    }

    /// Handle one inbound message to completion.
    ///
    /// Per-request failures are reported as `error` messages; the only error
    /// returned is a closed outbound channel.
    pub async fn handle(
        &self,
        message: Inbound,
        outbound: &Outbound,
    ) -> Result<(), SendError<WorkerResponse>> {
        let request = match WorkerRequest::decode(message) {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejected message: {}", e);
                return outbound.send(WorkerResponse::error(e)).await;
            }
        };
        debug!("Handling {}", request.kind());

        match request {
            WorkerRequest::GenerateAccount => {
                let response = match generate_account() {
                    Ok(account) => WorkerResponse::AccountGenerated { result: account },
                    Err(e) => {
                        warn!("Account generation failed: {}", e);
                        WorkerResponse::error(e)
                    }
                };
                outbound.send(response).await
            }
            WorkerRequest::ExecuteTransaction(payload) => {
                match self.ctx.executor.execute(payload.into_request()).await {
                    Ok(outcome) => {
                        let id = outcome.transaction_id.clone();
                        outbound
                            .send(WorkerResponse::TransactionBroadcasted { result: outcome })
                            .await?;
                        if self.ctx.config.worker.track_after_broadcast {
                            self.track(id, outbound).await?;
                        }
                        Ok(())
                    }
                    Err(e) => outbound.send(WorkerResponse::error(e)).await,
                }
            }
            WorkerRequest::TrackTransaction(payload) => {
                self.track(payload.transaction_id, outbound).await
            }
        }
    }

    /// Emit `transaction_status_updated` for each intermediate state, then the
    /// terminal event. A finalized transaction is fetched in full first.
    async fn track(
        &self,
        id: TransactionId,
        outbound: &Outbound,
    ) -> Result<(), SendError<WorkerResponse>> {
        info!("Tracking transaction {}", id);
        let (tx, mut rx) = mpsc::channel::<PollState>(16);

        let poll = async {
            let last = self.ctx.poller.run(&id, Some(&tx)).await;
            drop(tx);
            last
        };
        let forward = async {
            while let Some(state) = rx.recv().await {
                outbound
                    .send(WorkerResponse::TransactionStatusUpdated { result: state })
                    .await?;
            }
            Ok::<(), SendError<WorkerResponse>>(())
        };

        let (last, forwarded) = tokio::join!(poll, forward);
        forwarded?;

        let transaction = match last.status {
            TxStatus::Finalized => self.ctx.poller.fetch_transaction(&id).await,
            _ => None,
        };
        outbound.send(WorkerResponse::terminal(last, transaction)).await
    }
}
