//! Worker service
//!
//! Runs the dispatcher on a dedicated task. The presentation layer talks to it
//! only through two ordered channels:
//!
//! ```text
//!   presentation ── Inbound ──────────▶ ┌──────────────┐
//!                                       │ worker task  │── Dispatcher
//!   presentation ◀── WorkerResponse ─── └──────────────┘
//! ```
//!
//! Requests are handled one at a time in arrival order; later requests wait in
//! the inbound queue.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::backend::ProofBackend;
use crate::gateway::LedgerGateway;

use super::context::WorkerContext;
use super::dispatcher::Dispatcher;
use super::protocol::{Inbound, WorkerResponse};

pub struct WorkerService;

impl WorkerService {
    /// Spawn the worker task. Emits `worker_loaded` once before the first request.
    pub fn start<B: ProofBackend, G: LedgerGateway>(
        ctx: WorkerContext<B, G>,
    ) -> (WorkerHandle, mpsc::Receiver<WorkerResponse>) {
        let capacity = ctx.config.worker.channel_capacity.max(1);
        let (inbound_tx, mut inbound_rx) = mpsc::channel::<Inbound>(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel::<WorkerResponse>(capacity);

        let dispatcher = Arc::new(Dispatcher::new(ctx));

        let task = tokio::spawn(async move {
            if outbound_tx.send(WorkerResponse::WorkerLoaded).await.is_err() {
                return;
            }
            info!("Worker loaded");

            while let Some(message) = inbound_rx.recv().await {
                let dispatcher = dispatcher.clone();
                let outbound = outbound_tx.clone();
                // Own task per request so a panic becomes an error message.
                let request = AbortOnDrop(tokio::spawn(async move {
                    dispatcher.handle(message, &outbound).await
                }));

                match request.join().await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => {
                        warn!("Presentation channel closed, stopping worker");
                        return;
                    }
                    Err(e) => {
                        error!("Request handler crashed: {}", e);
                        let crashed = WorkerResponse::error("internal worker error");
                        if outbound_tx.send(crashed).await.is_err() {
                            return;
                        }
                    }
                }
            }

            info!("Worker inbound channel closed, shutting down");
        });

        (
            WorkerHandle {
                inbound: inbound_tx,
                task,
            },
            outbound_rx,
        )
    }
}

/// Aborts the wrapped task when dropped, so terminating the worker also
/// abandons the request in flight.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> AbortOnDrop<T> {
    async fn join(mut self) -> Result<T, tokio::task::JoinError> {
        (&mut self.0).await
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Presentation-side handle to a running worker
pub struct WorkerHandle {
    inbound: mpsc::Sender<Inbound>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Queue a message for the worker.
    pub async fn post(&self, message: impl Into<Inbound>) -> Result<()> {
        self.inbound
            .send(message.into())
            .await
            .context("worker unavailable")
    }

    /// Stop the worker immediately. In-flight work is abandoned and no further
    /// messages are emitted.
    pub fn terminate(self) {
        info!("Terminating worker");
        self.task.abort();
    }

    /// Stop accepting messages and wait for queued ones to be answered.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.inbound);
        self.task.await.context("worker crashed")
    }
}
