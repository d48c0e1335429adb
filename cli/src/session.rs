//! In-process worker session
//!
//! Starts the worker against the configured gateway, sends a single request
//! and prints responses until that request is done.

use anyhow::{Context, Result};
use log::debug;
use serde_json::Value;

use shroud_config::ShroudConfig;
use shroud_core::FailureReason;
use shroud_core::worker::{HttpWorkerContext, WorkerResponse, WorkerService};

/// How responses are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Output {
    #[default]
    Human,
    /// One protocol message per line, as the stdio worker writes them
    Json,
}

/// Run `request` to completion. Returns false if it ended in an error or a
/// failed transaction.
pub async fn run(
    config: ShroudConfig,
    request: Value,
    done: impl Fn(&WorkerResponse) -> bool,
    output: Output,
) -> Result<bool> {
    let ctx = HttpWorkerContext::from_config(config).context("Failed to start worker")?;
    let (worker, mut responses) = WorkerService::start(ctx);

    worker.post(request).await?;

    let mut ok = false;
    while let Some(response) = responses.recv().await {
        print_response(&response, output)?;
        if done(&response) {
            ok = !matches!(
                response,
                WorkerResponse::Error { .. } | WorkerResponse::TransactionFailed { .. }
            );
            break;
        }
    }

    worker.terminate();
    Ok(ok)
}

fn print_response(response: &WorkerResponse, output: Output) -> Result<()> {
    if output == Output::Json {
        println!("{}", serde_json::to_string(response)?);
        return Ok(());
    }

    match response {
        WorkerResponse::WorkerLoaded => debug!("worker loaded"),
        WorkerResponse::AccountGenerated { result } => {
            println!("🔑 Address: {}", result.address);
        }
        WorkerResponse::TransactionBroadcasted { result } => {
            println!(
                "📡 Broadcast {}: {}",
                result.function_name, result.transaction_id
            );
        }
        WorkerResponse::TransactionStatusUpdated { result } => {
            println!(
                "⏳ {} {} (attempt {})",
                result.transaction_id, result.status, result.attempts
            );
        }
        WorkerResponse::TransactionFinalized { result } => {
            println!(
                "✅ {} finalized after {} polls",
                result.state.transaction_id, result.state.attempts
            );
            if let Some(transaction) = &result.transaction {
                println!("{}", serde_json::to_string_pretty(transaction)?);
            }
        }
        WorkerResponse::TransactionFailed { result } => {
            let reason = match &result.reason {
                Some(FailureReason::PollTimeout) => "gave up waiting".to_string(),
                Some(FailureReason::TransportError(e)) => e.clone(),
                None => "ledger reported failure".to_string(),
            };
            println!("❌ {} {}: {}", result.transaction_id, result.status, reason);
        }
        WorkerResponse::Error { result } => {
            eprintln!("❌ Error: {}", result);
        }
    }
    Ok(())
}

/// Done once the transaction is broadcast (or rejected before that).
pub fn broadcast_done(response: &WorkerResponse) -> bool {
    matches!(
        response,
        WorkerResponse::TransactionBroadcasted { .. } | WorkerResponse::Error { .. }
    )
}

/// Done once tracking reaches a terminal event.
pub fn tracking_done(response: &WorkerResponse) -> bool {
    matches!(
        response,
        WorkerResponse::TransactionFinalized { .. }
            | WorkerResponse::TransactionFailed { .. }
            | WorkerResponse::Error { .. }
    )
}
