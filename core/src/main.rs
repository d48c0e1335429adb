//! Shroud worker
//!
//! Runs the background worker over stdio: one JSON request per line on stdin,
//! one JSON response per line on stdout. Logs go to stderr.
//!
//! ```text
//!   stdin  ──lines──▶ WorkerHandle::post ──▶ worker task
//!   stdout ◀──lines── response writer   ◀── worker task
//! ```

use anyhow::{Context, Result};
use log::{error, info};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;

use shroud_config::ShroudConfig;
use shroud_core::worker::{HttpWorkerContext, WorkerResponse, WorkerService};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = ShroudConfig::load().context("Failed to load configuration")?;
    info!("Gateway: {}", config.gateway.url);
    info!("Program: {}", config.program.id);

    let ctx = HttpWorkerContext::from_config(config)
        .inspect_err(|e| error!("Startup failed: {}", e))?;
    let (worker, responses) = WorkerService::start(ctx);
    let writer = tokio::spawn(write_responses(responses));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) if line.trim().is_empty() => continue,
                    Some(line) => worker.post(line).await?,
                    None => {
                        info!("stdin closed, draining worker");
                        worker.shutdown().await?;
                        break;
                    }
                }
            }
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                worker.terminate();
                break;
            }
        }
    }

    writer.await.context("response writer crashed")??;
    Ok(())
}

async fn write_responses(mut responses: mpsc::Receiver<WorkerResponse>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(response) = responses.recv().await {
        let mut line = serde_json::to_vec(&response).context("Failed to encode response")?;
        line.push(b'\n');
        stdout.write_all(&line).await.context("Failed to write stdout")?;
        stdout.flush().await?;
    }
    Ok(())
}
