//! Status Poller
//!
//! Watches a broadcast transaction until the ledger reports a terminal status.
//!
//! ```text
//!   Submitted ──▶ Pending ──▶ Pending ──▶ ... ──▶ Finalized | Rejected | Failed
//!   (attempt 0)   (1)         (2)
//! ```
//!
//! Every tick is one `get_status` call followed by a fixed delay. Unknown
//! answers keep the transaction pending; a transport error ends polling at
//! once. Exhausting `max_attempts` or `timeout` ends it with
//! [`FailureReason::PollTimeout`].

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, sleep_until, timeout_at};
use tokio_stream::wrappers::ReceiverStream;

use shroud_config::PollerConfig;
use shroud_transaction::{TransactionId, TxStatus};

use crate::gateway::LedgerGateway;

/// Polling limits
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between two status queries
    pub interval: Duration,
    /// Give up after this many queries
    pub max_attempts: Option<u32>,
    /// Give up after this much wall-clock time
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: Some(120),
            timeout: None,
        }
    }
}

impl From<&PollerConfig> for PollConfig {
    fn from(config: &PollerConfig) -> Self {
        Self {
            interval: config.interval(),
            max_attempts: config.max_attempts,
            timeout: config.timeout(),
        }
    }
}

/// Why a transaction ended up `Failed` without the ledger saying so
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message")]
pub enum FailureReason {
    /// No terminal state within the allotted attempts or time
    PollTimeout,
    /// The gateway could not be reached
    TransportError(String),
}

/// One observation of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollState {
    pub transaction_id: TransactionId,
    pub status: TxStatus,
    /// Status queries made so far
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
}

impl PollState {
    fn new(transaction_id: &TransactionId, status: TxStatus, attempts: u32) -> Self {
        Self {
            transaction_id: transaction_id.clone(),
            status,
            attempts,
            reason: None,
        }
    }

    fn failed(transaction_id: &TransactionId, attempts: u32, reason: FailureReason) -> Self {
        Self {
            reason: Some(reason),
            ..Self::new(transaction_id, TxStatus::Failed, attempts)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

pub struct StatusPoller<G> {
    gateway: Arc<G>,
    config: PollConfig,
}

impl<G> Clone for StatusPoller<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            config: self.config.clone(),
        }
    }
}

impl<G: LedgerGateway> StatusPoller<G> {
    pub fn new(gateway: Arc<G>, config: PollConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Stream every state of `id`, ending with the terminal one.
    ///
    /// Dropping the stream stops the background polling task.
    pub fn track(&self, id: TransactionId) -> ReceiverStream<PollState> {
        let (tx, rx) = mpsc::channel(16);
        let poller = self.clone();
        tokio::spawn(async move {
            let last = poller.run(&id, Some(&tx)).await;
            // observer may already be gone
            let _ = tx.send(last).await;
        });
        ReceiverStream::new(rx)
    }

    /// Poll until `id` reaches a terminal state and return it.
    pub async fn wait_for_terminal(&self, id: &TransactionId) -> PollState {
        self.run(id, None).await
    }

    /// Core loop. Every non-terminal state is sent to `updates`; the terminal
    /// state is returned. Returns early with the latest state if the receiver
    /// of `updates` is dropped.
    pub async fn run(
        &self,
        id: &TransactionId,
        updates: Option<&mpsc::Sender<PollState>>,
    ) -> PollState {
        let deadline = self.config.timeout.map(|t| Instant::now() + t);
        let mut attempts: u32 = 0;

        let submitted = PollState::new(id, TxStatus::Submitted, attempts);
        if !emit(updates, &submitted).await {
            return submitted;
        }

        loop {
            attempts += 1;
            let query = self.gateway.get_status(id);
            let reply = match deadline {
                Some(deadline) => match timeout_at(deadline, query).await {
                    Ok(reply) => reply,
                    Err(_) => return self.timed_out(id, attempts),
                },
                None => query.await,
            };

            let status = match reply {
                Ok(reply) => reply.to_status(),
                Err(e) => {
                    warn!("Status query for {} failed: {}", id, e);
                    return PollState::failed(id, attempts, FailureReason::TransportError(e.to_string()));
                }
            };
            debug!("Transaction {} status {} (attempt {})", id, status, attempts);

            if status.is_terminal() {
                info!("Transaction {} reached {} after {} polls", id, status, attempts);
                return PollState::new(id, status, attempts);
            }

            let pending = PollState::new(id, TxStatus::Pending, attempts);
            if !emit(updates, &pending).await {
                return pending;
            }

            if self.config.max_attempts.is_some_and(|max| attempts >= max) {
                return self.timed_out(id, attempts);
            }

            match deadline {
                Some(deadline) if Instant::now() + self.config.interval >= deadline => {
                    sleep_until(deadline).await;
                    return self.timed_out(id, attempts);
                }
                _ => sleep(self.config.interval).await,
            }
        }
    }

    /// The full ledger record of a finalized transaction.
    ///
    /// A failed lookup does not change the outcome, so it is logged and dropped.
    pub async fn fetch_transaction(&self, id: &TransactionId) -> Option<Value> {
        match self.gateway.get_transaction(id).await {
            Ok(transaction) => Some(transaction),
            Err(e) => {
                warn!("Could not fetch finalized transaction {}: {}", id, e);
                None
            }
        }
    }

    fn timed_out(&self, id: &TransactionId, attempts: u32) -> PollState {
        warn!("Gave up on transaction {} after {} polls", id, attempts);
        PollState::failed(id, attempts, FailureReason::PollTimeout)
    }
}

/// Returns false once nobody is listening any more.
async fn emit(updates: Option<&mpsc::Sender<PollState>>, state: &PollState) -> bool {
    match updates {
        Some(tx) => tx.send(state.clone()).await.is_ok(),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ExecutionEnvelope, GatewayError, StatusReply};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_stream::StreamExt;

    /// Replays scripted replies, then repeats the last one
    struct ScriptedGateway {
        script: Mutex<VecDeque<Result<StatusReply, String>>>,
        fallback: Result<StatusReply, String>,
        polls: AtomicU32,
    }

    impl ScriptedGateway {
        fn new(script: Vec<Result<StatusReply, String>>, fallback: Result<StatusReply, String>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                fallback,
                polls: AtomicU32::new(0),
            })
        }

        fn pending_then(n: usize, last: &str) -> Arc<Self> {
            let mut script = vec![Ok(StatusReply::Token("pending".into())); n];
            script.push(Ok(StatusReply::Token(last.into())));
            Self::new(script, Ok(StatusReply::Token(last.into())))
        }
    }

    impl LedgerGateway for ScriptedGateway {
        async fn submit(&self, _envelope: &ExecutionEnvelope) -> Result<TransactionId, GatewayError> {
            Err(GatewayError::Decode("submit not scripted".into()))
        }

        async fn get_status(&self, _id: &TransactionId) -> Result<StatusReply, GatewayError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
                .map_err(GatewayError::Transport)
        }

        async fn get_transaction(&self, id: &TransactionId) -> Result<Value, GatewayError> {
            match id.as_str() {
                "at1missing" => Err(GatewayError::Http {
                    status: 404,
                    body: "not found".into(),
                }),
                id => Ok(serde_json::json!({ "id": id, "type": "execute" })),
            }
        }
    }

    fn fast(max_attempts: Option<u32>) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(1),
            max_attempts,
            timeout: None,
        }
    }

    #[tokio::test]
    async fn test_pending_then_finalized_polls_n_plus_one() {
        let gateway = ScriptedGateway::pending_then(4, "Finalized");
        let poller = StatusPoller::new(gateway.clone(), fast(None));

        let last = poller.wait_for_terminal(&"at1xyz".into()).await;
        assert_eq!(last.status, TxStatus::Finalized);
        assert_eq!(last.attempts, 5);
        assert_eq!(last.reason, None);
        assert_eq!(gateway.polls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_rejected_is_terminal() {
        let gateway = ScriptedGateway::pending_then(1, "rejected");
        let poller = StatusPoller::new(gateway.clone(), fast(None));
        let last = poller.wait_for_terminal(&"at1xyz".into()).await;
        assert_eq!(last.status, TxStatus::Rejected);
        assert_eq!(gateway.polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transport_error_fails_immediately() {
        let gateway = ScriptedGateway::new(vec![], Err("connection refused".into()));
        let poller = StatusPoller::new(gateway.clone(), fast(Some(50)));

        let last = poller.wait_for_terminal(&"at1xyz".into()).await;
        assert_eq!(last.status, TxStatus::Failed);
        assert_eq!(last.attempts, 1);
        assert!(matches!(last.reason, Some(FailureReason::TransportError(_))));
        assert_eq!(gateway.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_answers_stay_pending() {
        let gateway = ScriptedGateway::new(
            vec![
                Ok(StatusReply::Unknown),
                Ok(StatusReply::Token("in_mempool".into())),
            ],
            Ok(StatusReply::Token("accepted".into())),
        );
        let poller = StatusPoller::new(gateway.clone(), fast(None));
        let last = poller.wait_for_terminal(&"at1xyz".into()).await;
        assert_eq!(last.status, TxStatus::Finalized);
        assert_eq!(last.attempts, 3);
    }

    #[tokio::test]
    async fn test_max_attempts_times_out() {
        let gateway = ScriptedGateway::new(vec![], Ok(StatusReply::Token("pending".into())));
        let poller = StatusPoller::new(gateway.clone(), fast(Some(3)));

        let last = poller.wait_for_terminal(&"at1xyz".into()).await;
        assert_eq!(last.status, TxStatus::Failed);
        assert_eq!(last.reason, Some(FailureReason::PollTimeout));
        assert_eq!(last.attempts, 3);
        assert_eq!(gateway.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wall_clock_timeout() {
        let gateway = ScriptedGateway::new(vec![], Ok(StatusReply::Token("pending".into())));
        let config = PollConfig {
            interval: Duration::from_millis(20),
            max_attempts: None,
            timeout: Some(Duration::from_millis(50)),
        };
        let poller = StatusPoller::new(gateway.clone(), config);

        let last = poller.wait_for_terminal(&"at1xyz".into()).await;
        assert_eq!(last.reason, Some(FailureReason::PollTimeout));
        assert!(gateway.polls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_track_streams_every_state() {
        let gateway = ScriptedGateway::pending_then(2, "Finalized");
        let poller = StatusPoller::new(gateway, fast(None));

        let states: Vec<PollState> = poller.track("at1xyz".into()).collect().await;
        let statuses: Vec<TxStatus> = states.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![
                TxStatus::Submitted,
                TxStatus::Pending,
                TxStatus::Pending,
                TxStatus::Finalized
            ]
        );
        let attempts: Vec<u32> = states.iter().map(|s| s.attempts).collect();
        assert_eq!(attempts, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_dropping_stream_stops_polling() {
        let gateway = ScriptedGateway::new(vec![], Ok(StatusReply::Token("pending".into())));
        let poller = StatusPoller::new(gateway.clone(), fast(None));

        let mut stream = poller.track("at1xyz".into());
        assert_eq!(stream.next().await.unwrap().status, TxStatus::Submitted);
        drop(stream);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let polls = gateway.polls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(gateway.polls.load(Ordering::SeqCst), polls);
    }

    #[test]
    fn test_poll_state_json() {
        let state = PollState::failed(&"at1xyz".into(), 3, FailureReason::PollTimeout);
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            serde_json::json!({
                "transactionId": "at1xyz",
                "status": "Failed",
                "attempts": 3,
                "reason": {"kind": "PollTimeout"}
            })
        );

        let pending = PollState::new(&"at1xyz".into(), TxStatus::Pending, 1);
        assert!(serde_json::to_value(&pending).unwrap().get("reason").is_none());
    }

    #[tokio::test]
    async fn test_fetch_transaction() {
        let poller = StatusPoller::new(ScriptedGateway::pending_then(0, "Finalized"), fast(None));

        let transaction = poller.fetch_transaction(&"at1xyz".into()).await.unwrap();
        assert_eq!(transaction["id"], "at1xyz");

        assert!(poller.fetch_transaction(&"at1missing".into()).await.is_none());
    }
}
