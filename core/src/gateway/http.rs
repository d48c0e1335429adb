//! HTTP ledger gateway client

use std::time::Duration;

use log::{debug, warn};
use reqwest::StatusCode;
use serde_json::Value;

use shroud_config::GatewayConfig;
use shroud_transaction::TransactionId;

use super::{ExecutionEnvelope, GatewayError, LedgerGateway, StatusReply};

/// reqwest-backed [`LedgerGateway`]
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    /// Create a client for `base_url` (e.g. "https://api.explorer.provable.com/v1/testnet")
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { base_url, client })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Self::new(config.url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl LedgerGateway for HttpGateway {
    async fn submit(&self, envelope: &ExecutionEnvelope) -> Result<TransactionId, GatewayError> {
        let url = format!("{}/execute", self.base_url);
        debug!(
            "Submitting {}/{} to {}",
            envelope.body.program_id, envelope.body.function_name, url
        );

        let response = self.client.post(&url).json(envelope).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!("Gateway rejected execution ({}): {}", status, body);
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        parse_transaction_id(&body)
    }

    async fn get_status(&self, id: &TransactionId) -> Result<StatusReply, GatewayError> {
        let url = format!("{}/transaction/{}/status", self.base_url, id);

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            // not indexed yet
            return Ok(StatusReply::Unknown);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(parse_status_body(&body))
    }

    async fn get_transaction(&self, id: &TransactionId) -> Result<Value, GatewayError> {
        let url = format!("{}/transaction/{}", self.base_url, id);
        debug!("Fetching transaction {}", id);

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| GatewayError::Decode(format!("transaction {id} is not JSON: {e}")))
    }
}

/// Accepts `{"transactionId": ".."}`, a JSON string, or a bare id.
fn parse_transaction_id(body: &str) -> Result<TransactionId, GatewayError> {
    let body = body.trim();

    let id = match serde_json::from_str::<Value>(body) {
        Ok(Value::String(id)) => Some(id),
        Ok(Value::Object(map)) => ["transactionId", "transaction_id", "id"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        Ok(_) => None,
        Err(_) if !body.is_empty() && !body.contains(char::is_whitespace) => {
            Some(body.to_string())
        }
        Err(_) => None,
    };

    match id {
        Some(id) if !id.trim().is_empty() => Ok(TransactionId::new(id.trim())),
        _ => Err(GatewayError::Decode(format!(
            "no transaction id in response: {body}"
        ))),
    }
}

/// Accepts `{"status": ".."}`, a JSON string, or a bare token.
fn parse_status_body(body: &str) -> StatusReply {
    let body = body.trim();

    match serde_json::from_str::<Value>(body) {
        Ok(Value::String(token)) => StatusReply::Token(token),
        Ok(Value::Object(map)) => map
            .get("status")
            .and_then(Value::as_str)
            .map(|token| StatusReply::Token(token.to_string()))
            .unwrap_or(StatusReply::Unknown),
        Ok(_) => StatusReply::Unknown,
        Err(_) if !body.is_empty() => StatusReply::Token(body.to_string()),
        Err(_) => StatusReply::Unknown,
    }
}
