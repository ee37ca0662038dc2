use async_trait::async_trait;
use reqwest::Client;

use crate::models::{Decision, Fill};
use crate::{Result, TradingError};

/// Order submission collaborator.
///
/// Implementations must treat `Decision::idempotency_key` as the dedupe key:
/// resubmitting the same key must never produce a second order.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    async fn submit(&self, decision: &Decision) -> Result<Fill>;
}

/// Submits decisions to an HTTP execution gateway
#[derive(Clone)]
pub struct HttpExecutionClient {
    client: Client,
    base_url: String,
}

impl HttpExecutionClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TradingError::ExecutionFailure(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ExecutionClient for HttpExecutionClient {
    async fn submit(&self, decision: &Decision) -> Result<Fill> {
        let url = format!("{}/orders", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Idempotency-Key", &decision.idempotency_key)
            .json(decision)
            .send()
            .await
            .map_err(|e| TradingError::ExecutionFailure(format!("submit failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TradingError::ExecutionFailure(format!(
                "gateway rejected order ({}): {}",
                status, body
            )));
        }

        let fill: Fill = response
            .json()
            .await
            .map_err(|e| TradingError::ExecutionFailure(format!("invalid fill: {}", e)))?;

        tracing::info!(
            symbol = %decision.symbol,
            action = ?decision.action,
            price = fill.price,
            quantity = fill.quantity,
            "Order filled"
        );

        Ok(fill)
    }
}
