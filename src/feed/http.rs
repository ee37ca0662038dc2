use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};

use super::MarketDataFeed;
use crate::models::{Candle, MarketSnapshot};
use crate::{Result, TradingError};

// Type alias for the rate limiter to simplify signatures
type FeedRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpFeedConfig {
    pub base_url: String,
    pub requests_per_minute: u32,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub timeout_secs: u64,
}

impl Default for HttpFeedConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            requests_per_minute: 120,
            max_retries: 3,
            initial_backoff_ms: 500,
            timeout_secs: 10,
        }
    }
}

/// JSON market data gateway client with rate limiting and retry
///
/// Endpoints:
/// - `GET {base}/snapshot/{symbol}`
/// - `GET {base}/candles/{symbol}?limit=N`
#[derive(Clone)]
pub struct HttpMarketFeed {
    client: Client,
    config: HttpFeedConfig,
    rate_limiter: Arc<FeedRateLimiter>,
}

#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    price: f64,
    volume: f64,
    #[serde(default)]
    spread: f64,
    #[serde(default)]
    volatility: f64,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CandleResponse {
    timestamp: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Outcome of one request attempt
enum Attempt {
    Done(reqwest::Response),
    Retry(String),
    Fatal(String),
}

impl HttpMarketFeed {
    pub fn new(config: HttpFeedConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TradingError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let rpm = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));

        Ok(Self {
            client,
            config: HttpFeedConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
            rate_limiter,
        })
    }

    async fn attempt(&self, url: &str) -> Attempt {
        self.rate_limiter.until_ready().await;

        match self.client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    Attempt::Done(response)
                } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    Attempt::Retry(format!("status {}", status))
                } else {
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    Attempt::Fatal(format!("status {}: {}", status, body))
                }
            }
            Err(e) => Attempt::Retry(format!("network error: {}", e)),
        }
    }

    /// Rate-limited GET with exponential backoff on 429, 5xx and network errors
    async fn get_with_retry(&self, symbol: &str, url: &str) -> Result<reqwest::Response> {
        let max_retries = self.config.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_retries {
            match self.attempt(url).await {
                Attempt::Done(response) => {
                    if attempt > 1 {
                        tracing::info!("Fetched {} after {} attempts", symbol, attempt);
                    }
                    return Ok(response);
                }
                Attempt::Fatal(reason) => return Err(TradingError::data_unavailable(symbol, reason)),
                Attempt::Retry(reason) => {
                    last_error = reason;
                    if attempt < max_retries {
                        let backoff_ms = self.config.initial_backoff_ms * 2_u64.pow(attempt - 1);
                        tracing::warn!(
                            "Attempt {}/{} failed for {}: {}. Retrying in {}ms...",
                            attempt,
                            max_retries,
                            symbol,
                            last_error,
                            backoff_ms
                        );
                        sleep(Duration::from_millis(backoff_ms)).await;
                    }
                }
            }
        }

        Err(TradingError::data_unavailable(
            symbol,
            format!("failed after {} attempts: {}", max_retries, last_error),
        ))
    }
}

#[async_trait]
impl MarketDataFeed for HttpMarketFeed {
    async fn get_snapshot(&self, symbol: &str) -> Result<MarketSnapshot> {
        let url = format!("{}/snapshot/{}", self.config.base_url, symbol);
        let response = self.get_with_retry(symbol, &url).await?;

        let body: SnapshotResponse = response
            .json()
            .await
            .map_err(|e| TradingError::data_unavailable(symbol, format!("invalid snapshot: {}", e)))?;

        if !(body.price.is_finite() && body.price > 0.0) {
            return Err(TradingError::data_unavailable(
                symbol,
                format!("invalid price {}", body.price),
            ));
        }

        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            price: body.price,
            volume: body.volume,
            spread: body.spread,
            volatility: body.volatility,
            timestamp: body.timestamp.unwrap_or_else(Utc::now),
        })
    }

    async fn get_candles(&self, symbol: &str, count: usize) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/candles/{}?limit={}",
            self.config.base_url, symbol, count
        );
        let response = self.get_with_retry(symbol, &url).await?;

        let body: Vec<CandleResponse> = response
            .json()
            .await
            .map_err(|e| TradingError::data_unavailable(symbol, format!("invalid candles: {}", e)))?;

        let mut candles: Vec<Candle> = body
            .into_iter()
            .map(|c| Candle {
                symbol: symbol.to_string(),
                timestamp: c.timestamp,
                open: c.open,
                high: c.high,
                low: c.low,
                close: c.close,
                volume: c.volume,
            })
            .collect();
        candles.sort_by_key(|c| c.timestamp);

        if candles.len() > count {
            candles.drain(..candles.len() - count);
        }

        tracing::debug!("Fetched {} candles for {}", candles.len(), symbol);

        Ok(candles)
    }
}
