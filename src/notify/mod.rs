// Alert delivery module
// The engine never blocks on delivery: failures are logged and dropped.
use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;

use crate::models::{Alert, AlertPriority};
use crate::{Result, TradingError};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<()>;
}

/// Writes alerts to the tracing log
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        let symbol = alert.symbol.as_deref().unwrap_or("-");
        match alert.priority {
            AlertPriority::Critical | AlertPriority::High => tracing::error!(
                kind = ?alert.kind,
                symbol = %symbol,
                "🚨 {}: {}",
                alert.title,
                alert.message
            ),
            AlertPriority::Normal => tracing::info!(
                kind = ?alert.kind,
                symbol = %symbol,
                "{}: {}",
                alert.title,
                alert.message
            ),
            AlertPriority::Low => tracing::debug!(
                kind = ?alert.kind,
                symbol = %symbol,
                "{}: {}",
                alert.title,
                alert.message
            ),
        }
        Ok(())
    }
}

/// POSTs each alert as JSON to a webhook
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TradingError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(alert)
            .send()
            .await
            .map_err(|e| TradingError::Notification(format!("webhook send failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TradingError::Notification(format!(
                "webhook rejected alert ({})",
                status
            )));
        }
        Ok(())
    }
}

/// Forwards alerts into an mpsc channel (operator consoles, tests)
#[derive(Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Alert>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Alert>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        self.sender
            .send(alert.clone())
            .map_err(|_| TradingError::Notification("alert channel closed".to_string()))
    }
}

/// Fans an alert out to several notifiers; succeeds if any delivery does
pub struct FanoutNotifier {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        let mut last_error = None;
        let mut delivered = self.notifiers.is_empty();

        for notifier in &self.notifiers {
            match notifier.notify(alert).await {
                Ok(()) => delivered = true,
                Err(e) => {
                    tracing::warn!("Alert delivery failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        match (delivered, last_error) {
            (false, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }
}
