use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::ExecutionClient;
use crate::models::{Decision, DecisionAction, Fill, Side};
use crate::{Result, TradingError};

/// Simulated broker for paper trading.
///
/// Fills at the reference price with seeded adverse slippage. Repeated
/// idempotency keys return the original fill.
pub struct PaperBroker {
    rng: Mutex<StdRng>,
    max_slippage_bps: f64,
    fills: Mutex<HashMap<String, Fill>>,
}

impl PaperBroker {
    pub fn new(seed: u64, max_slippage_bps: f64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            max_slippage_bps: max_slippage_bps.max(0.0),
            fills: Mutex::new(HashMap::new()),
        }
    }

    /// Number of distinct orders filled
    pub fn order_count(&self) -> usize {
        self.fills.lock().map(|f| f.len()).unwrap_or(0)
    }

    fn is_buy(decision: &Decision) -> bool {
        matches!(
            (decision.action, decision.side),
            (DecisionAction::Open, Side::Long) | (DecisionAction::Close, Side::Short)
        )
    }
}

#[async_trait]
impl ExecutionClient for PaperBroker {
    async fn submit(&self, decision: &Decision) -> Result<Fill> {
        if !(decision.reference_price.is_finite() && decision.reference_price > 0.0) {
            return Err(TradingError::ExecutionFailure(format!(
                "invalid reference price {} for {}",
                decision.reference_price, decision.symbol
            )));
        }

        let mut fills = self
            .fills
            .lock()
            .map_err(|_| TradingError::ExecutionFailure("paper broker poisoned".to_string()))?;

        if let Some(fill) = fills.get(&decision.idempotency_key) {
            tracing::debug!(key = %decision.idempotency_key, "Duplicate order, returning prior fill");
            return Ok(fill.clone());
        }

        let slippage = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| TradingError::ExecutionFailure("paper broker poisoned".to_string()))?;
            rng.gen_range(0.0..=self.max_slippage_bps) / 10_000.0
        };

        let price = if Self::is_buy(decision) {
            decision.reference_price * (1.0 + slippage)
        } else {
            decision.reference_price * (1.0 - slippage)
        };

        let fill = Fill {
            price,
            quantity: decision.size,
            filled_at: Utc::now(),
        };
        fills.insert(decision.idempotency_key.clone(), fill.clone());

        tracing::info!(
            "[PAPER] {:?} {:?} {} {:.6} @ ${:.4}",
            decision.action,
            decision.side,
            decision.symbol,
            decision.size,
            price
        );

        Ok(fill)
    }
}
