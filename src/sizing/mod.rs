// Position sizing module (fractional Kelly)
pub mod kelly;
pub mod win_rate;

pub use kelly::{kelly_fraction, reward_risk};
pub use win_rate::WinRateTracker;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::regime::MarketRegime;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Fraction of full Kelly to bet (0.5 = half Kelly)
    pub kelly_safety_fraction: f64,
    /// Hard cap on any single position, as a fraction of balance
    pub max_position_pct: f64,
    pub min_notional_usd: f64,
    /// Weight of the historical win rate when blending with model confidence
    pub history_weight: f64,
    pub min_history_trades: usize,
    pub win_rate_window: usize,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            kelly_safety_fraction: 0.5,
            max_position_pct: 0.15,
            min_notional_usd: 10.0,
            history_weight: 0.7,
            min_history_trades: 10,
            win_rate_window: 50,
        }
    }
}

/// Inputs to a single sizing decision
#[derive(Debug, Clone)]
pub struct SizingRequest {
    pub symbol: String,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub confidence: f64,
    pub balance_usd: f64,
    pub regime: MarketRegime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingResult {
    pub notional_usd: f64,
    pub quantity: f64,
    /// Fraction of balance actually committed, after safety, regime and cap
    pub kelly_fraction: f64,
    pub rationale: String,
}

impl SizingResult {
    pub fn zero(rationale: impl Into<String>) -> Self {
        Self {
            notional_usd: 0.0,
            quantity: 0.0,
            kelly_fraction: 0.0,
            rationale: rationale.into(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.quantity <= 0.0 || self.notional_usd <= 0.0
    }
}

/// Fractional Kelly position sizer
pub struct PositionSizer {
    config: SizingConfig,
    tracker: Arc<WinRateTracker>,
}

impl PositionSizer {
    pub fn new(config: SizingConfig, tracker: Arc<WinRateTracker>) -> Self {
        Self { config, tracker }
    }

    pub fn config(&self) -> &SizingConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<WinRateTracker> {
        &self.tracker
    }

    /// Blend historical win rate with model confidence once enough trades exist
    pub fn estimate_win_probability(&self, confidence: f64) -> f64 {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        match self.tracker.win_rate() {
            Some(rate) if self.tracker.len() >= self.config.min_history_trades => {
                self.config.history_weight * rate + (1.0 - self.config.history_weight) * confidence
            }
            _ => confidence,
        }
    }

    pub fn size(&self, request: &SizingRequest) -> SizingResult {
        let p = self.estimate_win_probability(request.confidence);
        self.size_with_probability(request, p)
    }

    /// Size with an explicit win probability
    pub fn size_with_probability(&self, request: &SizingRequest, p: f64) -> SizingResult {
        if !(request.entry_price.is_finite() && request.entry_price > 0.0)
            || !(request.balance_usd.is_finite() && request.balance_usd > 0.0)
        {
            return SizingResult::zero("invalid price or balance");
        }

        let Some(b) = reward_risk(request.entry_price, request.stop_loss, request.take_profit)
        else {
            return SizingResult::zero("stop and target do not bracket entry");
        };

        let raw = kelly_fraction(p, b);
        if raw.is_nan() || raw <= 0.0 {
            return SizingResult::zero(format!(
                "no edge: kelly {:.4} (p={:.3}, b={:.2})",
                raw, p, b
            ));
        }

        let regime_multiplier = request.regime.size_multiplier();
        let fraction = (raw * self.config.kelly_safety_fraction * regime_multiplier)
            .clamp(0.0, self.config.max_position_pct);

        if fraction.is_nan() || fraction <= 0.0 {
            return SizingResult::zero(format!("regime {} allows no size", request.regime));
        }

        let notional_usd = fraction * request.balance_usd;
        if notional_usd < self.config.min_notional_usd {
            return SizingResult::zero(format!(
                "notional ${:.2} below minimum ${:.2}",
                notional_usd, self.config.min_notional_usd
            ));
        }

        let quantity = notional_usd / request.entry_price;

        tracing::debug!(
            symbol = %request.symbol,
            p,
            b,
            raw_kelly = raw,
            fraction,
            notional_usd,
            "Position sized"
        );

        SizingResult {
            notional_usd,
            quantity,
            kelly_fraction: fraction,
            rationale: format!(
                "kelly {:.4} (p={:.3}, b={:.2}) x {:.2} safety x {:.2} regime -> {:.4} of ${:.2}",
                raw,
                p,
                b,
                self.config.kelly_safety_fraction,
                regime_multiplier,
                fraction,
                request.balance_usd
            ),
        }
    }

    /// Feed a realized outcome into the shared win-rate tracker
    pub fn record_outcome(&self, pnl: f64) {
        self.tracker.record(pnl);
    }
}
