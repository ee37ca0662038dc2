// Alpha model module
// Every model scores the same candle window; the ensemble decides.
pub mod carry;
pub mod cycle;
pub mod mean_reversion;
pub mod momentum;
pub mod multi_timeframe;

pub use carry::{CarryConfig, CarryStrategy};
pub use cycle::{CycleConfig, CycleStrategy};
pub use mean_reversion::{MeanReversionConfig, MeanReversionStrategy};
pub use momentum::{MomentumConfig, MomentumStrategy};
pub use multi_timeframe::MultiTimeframeStrategy;

use serde::{Deserialize, Serialize};

use crate::models::{Candle, TradeDirection};
use crate::{Result, TradingError};

/// Model families grouped by the ensemble for consensus voting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Momentum,
    MeanReversion,
    Cycle,
    Carry,
    MultiTimeframe,
}

/// Output of a single alpha model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySignal {
    pub model: String,
    pub family: ModelFamily,
    /// Directional score in [-1, 1]; positive is bullish
    pub score: f64,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub rationale: String,
}

impl StrategySignal {
    /// Build a signal, clamping score and confidence into range.
    /// Non-finite inputs collapse to a neutral, zero-confidence signal.
    pub fn new(
        model: impl Into<String>,
        family: ModelFamily,
        score: f64,
        confidence: f64,
        rationale: impl Into<String>,
    ) -> Self {
        let (score, confidence) = if score.is_finite() && confidence.is_finite() {
            (score.clamp(-1.0, 1.0), confidence.clamp(0.0, 1.0))
        } else {
            (0.0, 0.0)
        };

        Self {
            model: model.into(),
            family,
            score,
            confidence,
            rationale: rationale.into(),
        }
    }

    /// Threshold the score into a directional vote
    pub fn vote(&self, threshold: f64) -> TradeDirection {
        if self.score >= threshold && self.score > 0.0 {
            TradeDirection::Buy
        } else if self.score <= -threshold && self.score < 0.0 {
            TradeDirection::Sell
        } else {
            TradeDirection::None
        }
    }
}

/// Base trait for all alpha models
pub trait Strategy: Send + Sync {
    /// Score the candle window (most recent last)
    fn evaluate(&self, candles: &[Candle]) -> Result<StrategySignal>;

    /// Get model name
    fn name(&self) -> &str;

    fn family(&self) -> ModelFamily;

    /// Minimum candles required for this model
    fn min_candles_required(&self) -> usize;
}

/// Shared history guard used by every model
pub(crate) fn ensure_history(candles: &[Candle], need: usize) -> Result<()> {
    if candles.len() < need {
        let symbol = candles
            .first()
            .map(|c| c.symbol.clone())
            .unwrap_or_default();
        return Err(TradingError::InsufficientHistory {
            symbol,
            have: candles.len(),
            need,
        });
    }
    Ok(())
}

pub(crate) fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}
