/// Market Regime Classifier using normalized ATR + spread
///
/// Classifies current conditions to gate and scale trading:
/// - Off: spread too wide, trading unsafe
/// - Crisis: extreme volatility, never trade
/// - Volatile: elevated volatility, half size and wider stops
/// - Ranging: quiet market, full size and tighter stops
/// - Trending: everything else
use serde::{Deserialize, Serialize};

use crate::indicators::calculate_normalized_atr;
use crate::models::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketRegime {
    Crisis,
    Volatile,
    Ranging,
    Trending,
    Off,
}

impl MarketRegime {
    /// Multiplier applied to the Kelly fraction by the position sizer
    pub fn size_multiplier(&self) -> f64 {
        match self {
            MarketRegime::Crisis | MarketRegime::Off => 0.0,
            MarketRegime::Volatile => 0.5,
            MarketRegime::Ranging | MarketRegime::Trending => 1.0,
        }
    }

    /// Multiplier applied to the base stop distance
    pub fn stop_multiplier(&self) -> f64 {
        match self {
            MarketRegime::Crisis | MarketRegime::Off => 0.0,
            MarketRegime::Volatile => 1.5,
            MarketRegime::Ranging => 0.75,
            MarketRegime::Trending => 1.0,
        }
    }

    pub fn is_tradeable(&self) -> bool {
        !matches!(self, MarketRegime::Crisis | MarketRegime::Off)
    }
}

impl std::fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MarketRegime::Crisis => "crisis",
            MarketRegime::Volatile => "volatile",
            MarketRegime::Ranging => "ranging",
            MarketRegime::Trending => "trending",
            MarketRegime::Off => "off",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeState {
    pub state: MarketRegime,
    /// Normalized ATR (ATR / close)
    pub volatility: f64,
    pub confidence: f64,
}

impl RegimeState {
    /// Fail-closed default used whenever the inputs cannot be trusted
    pub fn unsafe_default() -> Self {
        Self {
            state: MarketRegime::Off,
            volatility: 0.0,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    pub atr_period: usize,
    /// Spread as a fraction of price at or above which trading is off
    pub max_spread_pct: f64,
    /// Normalized ATR below this is a ranging market
    pub low_volatility: f64,
    /// Normalized ATR at or above this is volatile
    pub high_volatility: f64,
    /// Normalized ATR at or above this is a crisis
    pub crisis_volatility: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            max_spread_pct: 0.005, // 50 bps
            low_volatility: 0.004,
            high_volatility: 0.025,
            crisis_volatility: 0.06,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegimeClassifier {
    config: RegimeConfig,
}

impl RegimeClassifier {
    pub fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    /// Minimum candles needed before a tradeable regime can be reported
    pub fn min_candles_required(&self) -> usize {
        self.config.atr_period + 1
    }

    /// Classify the current regime from recent candles and the live spread
    pub fn classify(&self, candles: &[Candle], spread: f64) -> RegimeState {
        if candles.len() < self.min_candles_required() {
            tracing::debug!(
                "Regime: {} candles < {} required, failing closed",
                candles.len(),
                self.min_candles_required()
            );
            return RegimeState::unsafe_default();
        }

        let price = match candles.last() {
            Some(c) if c.close.is_finite() && c.close > 0.0 => c.close,
            _ => return RegimeState::unsafe_default(),
        };

        if !spread.is_finite() || spread < 0.0 {
            return RegimeState::unsafe_default();
        }

        let volatility = match calculate_normalized_atr(candles, self.config.atr_period) {
            Some(v) => v,
            None => return RegimeState::unsafe_default(),
        };

        let coverage = (candles.len() as f64 / (2 * self.config.atr_period) as f64).min(1.0);
        let spread_pct = spread / price;

        // 1. Liquidity gate
        if spread_pct >= self.config.max_spread_pct {
            return RegimeState {
                state: MarketRegime::Off,
                volatility,
                confidence: coverage * margin(spread_pct, self.config.max_spread_pct),
            };
        }

        // 2-5. Volatility bands, highest first
        let (state, boundary) = if volatility >= self.config.crisis_volatility {
            (MarketRegime::Crisis, self.config.crisis_volatility)
        } else if volatility >= self.config.high_volatility {
            (MarketRegime::Volatile, self.nearest(volatility, &[
                self.config.high_volatility,
                self.config.crisis_volatility,
            ]))
        } else if volatility < self.config.low_volatility {
            (MarketRegime::Ranging, self.config.low_volatility)
        } else {
            (MarketRegime::Trending, self.nearest(volatility, &[
                self.config.low_volatility,
                self.config.high_volatility,
            ]))
        };

        let regime = RegimeState {
            state,
            volatility,
            confidence: coverage * margin(volatility, boundary),
        };

        tracing::debug!(
            regime = %regime.state,
            volatility = regime.volatility,
            spread_pct,
            confidence = regime.confidence,
            "Regime classified"
        );

        regime
    }

    fn nearest(&self, value: f64, boundaries: &[f64]) -> f64 {
        boundaries
            .iter()
            .copied()
            .min_by(|a, b| (value - a).abs().total_cmp(&(value - b).abs()))
            .unwrap_or(value)
    }
}

/// Confidence in [0.5, 1.0] that grows with distance from a class boundary
fn margin(value: f64, boundary: f64) -> f64 {
    if boundary <= 0.0 {
        return 0.5;
    }
    let distance = (value - boundary).abs() / boundary;
    0.5 + 0.5 * (distance * 2.0).min(1.0)
}
