/// Multi-timeframe trend alignment
///
/// Each horizon gets three indicator votes (EMA relationship, RSI zone and
/// ADX with directional movement). A horizon is directional when at least
/// two votes agree; the market is aligned when at least two horizons share
/// the same non-neutral direction.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::resample::resample;
use crate::indicators::{calculate_adx, calculate_ema, calculate_rsi};
use crate::models::{Candle, TradeDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Horizon {
    Higher,
    Medium,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

impl Bias {
    pub fn as_direction(&self) -> TradeDirection {
        match self {
            Bias::Bullish => TradeDirection::Buy,
            Bias::Bearish => TradeDirection::Sell,
            Bias::Neutral => TradeDirection::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeSignal {
    pub horizon: Horizon,
    pub direction: Bias,
    pub confidence: f64,
    pub indicators: BTreeMap<String, f64>,
}

impl TimeframeSignal {
    fn neutral(horizon: Horizon) -> Self {
        Self {
            horizon,
            direction: Bias::Neutral,
            confidence: 0.0,
            indicators: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeAnalysis {
    pub signals: Vec<TimeframeSignal>,
    pub aligned: bool,
    pub direction: Bias,
    pub confidence: f64,
}

impl TimeframeAnalysis {
    /// Combine per-horizon signals into an alignment verdict
    pub fn from_signals(signals: Vec<TimeframeSignal>, confidence_cap: f64) -> Self {
        let bullish = signals.iter().filter(|s| s.direction == Bias::Bullish).count();
        let bearish = signals.iter().filter(|s| s.direction == Bias::Bearish).count();

        let (direction, agreeing) = if bullish >= 2 {
            (Bias::Bullish, bullish)
        } else if bearish >= 2 {
            (Bias::Bearish, bearish)
        } else {
            (Bias::Neutral, 0)
        };

        let aligned = direction != Bias::Neutral;
        let confidence = if aligned {
            (agreeing as f64 / 3.0).min(confidence_cap)
        } else {
            0.0
        };

        Self {
            signals,
            aligned,
            direction,
            confidence,
        }
    }

    fn not_aligned() -> Self {
        Self::from_signals(
            vec![
                TimeframeSignal::neutral(Horizon::Higher),
                TimeframeSignal::neutral(Horizon::Medium),
                TimeframeSignal::neutral(Horizon::Lower),
            ],
            0.0,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeframeConfig {
    pub fast_ema_period: usize,
    pub slow_ema_period: usize,
    pub rsi_period: usize,
    pub rsi_bull: f64,
    pub rsi_bear: f64,
    pub adx_period: usize,
    pub adx_threshold: f64,
    /// Resample factor for the medium horizon (lower is the base series)
    pub medium_factor: usize,
    pub higher_factor: usize,
    pub confidence_cap: f64,
}

impl Default for TimeframeConfig {
    fn default() -> Self {
        Self {
            fast_ema_period: 9,
            slow_ema_period: 21,
            rsi_period: 14,
            rsi_bull: 55.0,
            rsi_bear: 45.0,
            adx_period: 14,
            adx_threshold: 20.0,
            medium_factor: 4,
            higher_factor: 16,
            confidence_cap: 0.9,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimeframeAligner {
    config: TimeframeConfig,
}

impl TimeframeAligner {
    pub fn new(config: TimeframeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TimeframeConfig {
        &self.config
    }

    /// Longest indicator lookback, in bars of a single horizon
    pub fn min_candles_per_horizon(&self) -> usize {
        self.config
            .slow_ema_period
            .max(self.config.rsi_period + 1)
            .max(2 * self.config.adx_period + 1)
    }

    /// Base candles needed so the higher horizon has a full lookback
    pub fn required_base_candles(&self) -> usize {
        self.min_candles_per_horizon() * self.config.higher_factor.max(self.config.medium_factor).max(1)
    }

    /// Analyze a single base series, resampling it for the slower horizons
    pub fn analyze(&self, candles: &[Candle]) -> TimeframeAnalysis {
        let medium = resample(candles, self.config.medium_factor);
        let higher = resample(candles, self.config.higher_factor);
        self.analyze_series(&higher, &medium, candles)
    }

    /// Analyze three independently supplied series
    pub fn analyze_series(
        &self,
        higher: &[Candle],
        medium: &[Candle],
        lower: &[Candle],
    ) -> TimeframeAnalysis {
        let need = self.min_candles_per_horizon();
        if higher.len() < need || medium.len() < need || lower.len() < need {
            tracing::debug!(
                higher = higher.len(),
                medium = medium.len(),
                lower = lower.len(),
                need,
                "Timeframe history too short, not aligned"
            );
            return TimeframeAnalysis::not_aligned();
        }

        let signals = vec![
            self.horizon_signal(Horizon::Higher, higher),
            self.horizon_signal(Horizon::Medium, medium),
            self.horizon_signal(Horizon::Lower, lower),
        ];

        TimeframeAnalysis::from_signals(signals, self.config.confidence_cap)
    }

    fn horizon_signal(&self, horizon: Horizon, candles: &[Candle]) -> TimeframeSignal {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let mut indicators = BTreeMap::new();
        let mut votes = Vec::with_capacity(3);

        if let (Some(fast), Some(slow)) = (
            calculate_ema(&closes, self.config.fast_ema_period),
            calculate_ema(&closes, self.config.slow_ema_period),
        ) {
            indicators.insert("ema_fast".to_string(), fast);
            indicators.insert("ema_slow".to_string(), slow);
            votes.push(if fast > slow {
                Bias::Bullish
            } else if fast < slow {
                Bias::Bearish
            } else {
                Bias::Neutral
            });
        }

        if let Some(rsi) = calculate_rsi(&closes, self.config.rsi_period) {
            indicators.insert("rsi".to_string(), rsi);
            votes.push(if rsi > self.config.rsi_bull {
                Bias::Bullish
            } else if rsi < self.config.rsi_bear {
                Bias::Bearish
            } else {
                Bias::Neutral
            });
        }

        if let Some(di) = calculate_adx(candles, self.config.adx_period) {
            indicators.insert("adx".to_string(), di.adx);
            indicators.insert("plus_di".to_string(), di.plus_di);
            indicators.insert("minus_di".to_string(), di.minus_di);
            votes.push(if !di.is_trending(self.config.adx_threshold) {
                Bias::Neutral
            } else if di.plus_di > di.minus_di {
                Bias::Bullish
            } else if di.minus_di > di.plus_di {
                Bias::Bearish
            } else {
                Bias::Neutral
            });
        }

        let bullish = votes.iter().filter(|v| **v == Bias::Bullish).count();
        let bearish = votes.iter().filter(|v| **v == Bias::Bearish).count();

        let (direction, agreeing) = if bullish >= 2 {
            (Bias::Bullish, bullish)
        } else if bearish >= 2 {
            (Bias::Bearish, bearish)
        } else {
            (Bias::Neutral, 0)
        };

        tracing::debug!(?horizon, ?direction, ?indicators, "Horizon evaluated");

        TimeframeSignal {
            horizon,
            direction,
            confidence: agreeing as f64 / 3.0,
            indicators,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_test_candles(n: usize, step: f64) -> Vec<Candle> {
        let start = Utc::now();
        (0..n)
            .map(|i| {
                let close = 1000.0 + step * i as f64;
                Candle {
                    symbol: "TEST".to_string(),
                    timestamp: start + chrono::Duration::minutes(i as i64 * 15),
                    open: close - step,
                    high: close + step.abs() * 0.2 + 0.1,
                    low: close - step.abs() * 1.2 - 0.1,
                    close,
                    volume: 1000.0,
                }
            })
            .collect()
    }

    fn signal(direction: Bias) -> TimeframeSignal {
        TimeframeSignal {
            horizon: Horizon::Lower,
            direction,
            confidence: 1.0,
            indicators: BTreeMap::new(),
        }
    }

    #[test]
    fn test_uptrend_aligns_bullish() {
        let aligner = TimeframeAligner::default();
        let candles = create_test_candles(aligner.required_base_candles(), 1.0);

        let analysis = aligner.analyze(&candles);
        assert!(analysis.aligned);
        assert_eq!(analysis.direction, Bias::Bullish);
        assert_eq!(analysis.signals.len(), 3);
        assert!((analysis.confidence - 0.9).abs() < 1e-9, "3/3 capped at 0.9");
    }

    #[test]
    fn test_downtrend_aligns_bearish() {
        let aligner = TimeframeAligner::default();
        let candles = create_test_candles(aligner.required_base_candles(), -1.0);

        let analysis = aligner.analyze(&candles);
        assert!(analysis.aligned);
        assert_eq!(analysis.direction, Bias::Bearish);
    }

    #[test]
    fn test_short_history_is_neutral() {
        let aligner = TimeframeAligner::default();
        let candles = create_test_candles(50, 1.0);

        let analysis = aligner.analyze(&candles);
        assert!(!analysis.aligned);
        assert_eq!(analysis.direction, Bias::Neutral);
        assert_eq!(analysis.confidence, 0.0);
    }

    #[test]
    fn test_two_of_three_aligns() {
        let analysis = TimeframeAnalysis::from_signals(
            vec![signal(Bias::Bearish), signal(Bias::Neutral), signal(Bias::Bearish)],
            0.9,
        );
        assert!(analysis.aligned);
        assert_eq!(analysis.direction, Bias::Bearish);
        assert!((analysis.confidence - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_split_horizons_not_aligned() {
        let analysis = TimeframeAnalysis::from_signals(
            vec![signal(Bias::Bullish), signal(Bias::Bearish), signal(Bias::Neutral)],
            0.9,
        );
        assert!(!analysis.aligned);
        assert_eq!(analysis.direction, Bias::Neutral);
    }

    #[test]
    fn test_indicator_values_recorded() {
        let aligner = TimeframeAligner::default();
        let candles = create_test_candles(aligner.required_base_candles(), 1.0);

        let analysis = aligner.analyze(&candles);
        let lower = &analysis.signals[2];
        assert_eq!(lower.horizon, Horizon::Lower);
        for key in ["adx", "ema_fast", "ema_slow", "minus_di", "plus_di", "rsi"] {
            assert!(lower.indicators.contains_key(key), "missing {}", key);
        }
    }
}
