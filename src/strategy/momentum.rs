use serde::{Deserialize, Serialize};

use super::{closes, ensure_history, ModelFamily, Strategy, StrategySignal};
use crate::indicators::{calculate_rsi, calculate_sma};
use crate::models::Candle;
use crate::Result;

/// Momentum model
///
/// Scores trend persistence using:
/// - Short vs long moving average spread for trend direction
/// - RSI distance from 50 for momentum strength
/// - Volume expansion for confirmation
#[derive(Debug, Clone)]
pub struct MomentumStrategy {
    config: MomentumConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    pub rsi_period: usize,
    pub short_ma_period: usize,
    pub long_ma_period: usize,
    /// MA spread (fraction of price) at which the trend component saturates
    pub trend_scale: f64,
    /// Multiple of average volume that confirms the move
    pub volume_threshold: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            short_ma_period: 10,
            long_ma_period: 20,
            trend_scale: 0.02,
            volume_threshold: 1.5,
        }
    }
}

impl MomentumStrategy {
    pub fn new(config: MomentumConfig) -> Self {
        Self { config }
    }

    fn volume_ratio(candles: &[Candle], lookback: usize) -> f64 {
        let Some((current, history)) = candles.split_last() else {
            return 1.0;
        };
        let window: Vec<f64> = history.iter().rev().take(lookback).map(|c| c.volume).collect();
        if window.is_empty() {
            return 1.0;
        }
        let avg = window.iter().sum::<f64>() / window.len() as f64;
        if avg > 0.0 {
            current.volume / avg
        } else {
            1.0
        }
    }
}

impl Default for MomentumStrategy {
    fn default() -> Self {
        Self::new(MomentumConfig::default())
    }
}

impl Strategy for MomentumStrategy {
    fn evaluate(&self, candles: &[Candle]) -> Result<StrategySignal> {
        ensure_history(candles, self.min_candles_required())?;

        let prices = closes(candles);
        let (Some(short_ma), Some(long_ma), Some(rsi)) = (
            calculate_sma(&prices, self.config.short_ma_period),
            calculate_sma(&prices, self.config.long_ma_period),
            calculate_rsi(&prices, self.config.rsi_period),
        ) else {
            return Ok(StrategySignal::new(
                self.name(),
                self.family(),
                0.0,
                0.0,
                "indicators unavailable",
            ));
        };

        let spread = if long_ma > 0.0 {
            (short_ma - long_ma) / long_ma
        } else {
            0.0
        };
        let trend = (spread / self.config.trend_scale).clamp(-1.0, 1.0);
        let momentum = (rsi - 50.0) / 50.0;
        let score = 0.5 * trend + 0.5 * momentum;

        let agree = trend.signum() == momentum.signum() && trend != 0.0;
        let volume_ratio = Self::volume_ratio(candles, self.config.long_ma_period);
        let volume_confirmed = volume_ratio >= self.config.volume_threshold;

        let mut confidence = if agree { 0.7 } else { 0.4 };
        if volume_confirmed {
            confidence += 0.15;
        }

        tracing::debug!(
            "Momentum: short_ma={:.4} long_ma={:.4} spread={:.4}% rsi={:.1} volume_ratio={:.2}x score={:.3}",
            short_ma,
            long_ma,
            spread * 100.0,
            rsi,
            volume_ratio,
            score
        );

        Ok(StrategySignal::new(
            self.name(),
            self.family(),
            score,
            confidence,
            format!(
                "MA spread {:.2}%, RSI {:.1}, volume {:.2}x{}",
                spread * 100.0,
                rsi,
                volume_ratio,
                if volume_confirmed { " (confirmed)" } else { "" }
            ),
        ))
    }

    fn name(&self) -> &str {
        "momentum"
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::Momentum
    }

    fn min_candles_required(&self) -> usize {
        // Need enough data for longest indicator (long MA + buffer)
        self.config.long_ma_period.max(self.config.rsi_period + 1) + 5
    }
}
