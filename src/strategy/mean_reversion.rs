use serde::{Deserialize, Serialize};

use super::{closes, ensure_history, ModelFamily, Strategy, StrategySignal};
use crate::indicators::{calculate_rsi, calculate_sma, calculate_std_dev};
use crate::models::Candle;
use crate::Result;

/// Mean reversion model
///
/// Fades stretched moves away from the moving average, in both directions.
///
/// Scoring inputs:
/// - z-score of price against the MA (stretch)
/// - RSI in the extreme zone on the same side (confirmation)
/// - Volume spike (capitulation)
/// - Momentum slowing; an accelerating move is a falling knife and abstains
#[derive(Debug, Clone)]
pub struct MeanReversionStrategy {
    config: MeanReversionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanReversionConfig {
    /// Moving average period for mean calculation
    pub ma_period: usize,

    /// z-score at which the stretch component saturates
    pub z_entry: f64,

    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,

    /// Volume multiplier to confirm panic (e.g. 2.0 = 2x average volume)
    pub volume_multiplier: f64,
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        Self {
            ma_period: 20,
            z_entry: 2.0,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            volume_multiplier: 2.0,
        }
    }
}

impl MeanReversionStrategy {
    pub fn new(config: MeanReversionConfig) -> Self {
        Self { config }
    }

    fn abstain(&self, reason: &str) -> StrategySignal {
        StrategySignal::new(self.name(), self.family(), 0.0, 0.0, reason)
    }
}

impl Default for MeanReversionStrategy {
    fn default() -> Self {
        Self::new(MeanReversionConfig::default())
    }
}

impl Strategy for MeanReversionStrategy {
    fn evaluate(&self, candles: &[Candle]) -> Result<StrategySignal> {
        ensure_history(candles, self.min_candles_required())?;

        let prices = closes(candles);
        let n = prices.len();
        let current_price = prices[n - 1];

        let (Some(ma), Some(std_dev), Some(rsi)) = (
            calculate_sma(&prices, self.config.ma_period),
            calculate_std_dev(&prices, self.config.ma_period),
            calculate_rsi(&prices, self.config.rsi_period),
        ) else {
            return Ok(self.abstain("indicators unavailable"));
        };

        if std_dev <= 0.0 {
            return Ok(self.abstain("no dispersion around the mean"));
        }

        let z = (current_price - ma) / std_dev;
        // Positive stretch = below the mean = long bias
        let stretch = (-z / self.config.z_entry).clamp(-1.0, 1.0);

        let current_change = prices[n - 1] - prices[n - 2];
        let previous_change = prices[n - 2] - prices[n - 3];
        let momentum_slowing = if stretch > 0.0 {
            current_change > previous_change
        } else {
            current_change < previous_change
        };

        if !momentum_slowing {
            tracing::debug!(
                "Mean Reversion: z={:.2} but move still accelerating ({:.4} vs {:.4}), abstaining",
                z,
                current_change,
                previous_change
            );
            return Ok(self.abstain("move still accelerating"));
        }

        let rsi_confirms = (stretch > 0.0 && rsi < self.config.rsi_oversold)
            || (stretch < 0.0 && rsi > self.config.rsi_overbought);

        // Average volume over the MA window, excluding the current candle
        let history: Vec<f64> = candles[..n - 1]
            .iter()
            .rev()
            .take(self.config.ma_period)
            .map(|c| c.volume)
            .collect();
        let avg_volume = history.iter().sum::<f64>() / history.len().max(1) as f64;
        let volume_ratio = if avg_volume > 0.0 {
            candles[n - 1].volume / avg_volume
        } else {
            1.0
        };
        let volume_spike = volume_ratio > self.config.volume_multiplier;

        let score = if rsi_confirms { stretch } else { stretch * 0.5 };
        let mut confidence = 0.6;
        if rsi_confirms {
            confidence += 0.2;
        }
        if volume_spike {
            confidence += 0.2;
        }

        tracing::debug!(
            "Mean Reversion: price={:.4} ma={:.4} z={:.2} rsi={:.1} volume_ratio={:.2}x score={:.3}",
            current_price,
            ma,
            z,
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
                "z-score {:.2} vs MA {:.4}, RSI {:.1}, volume {:.2}x",
                z, ma, rsi, volume_ratio
            ),
        ))
    }

    fn name(&self) -> &str {
        "mean_reversion"
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::MeanReversion
    }

    fn min_candles_required(&self) -> usize {
        // Need MA period + RSI period + a few extra for momentum check
        self.config.ma_period.max(self.config.rsi_period + 1) + 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_test_candles(prices: Vec<f64>, volumes: Vec<f64>) -> Vec<Candle> {
        let num_prices = prices.len();
        prices
            .into_iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (price, volume))| Candle {
                symbol: "TEST".to_string(),
                timestamp: Utc::now() - chrono::Duration::hours((num_prices - i) as i64),
                open: price,
                high: price * 1.01,
                low: price * 0.99,
                close: price,
                volume,
            })
            .collect()
    }

    #[test]
    fn test_mean_reversion_requires_minimum_candles() {
        let strategy = MeanReversionStrategy::default();
        let candles = create_test_candles(vec![100.0; 10], vec![1000.0; 10]);

        assert!(strategy.evaluate(&candles).is_err());
    }

    #[test]
    fn test_flat_market_abstains() {
        let strategy = MeanReversionStrategy::default();
        let candles = create_test_candles(vec![100.0; 30], vec![1000.0; 30]);

        let signal = strategy.evaluate(&candles).unwrap();
        assert_eq!(signal.score, 0.0);
    }

    #[test]
    fn test_buy_on_extreme_dip() {
        let strategy = MeanReversionStrategy::default();

        // Drop with slowing momentum and rising volume
        let mut prices = vec![100.0; 20];
        prices.extend(vec![95.0, 90.0, 87.0, 85.0]);

        let mut volumes = vec![1000.0; 20];
        volumes.extend(vec![1500.0, 2000.0, 2500.0, 3000.0]);

        let signal = strategy
            .evaluate(&create_test_candles(prices, volumes))
            .unwrap();
        assert!(signal.score > 0.9, "score {}", signal.score);
        assert!((signal.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sell_on_blow_off_top() {
        let strategy = MeanReversionStrategy::default();

        let mut prices = vec![100.0; 20];
        prices.extend(vec![105.0, 110.0, 113.0, 115.0]);
        let volumes = vec![1000.0; 24];

        let signal = strategy
            .evaluate(&create_test_candles(prices, volumes))
            .unwrap();
        assert!(signal.score < -0.9);
        assert!((signal.confidence - 0.8).abs() < 1e-9, "no volume spike");
    }

    #[test]
    fn test_falling_knife_abstains() {
        let strategy = MeanReversionStrategy::default();

        // Accelerating drops
        let mut prices = vec![100.0; 20];
        prices.extend(vec![95.0, 88.0, 78.0, 65.0]);

        let signal = strategy
            .evaluate(&create_test_candles(prices, vec![3000.0; 24]))
            .unwrap();
        assert_eq!(signal.score, 0.0);
    }

    #[test]
    fn test_steady_trend_abstains() {
        let strategy = MeanReversionStrategy::default();
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();

        let signal = strategy
            .evaluate(&create_test_candles(prices, vec![1000.0; 30]))
            .unwrap();
        assert_eq!(signal.score, 0.0);
    }
}
