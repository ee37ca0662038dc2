use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::{closes, ensure_history, ModelFamily, Strategy, StrategySignal};
use crate::indicators::calculate_roc;
use crate::models::Candle;
use crate::Result;

/// Carry model
///
/// Scores the annualized rate differential earned by holding a symbol long
/// (funding, basis or interest). A trend running against the carry halves
/// the score. Symbols without a known differential abstain.
#[derive(Debug, Default)]
pub struct CarryStrategy {
    config: CarryConfig,
    differentials: RwLock<HashMap<String, f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CarryConfig {
    /// Annualized differential at which the score saturates (0.10 = 10%)
    pub saturation: f64,
    pub trend_period: usize,
    /// Seed differentials keyed by symbol
    pub differentials: HashMap<String, f64>,
}

impl Default for CarryConfig {
    fn default() -> Self {
        Self {
            saturation: 0.10,
            trend_period: 20,
            differentials: HashMap::new(),
        }
    }
}

impl CarryStrategy {
    pub fn new(config: CarryConfig) -> Self {
        let differentials = RwLock::new(config.differentials.clone());
        Self {
            config,
            differentials,
        }
    }

    /// Update the differential for a symbol (e.g. after a funding print)
    pub fn set_differential(&self, symbol: &str, annualized: f64) {
        if let Ok(mut rates) = self.differentials.write() {
            rates.insert(symbol.to_string(), annualized);
        }
    }

    pub fn differential(&self, symbol: &str) -> Option<f64> {
        self.differentials
            .read()
            .ok()
            .and_then(|rates| rates.get(symbol).copied())
    }
}

impl Strategy for CarryStrategy {
    fn evaluate(&self, candles: &[Candle]) -> Result<StrategySignal> {
        ensure_history(candles, self.min_candles_required())?;

        let symbol = &candles[candles.len() - 1].symbol;
        let Some(differential) = self.differential(symbol).filter(|d| d.is_finite()) else {
            return Ok(StrategySignal::new(
                self.name(),
                self.family(),
                0.0,
                0.0,
                format!("no carry data for {}", symbol),
            ));
        };

        let mut score = (differential / self.config.saturation).clamp(-1.0, 1.0);
        let mut confidence = 0.5 + 0.3 * score.abs();

        let trend = calculate_roc(&closes(candles), self.config.trend_period).unwrap_or(0.0);
        let against_trend = trend != 0.0 && trend.signum() != score.signum();
        if against_trend {
            score *= 0.5;
            confidence *= 0.5;
        }

        tracing::debug!(
            symbol = %symbol,
            differential,
            trend,
            score,
            "Carry evaluated"
        );

        Ok(StrategySignal::new(
            self.name(),
            self.family(),
            score,
            confidence,
            format!(
                "carry {:+.2}% annualized, trend {:+.2}%{}",
                differential * 100.0,
                trend * 100.0,
                if against_trend { " (against)" } else { "" }
            ),
        ))
    }

    fn name(&self) -> &str {
        "carry"
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::Carry
    }

    fn min_candles_required(&self) -> usize {
        self.config.trend_period + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_test_candles(symbol: &str, step: f64) -> Vec<Candle> {
        (0..25)
            .map(|i| {
                let price = 100.0 + step * i as f64;
                Candle {
                    symbol: symbol.to_string(),
                    timestamp: Utc::now() + chrono::Duration::hours(i as i64),
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume: 1.0,
                }
            })
            .collect()
    }

    #[test]
    fn test_unknown_symbol_abstains() {
        let strategy = CarryStrategy::default();
        let signal = strategy.evaluate(&create_test_candles("BTC", 1.0)).unwrap();

        assert_eq!(signal.score, 0.0);
        assert_eq!(signal.confidence, 0.0);
    }

    #[test]
    fn test_positive_carry_with_trend() {
        let strategy = CarryStrategy::default();
        strategy.set_differential("BTC", 0.15);

        let signal = strategy.evaluate(&create_test_candles("BTC", 1.0)).unwrap();
        assert_eq!(signal.score, 1.0);
        assert!((signal.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_carry_against_trend_is_halved() {
        let mut config = CarryConfig::default();
        config.differentials.insert("ETH".to_string(), -0.05);
        let strategy = CarryStrategy::new(config);

        let signal = strategy.evaluate(&create_test_candles("ETH", 1.0)).unwrap();
        assert!((signal.score + 0.25).abs() < 1e-9);
        assert!(signal.rationale.contains("against"));
    }
}
