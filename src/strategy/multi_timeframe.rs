use super::{ensure_history, ModelFamily, Strategy, StrategySignal};
use crate::models::Candle;
use crate::timeframe::{Bias, TimeframeAligner};
use crate::Result;

/// Multi-timeframe model: the aligner's verdict expressed as a signal
#[derive(Debug, Clone, Default)]
pub struct MultiTimeframeStrategy {
    aligner: TimeframeAligner,
}

impl MultiTimeframeStrategy {
    pub fn new(aligner: TimeframeAligner) -> Self {
        Self { aligner }
    }
}

impl Strategy for MultiTimeframeStrategy {
    fn evaluate(&self, candles: &[Candle]) -> Result<StrategySignal> {
        ensure_history(candles, self.min_candles_required())?;

        let analysis = self.aligner.analyze(candles);
        let sign = match analysis.direction {
            Bias::Bullish => 1.0,
            Bias::Bearish => -1.0,
            Bias::Neutral => 0.0,
        };

        let horizons: Vec<String> = analysis
            .signals
            .iter()
            .map(|s| format!("{:?}={:?}", s.horizon, s.direction).to_lowercase())
            .collect();

        Ok(StrategySignal::new(
            self.name(),
            self.family(),
            sign * analysis.confidence,
            analysis.confidence,
            format!(
                "{} ({})",
                if analysis.aligned { "aligned" } else { "not aligned" },
                horizons.join(", ")
            ),
        ))
    }

    fn name(&self) -> &str {
        "multi_timeframe"
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::MultiTimeframe
    }

    fn min_candles_required(&self) -> usize {
        self.aligner.required_base_candles()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_test_candles(n: usize, step: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 1000.0 + step * i as f64;
                Candle {
                    symbol: "TEST".to_string(),
                    timestamp: Utc::now() + chrono::Duration::minutes(i as i64 * 15),
                    open: close - step,
                    high: close + 0.3,
                    low: close - 1.3,
                    close,
                    volume: 1000.0,
                }
            })
            .collect()
    }

    #[test]
    fn test_aligned_uptrend_scores_positive() {
        let strategy = MultiTimeframeStrategy::default();
        let candles = create_test_candles(strategy.min_candles_required(), 1.0);

        let signal = strategy.evaluate(&candles).unwrap();
        assert!((signal.score - 0.9).abs() < 1e-9);
        assert!(signal.rationale.starts_with("aligned"));
        assert!(signal.rationale.contains("higher=bullish"));
    }

    #[test]
    fn test_requires_full_higher_horizon() {
        let strategy = MultiTimeframeStrategy::default();
        let candles = create_test_candles(100, 1.0);

        assert!(strategy.evaluate(&candles).is_err());
    }
}
