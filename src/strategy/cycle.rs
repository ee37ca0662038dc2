use serde::{Deserialize, Serialize};

use super::{closes, ensure_history, ModelFamily, Strategy, StrategySignal};
use crate::models::Candle;
use crate::Result;

/// Cycle model
///
/// Removes the linear trend from the last `period` closes and trades turning
/// points of the residual oscillator: a trough turning up is bullish, a peak
/// turning down is bearish. Anywhere else the model abstains.
#[derive(Debug, Clone, Default)]
pub struct CycleStrategy {
    config: CycleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    pub period: usize,
    /// Residual amplitude, as a fraction of price, below which there is no cycle
    pub min_amplitude_pct: f64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            period: 20,
            min_amplitude_pct: 0.002,
        }
    }
}

impl CycleStrategy {
    pub fn new(config: CycleConfig) -> Self {
        Self { config }
    }
}

/// Residuals of a least-squares line through `values`
pub(crate) fn detrend(values: &[f64]) -> Vec<f64> {
    let n = values.len() as f64;
    if values.len() < 2 {
        return vec![0.0; values.len()];
    }

    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;

    let (mut cov, mut var) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        cov += dx * (y - mean_y);
        var += dx * dx;
    }
    let slope = cov / var;
    let intercept = mean_y - slope * mean_x;

    values
        .iter()
        .enumerate()
        .map(|(i, y)| y - (intercept + slope * i as f64))
        .collect()
}

impl Strategy for CycleStrategy {
    fn evaluate(&self, candles: &[Candle]) -> Result<StrategySignal> {
        ensure_history(candles, self.min_candles_required())?;

        let prices = closes(candles);
        let window = &prices[prices.len() - self.config.period..];
        let price = window[window.len() - 1];
        let oscillator = detrend(window);

        let amplitude = oscillator.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if price <= 0.0 || amplitude / price < self.config.min_amplitude_pct {
            return Ok(StrategySignal::new(
                self.name(),
                self.family(),
                0.0,
                0.0,
                "no measurable cycle",
            ));
        }

        let last = oscillator[oscillator.len() - 1];
        let prev = oscillator[oscillator.len() - 2];
        let phase = last / amplitude;
        let slope = last - prev;

        let turning_up = phase < 0.0 && slope > 0.0;
        let turning_down = phase > 0.0 && slope < 0.0;

        let (score, confidence, label) = if turning_up || turning_down {
            (-phase, 0.5 + 0.5 * phase.abs(), if turning_up { "trough" } else { "peak" })
        } else {
            (0.0, 0.0, "mid-cycle")
        };

        tracing::debug!(
            "Cycle: phase={:.3} slope={:.4} amplitude={:.4} -> {}",
            phase,
            slope,
            amplitude,
            label
        );

        Ok(StrategySignal::new(
            self.name(),
            self.family(),
            score,
            confidence,
            format!("{} at phase {:.2} of a {:.4} swing", label, phase, amplitude),
        ))
    }

    fn name(&self) -> &str {
        "cycle"
    }

    fn family(&self) -> ModelFamily {
        ModelFamily::Cycle
    }

    fn min_candles_required(&self) -> usize {
        self.config.period.max(3)
    }
}
