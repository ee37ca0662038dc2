/// Average Directional Index (ADX) - Measures trend strength
///
/// ADX ranges from 0 to 100:
/// - ADX > 25: Strong trend (bull or bear)
/// - ADX < 20: Weak trend / ranging market
///
/// +DI > -DI indicates an uptrend, -DI > +DI a downtrend.
use super::atr::true_ranges;
use crate::models::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalIndex {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

impl DirectionalIndex {
    pub fn is_trending(&self, threshold: f64) -> bool {
        self.adx >= threshold
    }
}

/// Calculate ADX, +DI, and -DI
///
/// With fewer than `2 * period + 1` candles the latest DX stands in for ADX.
/// Returns None if insufficient data.
pub fn calculate_adx(candles: &[Candle], period: usize) -> Option<DirectionalIndex> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let ranges = true_ranges(candles);
    let (plus_dms, minus_dms): (Vec<f64>, Vec<f64>) = candles
        .windows(2)
        .map(|pair| {
            let up_move = pair[1].high - pair[0].high;
            let down_move = pair[0].low - pair[1].low;

            let plus_dm = if up_move > down_move && up_move > 0.0 {
                up_move
            } else {
                0.0
            };
            let minus_dm = if down_move > up_move && down_move > 0.0 {
                down_move
            } else {
                0.0
            };
            (plus_dm, minus_dm)
        })
        .unzip();

    let smoothed_tr = wilder_series(&ranges, period);
    let smoothed_plus = wilder_series(&plus_dms, period);
    let smoothed_minus = wilder_series(&minus_dms, period);

    let mut dx_series = Vec::with_capacity(smoothed_tr.len());
    let mut last_di = (0.0, 0.0);

    for ((tr, plus), minus) in smoothed_tr.iter().zip(&smoothed_plus).zip(&smoothed_minus) {
        let (plus_di, minus_di) = if *tr > 0.0 {
            (plus / tr * 100.0, minus / tr * 100.0)
        } else {
            (0.0, 0.0)
        };

        let di_sum = plus_di + minus_di;
        let dx = if di_sum > 0.0 {
            (plus_di - minus_di).abs() / di_sum * 100.0
        } else {
            0.0
        };

        dx_series.push(dx);
        last_di = (plus_di, minus_di);
    }

    let adx = if dx_series.len() >= period {
        *wilder_series(&dx_series, period).last()?
    } else {
        *dx_series.last()?
    };

    Some(DirectionalIndex {
        adx,
        plus_di: last_di.0,
        minus_di: last_di.1,
    })
}

/// Wilder's smoothing, returning every smoothed value from index `period - 1`
fn wilder_series(values: &[f64], period: usize) -> Vec<f64> {
    if values.len() < period {
        return Vec::new();
    }

    let mut smoothed = values[..period].iter().sum::<f64>() / period as f64;
    let mut series = vec![smoothed];

    for value in &values[period..] {
        smoothed = (smoothed * (period as f64 - 1.0) + value) / period as f64;
        series.push(smoothed);
    }

    series
}
