/// Calculate Simple Moving Average (SMA) of the most recent `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Calculate Exponential Moving Average (EMA), seeded with the first SMA
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let initial_sma = calculate_sma(&prices[..period], period)?;

    Some(
        prices[period..]
            .iter()
            .fold(initial_sma, |ema, price| (price - ema) * multiplier + ema),
    )
}

/// Population standard deviation of the most recent `period` prices
pub fn calculate_std_dev(prices: &[f64], period: usize) -> Option<f64> {
    let mean = calculate_sma(prices, period)?;
    let variance = prices
        .iter()
        .rev()
        .take(period)
        .map(|p| (p - mean).powi(2))
        .sum::<f64>()
        / period as f64;

    Some(variance.sqrt())
}

/// Rate of change over `period` bars, as a fraction
pub fn calculate_roc(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let current = prices[prices.len() - 1];
    let past = prices[prices.len() - 1 - period];
    if past == 0.0 {
        return None;
    }

    Some((current - past) / past)
}
