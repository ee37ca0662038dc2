use crate::models::Candle;

/// Aggregate candles into buckets of `factor` consecutive bars.
///
/// Buckets are aligned to the most recent candle so the newest bar is always
/// complete; a partial bucket at the oldest end is dropped.
pub fn resample(candles: &[Candle], factor: usize) -> Vec<Candle> {
    if factor <= 1 {
        return candles.to_vec();
    }

    let skip = candles.len() % factor;
    candles[skip..]
        .chunks_exact(factor)
        .filter_map(merge_bucket)
        .collect()
}

fn merge_bucket(bucket: &[Candle]) -> Option<Candle> {
    let first = bucket.first()?;
    let last = bucket.last()?;

    Some(Candle {
        symbol: first.symbol.clone(),
        timestamp: first.timestamp,
        open: first.open,
        high: bucket.iter().map(|c| c.high).fold(f64::MIN, f64::max),
        low: bucket.iter().map(|c| c.low).fold(f64::MAX, f64::min),
        close: last.close,
        volume: bucket.iter().map(|c| c.volume).sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn create_test_candles(closes: &[f64]) -> Vec<Candle> {
        let start = Utc::now();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                symbol: "TEST".to_string(),
                timestamp: start + chrono::Duration::minutes(i as i64 * 15),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn test_resample_factor_one_is_identity() {
        let candles = create_test_candles(&[1.0, 2.0, 3.0]);
        assert_eq!(resample(&candles, 1), candles);
    }

    #[test]
    fn test_resample_merges_ohlcv() {
        let candles = create_test_candles(&[10.0, 12.0, 11.0, 13.0]);
        let merged = resample(&candles, 4);

        assert_eq!(merged.len(), 1);
        let bar = &merged[0];
        assert_eq!(bar.open, 9.5);
        assert_eq!(bar.high, 14.0);
        assert_eq!(bar.low, 9.0);
        assert_eq!(bar.close, 13.0);
        assert_eq!(bar.volume, 40.0);
        assert_eq!(bar.timestamp, candles[0].timestamp);
    }

    #[test]
    fn test_resample_drops_oldest_partial_bucket() {
        let candles = create_test_candles(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let merged = resample(&candles, 4);

        // [1, 2] dropped, [3..=6] kept so the newest bar is complete
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].close, 6.0);
        assert_eq!(merged[0].open, 2.5);
    }
}
