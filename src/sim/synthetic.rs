use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::feed::MarketDataFeed;
use crate::models::{Candle, MarketSnapshot};
use crate::{Result, TradingError};

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketScenario {
    /// Steady uptrend, noise small relative to drift
    Uptrend,
    /// Steady downtrend, noise small relative to drift
    Downtrend,
    /// Mean-reverting chop around the base price
    Sideways,
    /// ±5% swings per candle
    Volatile,
    /// Rapid decline, for drawdown and breaker tests
    Crash,
}

#[derive(Debug)]
struct Series {
    scenario: MarketScenario,
    base_price: f64,
    price: f64,
    start: DateTime<Utc>,
    candles: Vec<Candle>,
}

/// Seeded random-walk market feed for paper trading.
///
/// Each symbol has its own scenario. `get_candles` backfills history on
/// demand; `get_snapshot` advances the symbol by one candle.
pub struct SyntheticFeed {
    rng: Mutex<StdRng>,
    series: Mutex<HashMap<String, Series>>,
    interval_minutes: i64,
    base_volume: f64,
    /// Quoted spread as a fraction of price
    spread_pct: f64,
}

impl SyntheticFeed {
    /// Create a new feed with a seed for reproducibility
    pub fn new(seed: u64, interval_minutes: i64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            series: Mutex::new(HashMap::new()),
            interval_minutes: interval_minutes.max(1),
            base_volume: 1_000_000.0,
            spread_pct: 0.0005,
        }
    }

    pub fn with_symbol(self, symbol: &str, scenario: MarketScenario, base_price: f64) -> Self {
        self.add_symbol(symbol, scenario, base_price);
        self
    }

    pub fn add_symbol(&self, symbol: &str, scenario: MarketScenario, base_price: f64) {
        let mut series = match self.series.lock() {
            Ok(series) => series,
            Err(poisoned) => poisoned.into_inner(),
        };
        series.insert(
            symbol.to_string(),
            Series {
                scenario,
                base_price,
                price: base_price,
                start: Utc::now(),
                candles: Vec::new(),
            },
        );
    }

    pub fn symbols(&self) -> Vec<String> {
        self.series
            .lock()
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Next close for a scenario
    fn step(rng: &mut StdRng, scenario: MarketScenario, price: f64, base: f64) -> f64 {
        let next = match scenario {
            MarketScenario::Uptrend => price * (1.0 + 0.002 + rng.gen_range(-0.001..0.001)),
            MarketScenario::Downtrend => price * (1.0 - 0.002 + rng.gen_range(-0.001..0.001)),
            MarketScenario::Sideways => {
                // 10% pull to mean
                let reversion = (base - price) * 0.1;
                price + reversion + price * rng.gen_range(-0.01..0.01)
            }
            MarketScenario::Volatile => {
                (price * (1.0 + rng.gen_range(-0.05..0.05))).max(base * 0.5)
            }
            MarketScenario::Crash => price * (1.0 - 0.01 + rng.gen_range(-0.005..0.005)),
        };
        next.max(f64::EPSILON)
    }

    /// Helper to create a candle from price and timestamp
    fn create_candle(
        rng: &mut StdRng,
        symbol: &str,
        price: f64,
        timestamp: DateTime<Utc>,
        base_volume: f64,
    ) -> Candle {
        // ±0.2% intrabar movement
        let noise_pct = 0.002;

        let high = price * (1.0 + rng.gen_range(0.0..noise_pct));
        let low = price * (1.0 - rng.gen_range(0.0..noise_pct));

        let open = (price * (1.0 + rng.gen_range(-noise_pct..noise_pct))).clamp(low, high);

        // Vary volume ±30%
        let volume = base_volume * rng.gen_range(0.7..1.3);

        Candle {
            symbol: symbol.to_string(),
            timestamp,
            open,
            high,
            low,
            close: price,
            volume,
        }
    }

    fn advance(&self, rng: &mut StdRng, symbol: &str, series: &mut Series) {
        series.price = Self::step(rng, series.scenario, series.price, series.base_price);
        let timestamp = series.start
            + Duration::minutes(series.candles.len() as i64 * self.interval_minutes);
        series.candles.push(Self::create_candle(
            rng,
            symbol,
            series.price,
            timestamp,
            self.base_volume,
        ));
    }

    /// Run `f` with the symbol's series, generating at least `min_len` candles first
    fn with_series<T>(
        &self,
        symbol: &str,
        min_len: usize,
        f: impl FnOnce(&mut StdRng, &mut Series) -> T,
    ) -> Result<T> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| TradingError::data_unavailable(symbol, "synthetic rng poisoned"))?;
        let mut all = self
            .series
            .lock()
            .map_err(|_| TradingError::data_unavailable(symbol, "synthetic feed poisoned"))?;
        let series = all
            .get_mut(symbol)
            .ok_or_else(|| TradingError::data_unavailable(symbol, "unknown symbol"))?;

        if series.candles.len() < min_len {
            // Backfill: shift the start so the newest candle stays near now
            let missing = min_len - series.candles.len();
            series.start -= Duration::minutes(missing as i64 * self.interval_minutes);
            while series.candles.len() < min_len {
                self.advance(&mut *rng, symbol, series);
            }
        }

        Ok(f(&mut *rng, series))
    }
}

#[async_trait]
impl MarketDataFeed for SyntheticFeed {
    async fn get_snapshot(&self, symbol: &str) -> Result<MarketSnapshot> {
        let spread_pct = self.spread_pct;
        self.with_series(symbol, 1, |rng, series| {
            self.advance(rng, symbol, series);

            let n = series.candles.len();
            let last = &series.candles[n - 1];
            let volatility = if n >= 2 {
                let prev = series.candles[n - 2].close;
                ((last.close - prev) / prev).abs()
            } else {
                0.0
            };

            MarketSnapshot {
                symbol: symbol.to_string(),
                price: last.close,
                volume: last.volume,
                spread: last.close * spread_pct,
                volatility,
                timestamp: last.timestamp,
            }
        })
    }

    async fn get_candles(&self, symbol: &str, count: usize) -> Result<Vec<Candle>> {
        self.with_series(symbol, count, |_, series| {
            let n = series.candles.len();
            series.candles[n - count.min(n)..].to_vec()
        })
    }
}
