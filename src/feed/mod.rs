// Market data and account module
// Collaborator traits consumed by the engine, plus HTTP and paper adapters.
pub mod http;
pub mod ledger;

pub use http::{HttpFeedConfig, HttpMarketFeed};
pub use ledger::PaperLedger;

use async_trait::async_trait;

use crate::execution::Position;
use crate::models::{AccountState, Candle, MarketSnapshot};
use crate::Result;

/// Source of market observations
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    async fn get_snapshot(&self, symbol: &str) -> Result<MarketSnapshot>;

    /// Most recent `count` candles, oldest first
    async fn get_candles(&self, symbol: &str, count: usize) -> Result<Vec<Candle>>;
}

/// Account balances and realized results
#[async_trait]
pub trait AccountLedger: Send + Sync {
    async fn get_balance(&self) -> Result<f64>;

    async fn get_open_positions(&self) -> Result<Vec<Position>>;

    async fn get_daily_realized_pnl(&self) -> Result<f64>;

    /// Fraction below peak equity
    async fn get_drawdown_pct(&self) -> Result<f64>;

    async fn on_position_opened(&self, _position: &Position) -> Result<()> {
        Ok(())
    }

    async fn on_position_closed(&self, _position: &Position) -> Result<()> {
        Ok(())
    }

    /// Read the whole account view in one go
    async fn account_state(&self) -> Result<AccountState> {
        let balance_usd = self.get_balance().await?;
        let daily_realized_pnl = self.get_daily_realized_pnl().await?;
        let current_drawdown_pct = self.get_drawdown_pct().await?;
        let open_exposure_usd = self
            .get_open_positions()
            .await?
            .iter()
            .map(|p| p.notional())
            .sum();

        Ok(AccountState {
            balance_usd,
            daily_realized_pnl,
            current_drawdown_pct,
            open_exposure_usd,
        })
    }
}
