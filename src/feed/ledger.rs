use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::AccountLedger;
use crate::execution::Position;
use crate::Result;

#[derive(Debug)]
struct LedgerState {
    balance: f64,
    peak_equity: f64,
    daily_pnl: f64,
    /// UTC day `daily_pnl` belongs to
    pnl_day: NaiveDate,
    open: HashMap<Uuid, Position>,
    /// Closed ids; a late open notification for one of these is ignored
    settled: HashSet<Uuid>,
}

/// In-process account ledger for paper trading.
///
/// Balance moves only on realized P&L. Drawdown is measured against the
/// highest realized balance seen.
#[derive(Debug)]
pub struct PaperLedger {
    state: RwLock<LedgerState>,
}

impl PaperLedger {
    pub fn new(starting_balance: f64) -> Self {
        Self {
            state: RwLock::new(LedgerState {
                balance: starting_balance,
                peak_equity: starting_balance,
                daily_pnl: 0.0,
                pnl_day: Utc::now().date_naive(),
                open: HashMap::new(),
                settled: HashSet::new(),
            }),
        }
    }

    /// Book realized P&L at `at`, rolling the daily total on a new UTC day
    pub async fn apply_realized_pnl(&self, pnl: f64, at: DateTime<Utc>) {
        if !pnl.is_finite() {
            return;
        }

        let mut state = self.state.write().await;
        let day = at.date_naive();
        if day != state.pnl_day {
            state.pnl_day = day;
            state.daily_pnl = 0.0;
        }

        state.daily_pnl += pnl;
        state.balance += pnl;
        state.peak_equity = state.peak_equity.max(state.balance);
    }

    async fn daily_pnl_on(&self, day: NaiveDate) -> f64 {
        let state = self.state.read().await;
        if state.pnl_day == day {
            state.daily_pnl
        } else {
            0.0
        }
    }
}

#[async_trait]
impl AccountLedger for PaperLedger {
    async fn get_balance(&self) -> Result<f64> {
        Ok(self.state.read().await.balance)
    }

    async fn get_open_positions(&self) -> Result<Vec<Position>> {
        Ok(self.state.read().await.open.values().cloned().collect())
    }

    async fn get_daily_realized_pnl(&self) -> Result<f64> {
        Ok(self.daily_pnl_on(Utc::now().date_naive()).await)
    }

    async fn get_drawdown_pct(&self) -> Result<f64> {
        let state = self.state.read().await;
        if state.peak_equity <= 0.0 {
            return Ok(0.0);
        }
        Ok(((state.peak_equity - state.balance) / state.peak_equity).max(0.0))
    }

    async fn on_position_opened(&self, position: &Position) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.settled.contains(&position.id) {
            state.open.insert(position.id, position.clone());
        }
        Ok(())
    }

    async fn on_position_closed(&self, position: &Position) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.open.remove(&position.id);
            if !state.settled.insert(position.id) {
                return Ok(());
            }
        }

        if let Some(pnl) = position.realized_pnl {
            self.apply_realized_pnl(pnl, position.closed_at.unwrap_or_else(Utc::now))
                .await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{CloseReason, PositionState};
    use crate::models::Side;
    use chrono::Duration;

    #[tokio::test]
    async fn test_drawdown_from_peak() {
        let ledger = PaperLedger::new(10_000.0);
        let now = Utc::now();

        ledger.apply_realized_pnl(1_000.0, now).await;
        ledger.apply_realized_pnl(-2_200.0, now).await;

        assert_eq!(ledger.get_balance().await.unwrap(), 8_800.0);
        assert!((ledger.get_drawdown_pct().await.unwrap() - 0.2).abs() < 1e-12);
        assert_eq!(ledger.get_daily_realized_pnl().await.unwrap(), -1_200.0);
    }

    #[tokio::test]
    async fn test_daily_pnl_resets_on_new_day() {
        let ledger = PaperLedger::new(10_000.0);

        ledger
            .apply_realized_pnl(-300.0, Utc::now() - Duration::days(1))
            .await;
        assert_eq!(ledger.get_daily_realized_pnl().await.unwrap(), 0.0);

        ledger.apply_realized_pnl(-50.0, Utc::now()).await;
        assert_eq!(ledger.get_daily_realized_pnl().await.unwrap(), -50.0);
        assert_eq!(ledger.get_balance().await.unwrap(), 9_650.0);
    }

    #[tokio::test]
    async fn test_position_hooks_track_exposure() {
        let ledger = PaperLedger::new(10_000.0);
        let mut position = Position::proposed(
            "BTC",
            Side::Long,
            100.0,
            5.0,
            95.0,
            112.5,
            "k".to_string(),
            "r".to_string(),
        );
        position.transition(PositionState::Open, Utc::now()).unwrap();

        ledger.on_position_opened(&position).await.unwrap();
        let account = ledger.account_state().await.unwrap();
        assert_eq!(account.open_exposure_usd, 500.0);

        position.close(90.0, CloseReason::StopLoss, Utc::now()).unwrap();
        ledger.on_position_closed(&position).await.unwrap();

        let account = ledger.account_state().await.unwrap();
        assert_eq!(account.open_exposure_usd, 0.0);
        assert_eq!(account.balance_usd, 9_950.0);
        assert_eq!(account.daily_realized_pnl, -50.0);
    }

    #[tokio::test]
    async fn test_close_before_open_notification_settles_once() {
        let ledger = PaperLedger::new(10_000.0);
        let mut position = Position::proposed(
            "ETH",
            Side::Long,
            100.0,
            2.0,
            95.0,
            112.5,
            "k".to_string(),
            "r".to_string(),
        );
        position.transition(PositionState::Open, Utc::now()).unwrap();
        let opened = position.clone();
        position.close(110.0, CloseReason::EmergencyFlatten, Utc::now()).unwrap();

        ledger.on_position_closed(&position).await.unwrap();
        ledger.on_position_opened(&opened).await.unwrap();
        ledger.on_position_closed(&position).await.unwrap();

        let account = ledger.account_state().await.unwrap();
        assert_eq!(account.open_exposure_usd, 0.0);
        assert_eq!(account.balance_usd, 10_020.0);
    }
}
