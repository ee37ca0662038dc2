use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::CircuitBreaker;
use crate::models::{AccountState, Side};
use crate::regime::MarketRegime;
use crate::sizing::reward_risk;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    pub min_reward_risk: f64,
    pub max_daily_loss_usd: f64,
    /// Fraction below peak equity (0.20 = 20%)
    pub max_drawdown_pct: f64,
    /// Total open notional as a fraction of balance
    pub max_exposure_pct: f64,
    /// Trailing losses that auto-trip the breaker (0 disables)
    pub max_consecutive_losses: usize,
    /// Identical account-level denials in a row before alerting
    pub repeat_alert_threshold: usize,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            min_reward_risk: 2.0,
            max_daily_loss_usd: 500.0,
            max_drawdown_pct: 0.20,
            max_exposure_pct: 0.50,
            max_consecutive_losses: 5,
            repeat_alert_threshold: 3,
        }
    }
}

/// Which check produced a denial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCheck {
    Regime,
    CircuitBreaker,
    PositionSize,
    RewardRisk,
    ActivePosition,
    DailyLoss,
    Drawdown,
    Exposure,
}

impl RiskCheck {
    /// Denials caused by account state rather than the trade itself
    pub fn is_account_level(&self) -> bool {
        matches!(
            self,
            RiskCheck::CircuitBreaker | RiskCheck::DailyLoss | RiskCheck::Drawdown | RiskCheck::Exposure
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub check: Option<RiskCheck>,
}

impl RiskDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            check: None,
        }
    }

    pub fn deny(check: RiskCheck, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            check: Some(check),
        }
    }
}

/// A fully planned trade awaiting the risk verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedTrade {
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub quantity: f64,
    pub notional_usd: f64,
    pub regime: MarketRegime,
}

/// Remembers the UTC date on which the daily loss limit was breached
#[derive(Debug, Default)]
pub struct DailyLossLatch {
    latched_on: Mutex<Option<NaiveDate>>,
}

impl DailyLossLatch {
    pub fn latch(&self, now: DateTime<Utc>) {
        if let Ok(mut latched) = self.latched_on.lock() {
            *latched = Some(now.date_naive());
        }
    }

    /// True while the latch date is today; a stale latch is cleared.
    /// A poisoned lock reads as latched.
    pub fn is_latched(&self, now: DateTime<Utc>) -> bool {
        let Ok(mut latched) = self.latched_on.lock() else {
            return true;
        };
        match *latched {
            Some(date) if date >= now.date_naive() => true,
            Some(_) => {
                tracing::info!("Daily loss latch expired at UTC midnight");
                *latched = None;
                false
            }
            None => false,
        }
    }

    pub fn latched_on(&self) -> Option<NaiveDate> {
        self.latched_on.lock().ok().and_then(|l| *l)
    }
}

/// Pre-trade risk checks. The only state owned here is the daily latch.
pub struct RiskGate {
    limits: RiskLimits,
    breaker: Arc<CircuitBreaker>,
    latch: DailyLossLatch,
}

impl RiskGate {
    pub fn new(limits: RiskLimits, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            limits,
            breaker,
            latch: DailyLossLatch::default(),
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn latch(&self) -> &DailyLossLatch {
        &self.latch
    }

    /// Run every check in order; the first failure is reported
    pub fn evaluate(
        &self,
        trade: &ProposedTrade,
        account: &AccountState,
        has_active_position: bool,
        now: DateTime<Utc>,
    ) -> RiskDecision {
        let decision = self.run_checks(trade, account, has_active_position, now);

        if let Some(reason) = &decision.reason {
            tracing::warn!(symbol = %trade.symbol, check = ?decision.check, "Risk denied: {}", reason);
        }

        decision
    }

    fn run_checks(
        &self,
        trade: &ProposedTrade,
        account: &AccountState,
        has_active_position: bool,
        now: DateTime<Utc>,
    ) -> RiskDecision {
        if !trade.regime.is_tradeable() {
            return RiskDecision::deny(
                RiskCheck::Regime,
                format!("regime {} does not allow trading", trade.regime),
            );
        }

        if self.breaker.is_tripped() {
            let reason = self.breaker.status().reason.unwrap_or_default();
            return RiskDecision::deny(
                RiskCheck::CircuitBreaker,
                format!("circuit breaker tripped: {}", reason),
            );
        }

        if !(trade.quantity.is_finite() && trade.quantity > 0.0)
            || !(trade.notional_usd.is_finite() && trade.notional_usd > 0.0)
        {
            return RiskDecision::deny(RiskCheck::PositionSize, "position size is zero");
        }

        match reward_risk(trade.entry_price, trade.stop_loss, trade.take_profit) {
            Some(rr) if rr >= self.limits.min_reward_risk => {}
            Some(rr) => {
                return RiskDecision::deny(
                    RiskCheck::RewardRisk,
                    format!(
                        "reward:risk {:.2} below minimum {:.2}",
                        rr, self.limits.min_reward_risk
                    ),
                )
            }
            None => {
                return RiskDecision::deny(
                    RiskCheck::RewardRisk,
                    "stop and target do not bracket entry",
                )
            }
        }

        if has_active_position {
            return RiskDecision::deny(
                RiskCheck::ActivePosition,
                format!("{} already has an active position", trade.symbol),
            );
        }

        if self.latch.is_latched(now) {
            return RiskDecision::deny(
                RiskCheck::DailyLoss,
                "daily loss limit reached earlier today",
            );
        }
        if !account.daily_realized_pnl.is_finite()
            || account.daily_realized_pnl < -self.limits.max_daily_loss_usd
        {
            self.latch.latch(now);
            return RiskDecision::deny(
                RiskCheck::DailyLoss,
                format!(
                    "daily P&L ${:.2} breaches limit -${:.2}",
                    account.daily_realized_pnl, self.limits.max_daily_loss_usd
                ),
            );
        }

        if !account.current_drawdown_pct.is_finite()
            || account.current_drawdown_pct >= self.limits.max_drawdown_pct
        {
            return RiskDecision::deny(
                RiskCheck::Drawdown,
                format!(
                    "drawdown {:.1}% at or above limit {:.1}%",
                    account.current_drawdown_pct * 100.0,
                    self.limits.max_drawdown_pct * 100.0
                ),
            );
        }

        let exposure_cap = account.balance_usd * self.limits.max_exposure_pct;
        let exposure = account.open_exposure_usd + trade.notional_usd;
        if !exposure.is_finite() || exposure > exposure_cap {
            return RiskDecision::deny(
                RiskCheck::Exposure,
                format!(
                    "exposure ${:.2} would exceed cap ${:.2}",
                    exposure, exposure_cap
                ),
            );
        }

        RiskDecision::allow()
    }
}
