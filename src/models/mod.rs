use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// OHLCV candlestick data, ordered oldest first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Point-in-time market observation for a symbol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    /// Absolute bid/ask spread, in price units
    pub spread: f64,
    pub volatility: f64,
    pub timestamp: DateTime<Utc>,
}

/// Direction of a position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Signed P&L per unit for a move from `entry` to `exit`
    pub fn pnl_per_unit(&self, entry: f64, exit: f64) -> f64 {
        match self {
            Side::Long => exit - entry,
            Side::Short => entry - exit,
        }
    }
}

/// Directional vote produced by models and the ensemble
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    Buy,
    Sell,
    None,
}

impl TradeDirection {
    pub fn side(&self) -> Option<Side> {
        match self {
            TradeDirection::Buy => Some(Side::Long),
            TradeDirection::Sell => Some(Side::Short),
            TradeDirection::None => None,
        }
    }

    pub fn is_directional(&self) -> bool {
        !matches!(self, TradeDirection::None)
    }
}

/// Paper trading fills are simulated; live trading only fills on real prices
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Paper,
    Live,
}

impl std::str::FromStr for TradingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "paper" => Ok(TradingMode::Paper),
            "live" => Ok(TradingMode::Live),
            other => Err(format!("unknown trading mode '{}'", other)),
        }
    }
}

/// Account-level view read from the ledger once per evaluation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AccountState {
    pub balance_usd: f64,
    pub daily_realized_pnl: f64,
    /// Fraction, e.g. 0.12 = 12% below peak equity
    pub current_drawdown_pct: f64,
    pub open_exposure_usd: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Open,
    Close,
}

/// Order instruction handed to the execution collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub action: DecisionAction,
    pub position_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub size: f64,
    pub reference_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub rationale: String,
    pub idempotency_key: String,
    pub issued_at: DateTime<Utc>,
}

/// Fill reported back by the execution collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fill {
    pub price: f64,
    pub quantity: f64,
    pub filled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    TradeOpened,
    TradeClosed,
    PendingConfirmation,
    ConfirmationExpired,
    RiskBreach,
    CircuitBreakerTripped,
    CircuitBreakerReset,
    ExecutionFailure,
    PersistenceFailure,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Low,
    Normal,
    High,
    Critical,
}

/// Notification emitted to the alerting collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub priority: AlertPriority,
    pub title: String,
    pub message: String,
    pub symbol: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(kind: AlertKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        let priority = match kind {
            AlertKind::CircuitBreakerTripped => AlertPriority::Critical,
            AlertKind::ExecutionFailure | AlertKind::PersistenceFailure | AlertKind::RiskBreach => {
                AlertPriority::High
            }
            AlertKind::ConfirmationExpired => AlertPriority::Low,
            _ => AlertPriority::Normal,
        };

        Self {
            kind,
            priority,
            title: title.into(),
            message: message.into(),
            symbol: None,
            created_at: Utc::now(),
        }
    }

    pub fn for_symbol(mut self, symbol: &str) -> Self {
        self.symbol = Some(symbol.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_pnl() {
        assert_eq!(Side::Long.pnl_per_unit(100.0, 110.0), 10.0);
        assert_eq!(Side::Short.pnl_per_unit(100.0, 110.0), -10.0);
        assert_eq!(Side::Short.pnl_per_unit(100.0, 95.0), 5.0);
    }

    #[test]
    fn test_direction_to_side() {
        assert_eq!(TradeDirection::Buy.side(), Some(Side::Long));
        assert_eq!(TradeDirection::Sell.side(), Some(Side::Short));
        assert_eq!(TradeDirection::None.side(), None);
        assert!(!TradeDirection::None.is_directional());
    }

    #[test]
    fn test_trading_mode_parse() {
        assert_eq!("paper".parse::<TradingMode>(), Ok(TradingMode::Paper));
        assert_eq!("LIVE".parse::<TradingMode>(), Ok(TradingMode::Live));
        assert!("demo".parse::<TradingMode>().is_err());
    }

    #[test]
    fn test_alert_priority_by_kind() {
        let alert = Alert::new(AlertKind::CircuitBreakerTripped, "Tripped", "manual");
        assert_eq!(alert.priority, AlertPriority::Critical);

        let alert = Alert::new(AlertKind::ConfirmationExpired, "Expired", "ttl").for_symbol("BTC");
        assert_eq!(alert.priority, AlertPriority::Low);
        assert_eq!(alert.symbol.as_deref(), Some("BTC"));
    }
}
