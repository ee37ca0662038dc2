// Risk management module
pub mod circuit_breaker;
pub mod gate;

pub use circuit_breaker::{BreakerStatus, CircuitBreaker};
pub use gate::{DailyLossLatch, ProposedTrade, RiskCheck, RiskDecision, RiskGate, RiskLimits};
