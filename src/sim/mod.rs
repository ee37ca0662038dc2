// Simulation module
// Paper-mode data sources. Never constructed in live mode.
pub mod synthetic;

pub use synthetic::{MarketScenario, SyntheticFeed};
