use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::ensemble::EnsembleConfig;
use crate::execution::LifecycleConfig;
use crate::feed::HttpFeedConfig;
use crate::models::TradingMode;
use crate::regime::RegimeConfig;
use crate::risk::RiskLimits;
use crate::sim::MarketScenario;
use crate::sizing::SizingConfig;
use crate::strategy::{CarryConfig, CycleConfig, MeanReversionConfig, MomentumConfig};
use crate::timeframe::{TimeframeAligner, TimeframeConfig};
use crate::{Result, TradingError};

pub const DEFAULT_CONFIG_PATH: &str = "config/tradeguard.toml";
const ENV_PREFIX: &str = "TRADEGUARD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSource {
    Synthetic,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticSettings {
    pub seed: u64,
    pub interval_minutes: i64,
    pub base_price: f64,
    /// Scenario per symbol; unlisted symbols use `default_scenario`
    pub scenarios: HashMap<String, MarketScenario>,
    pub default_scenario: MarketScenario,
}

impl Default for SyntheticSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            interval_minutes: 5,
            base_price: 100.0,
            scenarios: HashMap::new(),
            default_scenario: MarketScenario::Sideways,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub source: FeedSource,
    pub http: HttpFeedConfig,
    pub synthetic: SyntheticSettings,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            source: FeedSource::Synthetic,
            http: HttpFeedConfig::default(),
            synthetic: SyntheticSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceBackend {
    Memory,
    Postgres,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceSettings {
    pub backend: PersistenceBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub redis_url: Option<String>,
    pub redis_prefix: String,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::Memory,
            database_url: None,
            max_connections: 5,
            redis_url: None,
            redis_prefix: "tradeguard".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerKind {
    Paper,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    pub broker: BrokerKind,
    pub gateway_url: Option<String>,
    pub timeout_secs: u64,
    pub paper_seed: u64,
    pub paper_max_slippage_bps: f64,
    /// Starting balance of the local ledger
    pub starting_balance_usd: f64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            broker: BrokerKind::Paper,
            gateway_url: None,
            timeout_secs: 10,
            paper_seed: 7,
            paper_max_slippage_bps: 5.0,
            starting_balance_usd: 10_000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 5,
        }
    }
}

/// Full application configuration.
///
/// Sources, later overriding earlier: built-in defaults, the TOML file,
/// then `TRADEGUARD__SECTION__KEY` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mode: TradingMode,
    pub engine: EngineConfig,
    pub regime: RegimeConfig,
    pub timeframe: TimeframeConfig,
    pub ensemble: EnsembleConfig,
    pub sizing: SizingConfig,
    pub risk: RiskLimits,
    pub lifecycle: LifecycleConfig,
    pub momentum: MomentumConfig,
    pub mean_reversion: MeanReversionConfig,
    pub cycle: CycleConfig,
    pub carry: CarryConfig,
    pub feed: FeedSettings,
    pub persistence: PersistenceSettings,
    pub execution: ExecutionSettings,
    pub notify: NotifySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: TradingMode::Paper,
            engine: EngineConfig::default(),
            regime: RegimeConfig::default(),
            timeframe: TimeframeConfig::default(),
            ensemble: EnsembleConfig::default(),
            sizing: SizingConfig::default(),
            risk: RiskLimits::default(),
            lifecycle: LifecycleConfig::default(),
            momentum: MomentumConfig::default(),
            mean_reversion: MeanReversionConfig::default(),
            cycle: CycleConfig::default(),
            carry: CarryConfig::default(),
            feed: FeedSettings::default(),
            persistence: PersistenceSettings::default(),
            execution: ExecutionSettings::default(),
            notify: NotifySettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from an optional file plus the environment.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_PATH).required(false),
        };

        let settings: Settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("engine.symbols"),
            )
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    /// Reject settings the pipeline cannot run safely with
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        let kelly = self.sizing.kelly_safety_fraction;
        if !(0.5..=0.75).contains(&kelly) {
            problems.push(format!(
                "sizing.kelly_safety_fraction {} must be within [0.5, 0.75]",
                kelly
            ));
        }
        if !(self.sizing.max_position_pct > 0.0 && self.sizing.max_position_pct <= 1.0) {
            problems.push("sizing.max_position_pct must be within (0, 1]".to_string());
        }

        if self.engine.symbols.is_empty() {
            problems.push("engine.symbols must not be empty".to_string());
        }
        if self.engine.tick_interval_secs == 0
            || self.engine.monitor_interval_secs == 0
            || self.engine.reaper_interval_secs == 0
        {
            problems.push("engine intervals must be positive".to_string());
        }
        if self.engine.target_reward_risk < self.risk.min_reward_risk {
            problems.push(format!(
                "engine.target_reward_risk {} is below risk.min_reward_risk {}",
                self.engine.target_reward_risk, self.risk.min_reward_risk
            ));
        }
        if self.engine.stop_atr_multiple <= 0.0 {
            problems.push("engine.stop_atr_multiple must be positive".to_string());
        }

        let required = TimeframeAligner::new(self.timeframe.clone()).required_base_candles();
        if self.engine.candle_lookback < required {
            problems.push(format!(
                "engine.candle_lookback {} is below the {} candles multi-timeframe analysis needs",
                self.engine.candle_lookback, required
            ));
        }
        if !(1 < self.timeframe.medium_factor && self.timeframe.medium_factor < self.timeframe.higher_factor) {
            problems.push("timeframe factors must satisfy 1 < medium < higher".to_string());
        }

        let regime = &self.regime;
        if !(regime.low_volatility < regime.high_volatility
            && regime.high_volatility < regime.crisis_volatility)
        {
            problems.push("regime volatility thresholds must be increasing".to_string());
        }

        if !(0.0..1.0).contains(&self.lifecycle.trail_fraction) {
            problems.push("lifecycle.trail_fraction must be within [0, 1)".to_string());
        }
        if self.lifecycle.confirmation_ttl_secs <= 0 {
            problems.push("lifecycle.confirmation_ttl_secs must be positive".to_string());
        }

        if self.risk.max_daily_loss_usd <= 0.0 {
            problems.push("risk.max_daily_loss_usd must be positive".to_string());
        }
        if !(self.risk.max_drawdown_pct > 0.0 && self.risk.max_drawdown_pct < 1.0) {
            problems.push("risk.max_drawdown_pct must be within (0, 1)".to_string());
        }

        if self.mode == TradingMode::Live {
            if self.feed.source == FeedSource::Synthetic {
                problems.push("live mode cannot use the synthetic feed".to_string());
            }
            if self.execution.broker == BrokerKind::Paper {
                problems.push("live mode cannot use the paper broker".to_string());
            }
        }
        if self.execution.broker == BrokerKind::Http && self.execution.gateway_url.is_none() {
            problems.push("execution.gateway_url is required for the http broker".to_string());
        }
        match self.persistence.backend {
            PersistenceBackend::Postgres if self.persistence.database_url.is_none() => {
                problems.push("persistence.database_url is required for postgres".to_string())
            }
            PersistenceBackend::Redis if self.persistence.redis_url.is_none() => {
                problems.push("persistence.redis_url is required for redis".to_string())
            }
            _ => {}
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(TradingError::Config(problems.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        Settings::default().validate().unwrap();
    }

    #[test]
    fn test_kelly_fraction_bounds() {
        let mut settings = Settings::default();
        settings.sizing.kelly_safety_fraction = 0.9;

        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("kelly_safety_fraction"));
    }

    #[test]
    fn test_live_mode_refuses_simulated_collaborators() {
        let mut settings = Settings::default();
        settings.mode = TradingMode::Live;

        let err = settings.validate().unwrap_err().to_string();
        assert!(err.contains("synthetic feed"));
        assert!(err.contains("paper broker"));
    }

    #[test]
    fn test_short_lookback_rejected() {
        let mut settings = Settings::default();
        settings.engine.candle_lookback = 100;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = std::env::temp_dir().join(format!("tradeguard-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
mode = "paper"

[engine]
symbols = ["BTC", "ETH"]
tick_interval_secs = 30

[sizing]
kelly_safety_fraction = 0.6

[feed.synthetic]
default_scenario = "uptrend"
"#
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.engine.symbols, vec!["BTC", "ETH"]);
        assert_eq!(settings.engine.tick_interval_secs, 30);
        assert_eq!(settings.sizing.kelly_safety_fraction, 0.6);
        assert_eq!(settings.feed.synthetic.default_scenario, MarketScenario::Uptrend);
        // Untouched sections keep their defaults
        assert_eq!(settings.risk.min_reward_risk, 2.0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let path = std::env::temp_dir().join("tradeguard-does-not-exist.toml");
        assert!(Settings::load(Some(&path)).is_err());
    }
}
