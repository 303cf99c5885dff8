//! Configuration types for poly-pair

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub market: MarketConfig,
    pub trading: TradingConfig,
    pub store: StoreConfig,
    pub telemetry: TelemetryConfig,
}

/// Market discovery and price feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Keyword that identifies the market topic (e.g. "btc")
    pub topic_keyword: String,
    /// Keyword that identifies the market duration (e.g. "15")
    pub duration_keyword: String,
    /// How often to refresh the market catalog
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Timeout for each external request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Override for the Gamma catalog base URL
    #[serde(default)]
    pub gamma_url: Option<String>,
    /// Override for the data API base URL (recent trades feed)
    #[serde(default)]
    pub data_url: Option<String>,
}

/// Trading parameters used to seed the control state
#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Trading mode: paper or live
    pub mode: TradingMode,
    /// Share target per outcome
    pub target_shares: i64,
    /// Maximum price at which either outcome is bought
    pub price_ceiling: Decimal,
    /// Stop after this many settled sessions (0 = unbounded)
    #[serde(default)]
    pub max_sessions: u32,
    /// Price poll cadence
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

/// Trading mode: paper trading or live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Paper,
    Live,
}

impl TradingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingMode::Paper => "paper",
            TradingMode::Live => "live",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "paper" => Some(TradingMode::Paper),
            "live" => Some(TradingMode::Live),
            _ => None,
        }
    }
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// SQLite database URL (e.g. "sqlite://poly-pair.db")
    pub database_url: String,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON format for log aggregation
    Json,
}

fn default_refresh_interval() -> u64 {
    30
}
fn default_request_timeout() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    5
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject invalid trading parameters before they reach the scheduler
    pub fn validate(&self) -> anyhow::Result<()> {
        crate::control::validate_target_shares(self.trading.target_shares)?;
        crate::control::validate_price_ceiling(self.trading.price_ceiling)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const EXAMPLE: &str = r#"
        [market]
        topic_keyword = "btc"
        duration_keyword = "15"
        refresh_interval_secs = 30

        [trading]
        mode = "paper"
        target_shares = 20
        price_ceiling = 0.35
        max_sessions = 0
        poll_interval_secs = 5

        [store]
        database_url = "sqlite://poly-pair.db"

        [telemetry]
        log_level = "info"
    "#;

    #[test]
    fn test_config_deserialize() {
        let config: Config = toml::from_str(EXAMPLE).unwrap();
        assert_eq!(config.market.topic_keyword, "btc");
        assert_eq!(config.trading.mode, TradingMode::Paper);
        assert_eq!(config.trading.target_shares, 20);
        assert_eq!(config.trading.price_ceiling, dec!(0.35));
        assert_eq!(config.trading.max_sessions, 0);
        assert_eq!(config.store.database_url, "sqlite://poly-pair.db");
    }

    #[test]
    fn test_config_defaults() {
        let toml = r#"
            [market]
            topic_keyword = "btc"
            duration_keyword = "15"

            [trading]
            mode = "live"
            target_shares = 10
            price_ceiling = 0.40

            [store]
            database_url = "sqlite::memory:"

            [telemetry]
            log_level = "debug"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.market.refresh_interval_secs, 30);
        assert_eq!(config.market.request_timeout_secs, 10);
        assert_eq!(config.trading.poll_interval_secs, 5);
        assert_eq!(config.trading.max_sessions, 0);
        assert!(config.market.gamma_url.is_none());
        assert_eq!(config.trading.mode, TradingMode::Live);
        assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_log_format_json() {
        let toml = r#"
            log_level = "info"
            log_format = "json"
        "#;
        let telemetry: TelemetryConfig = toml::from_str(toml).unwrap();
        assert_eq!(telemetry.log_format, LogFormat::Json);
    }

    #[test]
    fn test_config_validate_rejects_bad_ceiling() {
        let mut config: Config = toml::from_str(EXAMPLE).unwrap();
        config.trading.price_ceiling = dec!(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_rejects_zero_shares() {
        let mut config: Config = toml::from_str(EXAMPLE).unwrap();
        config.trading.target_shares = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trading_mode_round_trip() {
        assert_eq!(TradingMode::parse("paper"), Some(TradingMode::Paper));
        assert_eq!(TradingMode::parse("live"), Some(TradingMode::Live));
        assert_eq!(TradingMode::parse("real"), None);
        assert_eq!(TradingMode::Paper.as_str(), "paper");
        assert_eq!(TradingMode::Live.to_string(), "live");
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }
}
