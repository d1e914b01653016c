//! Configuration management for the funding arbitrage scanner.
//!
//! Loads settings from an optional `config.toml` and `FAS__`-prefixed
//! environment variables (e.g. `FAS__ALERTS__TELEGRAM_TOKEN`).

use crate::exchange::DEFAULT_TICKER_URL;
use crate::pipeline::ranker::{
    SortDirection, SortKey, DEFAULT_HIGH_DIFF_THRESHOLD, DEFAULT_PAGE_SIZE, DEFAULT_TOP_N,
};
use crate::pipeline::ComparisonPair;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend service (rates proxy, trading, notification relay)
    #[serde(default)]
    pub backend: BackendConfig,
    /// Where rates come from
    #[serde(default)]
    pub feeds: FeedsConfig,
    /// The two exchanges being compared
    #[serde(default)]
    pub comparison: ComparisonPair,
    /// Ranking and filtering
    #[serde(default)]
    pub scanner: ScannerConfig,
    /// Refresh cadence
    #[serde(default)]
    pub polling: PollingConfig,
    /// Funding-window alerts
    #[serde(default)]
    pub alerts: AlertsConfig,
    /// User exchange keys forwarded to the backend
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_primary_url")]
    pub primary_url: String,
    /// Tried when the primary is unreachable
    #[serde(default)]
    pub backup_url: Option<String>,
    /// Query live (mainnet) rates instead of testnet
    #[serde(default = "default_true")]
    pub is_live: bool,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Rate source selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    /// Aggregated `/api/rates` from the backend
    Backend,
    /// Poll each exchange's public API
    Direct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    #[serde(default = "default_feed_source")]
    pub source: FeedSource,
    #[serde(default)]
    pub binance_testnet: bool,
    #[serde(default = "default_coinswitch_url")]
    pub coinswitch_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Minimum spread in percentage points (inclusive)
    #[serde(default)]
    pub min_spread: Decimal,
    #[serde(default)]
    pub high_diff_only: bool,
    #[serde(default = "default_high_diff_threshold")]
    pub high_diff_threshold: Decimal,
    /// Symbols kept per refresh cycle
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_sort_key")]
    pub sort_key: SortKey,
    #[serde(default = "default_sort_direction")]
    pub sort_direction: SortDirection,
    /// Hide symbols not tradable on the execution venue
    #[serde(default)]
    pub restrict_to_tradable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Re-rank and alert evaluation cadence
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_rates_secs")]
    pub rates_secs: u64,
    #[serde(default = "default_metadata_secs")]
    pub metadata_secs: u64,
    #[serde(default = "default_tradable_secs")]
    pub tradable_secs: u64,
    /// Subscribe to the Binance mark-price stream in addition to polling
    #[serde(default)]
    pub use_websocket: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub telegram_token: String,
    #[serde(default)]
    pub telegram_chat_id: String,
    /// Minimum `|diff|` in percentage points
    #[serde(default = "default_threshold_pct")]
    pub threshold_pct: Decimal,
    #[serde(default = "default_lead_time_minutes")]
    pub lead_time_minutes: u32,
    /// Send through the backend's relay instead of calling Telegram directly
    #[serde(default = "default_true")]
    pub relay_via_backend: bool,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Optional image attached to each alert
    #[serde(default)]
    pub image_url: Option<String>,
    /// Days of alert history to keep; 0 keeps everything
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub binance_api_key: String,
    #[serde(default)]
    pub binance_api_secret: String,
    #[serde(default)]
    pub bybit_api_key: String,
    #[serde(default)]
    pub bybit_api_secret: String,
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_primary_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_request_timeout() -> u64 {
    10
}
fn default_feed_source() -> FeedSource {
    FeedSource::Backend
}
fn default_coinswitch_url() -> String {
    DEFAULT_TICKER_URL.to_string()
}
fn default_high_diff_threshold() -> Decimal {
    DEFAULT_HIGH_DIFF_THRESHOLD
}
fn default_top_n() -> usize {
    DEFAULT_TOP_N
}
fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}
fn default_sort_key() -> SortKey {
    SortKey::Spread
}
fn default_sort_direction() -> SortDirection {
    SortDirection::Desc
}
fn default_tick_ms() -> u64 {
    1000
}
fn default_rates_secs() -> u64 {
    10
}
fn default_metadata_secs() -> u64 {
    10
}
fn default_tradable_secs() -> u64 {
    60
}
fn default_threshold_pct() -> Decimal {
    dec!(0.5)
}
fn default_lead_time_minutes() -> u32 {
    10
}
fn default_db_path() -> String {
    "alerts.db".to_string()
}
fn default_retention_days() -> u32 {
    30
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("FAS"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.backend.primary_url.trim().is_empty(),
            "backend.primary_url must not be empty"
        );

        anyhow::ensure!(
            self.comparison.exchange_a != self.comparison.exchange_b,
            "comparison exchanges must differ"
        );

        anyhow::ensure!(
            self.scanner.min_spread >= Decimal::ZERO
                && self.scanner.high_diff_threshold >= Decimal::ZERO,
            "scanner thresholds must be non-negative"
        );

        anyhow::ensure!(
            self.scanner.top_n > 0 && self.scanner.page_size > 0,
            "top_n and page_size must be positive"
        );

        anyhow::ensure!(
            self.polling.tick_ms > 0
                && self.polling.rates_secs > 0
                && self.polling.metadata_secs > 0
                && self.polling.tradable_secs > 0,
            "polling intervals must be positive"
        );

        anyhow::ensure!(
            self.alerts.threshold_pct >= Decimal::ZERO && self.alerts.lead_time_minutes > 0,
            "alert threshold must be non-negative and lead time positive"
        );

        Ok(())
    }
}

impl AlertsConfig {
    /// Alerts are only delivered when both Telegram fields are set.
    pub fn is_configured(&self) -> bool {
        !self.telegram_token.trim().is_empty() && !self.telegram_chat_id.trim().is_empty()
    }
}

impl CredentialsConfig {
    /// Header pairs for the backend's per-user exchange keys. Empty values are omitted.
    pub fn headers(&self) -> Vec<(&'static str, &str)> {
        [
            ("X-User-Binance-Key", self.binance_api_key.as_str()),
            ("X-User-Binance-Secret", self.binance_api_secret.as_str()),
            ("X-User-Bybit-Key", self.bybit_api_key.as_str()),
            ("X-User-Bybit-Secret", self.bybit_api_secret.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .collect()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            primary_url: default_primary_url(),
            backup_url: None,
            is_live: true,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            source: default_feed_source(),
            binance_testnet: false,
            coinswitch_url: default_coinswitch_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            min_spread: Decimal::ZERO,
            high_diff_only: false,
            high_diff_threshold: default_high_diff_threshold(),
            top_n: default_top_n(),
            page_size: default_page_size(),
            sort_key: default_sort_key(),
            sort_direction: default_sort_direction(),
            restrict_to_tradable: false,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            rates_secs: default_rates_secs(),
            metadata_secs: default_metadata_secs(),
            tradable_secs: default_tradable_secs(),
            use_websocket: false,
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            telegram_chat_id: String::new(),
            threshold_pct: default_threshold_pct(),
            lead_time_minutes: default_lead_time_minutes(),
            relay_via_backend: true,
            db_path: default_db_path(),
            image_url: None,
            retention_days: default_retention_days(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangeId;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.comparison.exchange_a, ExchangeId::Binance);
        assert_eq!(config.comparison.exchange_b, ExchangeId::Bybit);
        assert_eq!(config.scanner.top_n, 200);
        assert_eq!(config.alerts.threshold_pct, dec!(0.5));
        assert_eq!(config.alerts.retention_days, 30);
    }

    #[test]
    fn test_same_exchange_comparison_is_rejected() {
        let mut config = Config::default();
        config.comparison.exchange_b = ExchangeId::Binance;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_alerts_require_token_and_chat() {
        let mut alerts = AlertsConfig::default();
        assert!(!alerts.is_configured());
        alerts.telegram_token = "123:abc".to_string();
        alerts.telegram_chat_id = "42".to_string();
        assert!(alerts.is_configured());
    }

    #[test]
    fn test_credential_headers_skip_empty() {
        let credentials = CredentialsConfig {
            binance_api_key: "key".to_string(),
            binance_api_secret: "secret".to_string(),
            ..Default::default()
        };
        let headers = credentials.headers();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0], ("X-User-Binance-Key", "key"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                "[comparison]\nexchange_a = \"bybit\"\nexchange_b = \"coinswitch\"\n\n[feeds]\nsource = \"direct\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.comparison.exchange_a, ExchangeId::Bybit);
        assert_eq!(config.comparison.exchange_b, ExchangeId::CoinSwitch);
        assert_eq!(config.feeds.source, FeedSource::Direct);
        assert_eq!(config.polling.rates_secs, 10);
    }
}
