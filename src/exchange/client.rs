//! Binance USDⓈ-M futures REST client (public market data only).

use super::http::{build_client, get_json};
use super::traits::{FeedError, RateFeed};
use super::types::*;
use crate::config::FeedsConfig;
use crate::pipeline::normalizer::strip_quote_suffix;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

const FUTURES_BASE_URL: &str = "https://fapi.binance.com";
const FUTURES_TESTNET_URL: &str = "https://testnet.binancefuture.com";

/// Entry of `/fapi/v1/fundingInfo`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingInfo {
    pub symbol: String,
    #[serde(default)]
    pub funding_interval_hours: Option<u32>,
}

/// Symbol entry of `/fapi/v1/exchangeInfo`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesSymbolInfo {
    pub symbol: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
struct FuturesExchangeInfo {
    symbols: Vec<FuturesSymbolInfo>,
}

/// Binance futures client for funding rates, intervals and symbol status.
pub struct BinanceClient {
    http: Client,
    futures_base_url: String,
}

impl BinanceClient {
    /// Create a new Binance client from configuration.
    pub fn new(config: &FeedsConfig) -> Result<Self> {
        let base_url = if config.binance_testnet {
            FUTURES_TESTNET_URL
        } else {
            FUTURES_BASE_URL
        };
        Self::with_base_url(base_url, config.request_timeout_secs)
    }

    /// Create a client against a custom base URL.
    pub fn with_base_url(base_url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout_secs)?,
            futures_base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get mark price and funding data for all perpetual contracts.
    #[instrument(skip(self), name = "binance_premium_index")]
    pub async fn get_premium_index(&self) -> Result<ExchangeResponse, FeedError> {
        let url = format!("{}/fapi/v1/premiumIndex", self.futures_base_url);
        let body: Value = get_json(&self.http, &url).await?;

        ExchangeResponse::from_value(body).ok_or_else(|| FeedError::Decode {
            url,
            reason: "expected a list of tickers".to_string(),
        })
    }

    /// Get funding intervals for symbols with a non-default schedule.
    ///
    /// Binance only lists symbols whose interval was adjusted; everything
    /// else settles every 8 hours.
    #[instrument(skip(self), name = "binance_funding_info")]
    pub async fn get_funding_info(&self) -> Result<FundingIntervals, FeedError> {
        let url = format!("{}/fapi/v1/fundingInfo", self.futures_base_url);
        let infos: Vec<FundingInfo> = get_json(&self.http, &url).await?;

        let intervals: FundingIntervals = infos
            .into_iter()
            .filter_map(|info| {
                let hours = info.funding_interval_hours.filter(|h| *h > 0)?;
                let base = strip_quote_suffix(&info.symbol)?;
                Some((base, hours))
            })
            .collect();

        debug!("Fetched {} Binance funding intervals", intervals.len());
        Ok(intervals)
    }

    /// Get canonical symbols currently in TRADING status.
    #[instrument(skip(self), name = "binance_tradable_symbols")]
    pub async fn get_tradable_symbols(&self) -> Result<Vec<String>, FeedError> {
        let url = format!("{}/fapi/v1/exchangeInfo", self.futures_base_url);
        let info: FuturesExchangeInfo = get_json(&self.http, &url).await?;

        Ok(tradable_bases(info.symbols))
    }
}

/// Canonical bases of USDT-quoted symbols in TRADING status.
fn tradable_bases(symbols: Vec<FuturesSymbolInfo>) -> Vec<String> {
    symbols
        .into_iter()
        .filter(|s| s.status == "TRADING" && s.symbol.ends_with("USDT"))
        .filter_map(|s| strip_quote_suffix(&s.symbol))
        .collect()
}

#[async_trait]
impl RateFeed for BinanceClient {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    async fn fetch_rates(&self) -> Result<ExchangeResponse, FeedError> {
        self.get_premium_index().await
    }

    async fn fetch_intervals(&self) -> Result<FundingIntervals, FeedError> {
        self.get_funding_info().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_tradable_bases_filters_status_and_quote() {
        let symbols = vec![
            FuturesSymbolInfo {
                symbol: "BTCUSDT".to_string(),
                status: "TRADING".to_string(),
            },
            FuturesSymbolInfo {
                symbol: "ETHUSDT".to_string(),
                status: "SETTLING".to_string(),
            },
            FuturesSymbolInfo {
                symbol: "BTCUSDC".to_string(),
                status: "TRADING".to_string(),
            },
        ];

        assert_eq!(tradable_bases(symbols), vec!["BTC".to_string()]);
    }

    #[tokio::test]
    async fn test_funding_info_skips_missing_intervals() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fapi/v1/fundingInfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"symbol": "BTCUSDT", "fundingIntervalHours": 8},
                {"symbol": "WIFUSDT", "fundingIntervalHours": 4},
                {"symbol": "ETHUSDT"}
            ])))
            .mount(&server)
            .await;

        let client = BinanceClient::with_base_url(&server.uri(), 5).unwrap();
        let intervals = client.get_funding_info().await.unwrap();

        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals["WIF"], 4);
    }

    #[tokio::test]
    async fn test_premium_index_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fapi/v1/premiumIndex"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = BinanceClient::with_base_url(&server.uri(), 5).unwrap();
        let err = client.fetch_rates().await.unwrap_err();
        assert!(matches!(err, FeedError::Status { .. }));
    }
}
