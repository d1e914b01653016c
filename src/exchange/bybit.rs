//! Bybit v5 public market data client (linear perpetuals).

use super::http::{build_client, get_json};
use super::traits::{FeedError, RateFeed};
use super::types::*;
use crate::pipeline::normalizer::strip_quote_suffix;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

const MAINNET_API_URL: &str = "https://api.bybit.com";

/// Standard Bybit v5 envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct V5Response<T> {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    result: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
struct ListResult<T> {
    #[serde(default = "Vec::new")]
    list: Vec<T>,
}

/// Instrument entry of `/v5/market/instruments-info`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentInfo {
    symbol: String,
    /// Funding interval in minutes
    #[serde(default)]
    funding_interval: Option<u32>,
}

impl<T> V5Response<T> {
    fn into_result(self) -> Result<T, FeedError> {
        if self.ret_code != 0 {
            return Err(FeedError::Api(format!(
                "Bybit retCode {}: {}",
                self.ret_code, self.ret_msg
            )));
        }
        self.result
            .ok_or_else(|| FeedError::Api("Bybit response missing result".to_string()))
    }
}

/// Bybit client for linear funding tickers and instrument intervals.
#[derive(Debug, Clone)]
pub struct BybitClient {
    http: Client,
    base_url: String,
}

impl BybitClient {
    /// Create a new Bybit client for mainnet.
    pub fn new(timeout_secs: u64) -> Result<Self> {
        Self::with_base_url(MAINNET_API_URL, timeout_secs)
    }

    /// Create a new Bybit client with a custom base URL.
    pub fn with_base_url(base_url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get linear tickers (funding rate, mark price, next funding time).
    #[instrument(skip(self), name = "bybit_tickers")]
    pub async fn get_linear_tickers(&self) -> Result<ExchangeResponse, FeedError> {
        let url = format!("{}/v5/market/tickers?category=linear", self.base_url);
        let body: V5Response<ListResult<Value>> = get_json(&self.http, &url).await?;
        let list = body.into_result()?.list;

        debug!("Fetched {} Bybit linear tickers", list.len());
        ExchangeResponse::from_value(Value::Array(list)).ok_or_else(|| FeedError::Decode {
            url,
            reason: "expected a ticker list".to_string(),
        })
    }

    /// Get funding intervals (converted from minutes to hours).
    #[instrument(skip(self), name = "bybit_instruments")]
    pub async fn get_funding_intervals(&self) -> Result<FundingIntervals, FeedError> {
        let url = format!(
            "{}/v5/market/instruments-info?category=linear&limit=1000",
            self.base_url
        );
        let body: V5Response<ListResult<InstrumentInfo>> = get_json(&self.http, &url).await?;

        let intervals: FundingIntervals = body
            .into_result()?
            .list
            .into_iter()
            .filter_map(|info| {
                let hours = info.funding_interval? / 60;
                if hours == 0 {
                    return None;
                }
                Some((strip_quote_suffix(&info.symbol)?, hours))
            })
            .collect();

        debug!("Fetched {} Bybit funding intervals", intervals.len());
        Ok(intervals)
    }
}

#[async_trait]
impl RateFeed for BybitClient {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Bybit
    }

    async fn fetch_rates(&self) -> Result<ExchangeResponse, FeedError> {
        self.get_linear_tickers().await
    }

    async fn fetch_intervals(&self) -> Result<FundingIntervals, FeedError> {
        self.get_funding_intervals().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalizer::normalize;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_linear_tickers_normalize() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v5/market/tickers"))
            .and(query_param("category", "linear"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "retCode": 0,
                "retMsg": "OK",
                "result": {"category": "linear", "list": [
                    {"symbol": "BTCUSDT", "fundingRate": "-0.0002", "markPrice": "50010.5",
                     "nextFundingTime": "1700000000000"},
                    {"symbol": "BTCPERP", "fundingRate": "0.0001"}
                ]}
            })))
            .mount(&server)
            .await;

        let client = BybitClient::with_base_url(&server.uri(), 5).unwrap();
        let snapshot = normalize(&client.fetch_rates().await.unwrap());

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["BTC"].rate, dec!(-0.0002));
        assert_eq!(snapshot["BTC"].next_funding_time, Some(1_700_000_000_000));
    }

    #[tokio::test]
    async fn test_api_error_code_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v5/market/tickers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "retCode": 10006,
                "retMsg": "Too many visits!",
                "result": {}
            })))
            .mount(&server)
            .await;

        let client = BybitClient::with_base_url(&server.uri(), 5).unwrap();
        let err = client.fetch_rates().await.unwrap_err();
        assert!(matches!(err, FeedError::Api(ref msg) if msg.contains("10006")));
    }

    #[tokio::test]
    async fn test_intervals_in_hours() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v5/market/instruments-info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "retCode": 0,
                "retMsg": "OK",
                "result": {"list": [
                    {"symbol": "BTCUSDT", "fundingInterval": 480},
                    {"symbol": "WIFUSDT", "fundingInterval": 240},
                    {"symbol": "XYZUSDT", "fundingInterval": 0}
                ]}
            })))
            .mount(&server)
            .await;

        let client = BybitClient::with_base_url(&server.uri(), 5).unwrap();
        let intervals = client.fetch_intervals().await.unwrap();

        assert_eq!(intervals["BTC"], 8);
        assert_eq!(intervals["WIF"], 4);
        assert!(!intervals.contains_key("XYZ"));
    }
}
