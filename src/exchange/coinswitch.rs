//! CoinSwitch all-pairs ticker client.
//!
//! The endpoint returns `{ "data": ... }` where `data` is either a map of
//! pair -> stats or a list of ticker objects, depending on the deployment.
//! Spot pairs carry no funding field and normalize to zero-rate records.

use super::http::{build_client, get_json};
use super::traits::{FeedError, RateFeed};
use super::types::*;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

/// Default all-pairs ticker endpoint.
pub const DEFAULT_TICKER_URL: &str =
    "https://coinswitch.co/trade/api/v2/24hr/all-pairs/ticker?exchange=coinswitchx";

#[derive(Debug, Clone, Deserialize)]
struct TickerEnvelope {
    #[serde(default)]
    data: Value,
}

/// CoinSwitch ticker client.
#[derive(Debug, Clone)]
pub struct CoinSwitchClient {
    http: Client,
    ticker_url: String,
}

impl CoinSwitchClient {
    /// Create a client for the given ticker URL.
    pub fn new(ticker_url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout_secs)?,
            ticker_url: ticker_url.to_string(),
        })
    }

    /// Fetch all pair tickers.
    #[instrument(skip(self), name = "coinswitch_tickers")]
    pub async fn get_all_pairs(&self) -> Result<ExchangeResponse, FeedError> {
        let envelope: TickerEnvelope = get_json(&self.http, &self.ticker_url).await?;

        // A missing or null `data` is an empty poll, not a failure
        let response = ExchangeResponse::from_value(envelope.data).unwrap_or_default();
        debug!("Fetched {} CoinSwitch tickers", response.len());
        Ok(response)
    }
}

#[async_trait]
impl RateFeed for CoinSwitchClient {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::CoinSwitch
    }

    async fn fetch_rates(&self) -> Result<ExchangeResponse, FeedError> {
        self.get_all_pairs().await
    }
}
