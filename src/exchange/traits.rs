//! Venue-agnostic traits for funding rate sources.
//!
//! Two seams are provided:
//! - [`RateFeed`]: a single exchange endpoint returning raw tickers
//! - [`RateSource`]: anything that yields normalized snapshots for one or
//!   more exchanges per poll (direct exchange polling, or the backend)

use super::types::*;
use crate::pipeline::normalizer::normalize;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure to obtain data from one feed on one poll.
///
/// Callers recover by treating the feed as empty for that tick.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("exchange rejected request: {0}")]
    Api(String),
    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// A single exchange endpoint that returns raw funding tickers.
#[async_trait]
pub trait RateFeed: Send + Sync {
    /// Returns the exchange this feed belongs to.
    fn exchange(&self) -> ExchangeId;

    /// Fetch the raw ticker response for all pairs.
    async fn fetch_rates(&self) -> Result<ExchangeResponse, FeedError>;

    /// Fetch funding intervals (hours) per canonical symbol.
    ///
    /// Exchanges without an interval endpoint report nothing.
    async fn fetch_intervals(&self) -> Result<FundingIntervals, FeedError> {
        Ok(FundingIntervals::new())
    }
}

/// A source of normalized per-exchange snapshots.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Fetch one snapshot per exchange.
    ///
    /// Exchanges that failed this poll are simply absent from the result.
    async fn fetch_snapshots(&self) -> Result<Vec<(ExchangeId, RateSnapshot)>, FeedError>;

    /// Fetch funding interval metadata for all exchanges.
    async fn fetch_intervals(&self) -> Result<IntervalMetadata, FeedError> {
        Ok(IntervalMetadata::new())
    }

    /// Fetch the set of symbols currently tradable on the execution venue.
    async fn fetch_tradable(&self) -> Result<HashSet<String>, FeedError> {
        Ok(HashSet::new())
    }
}

/// Polls exchange feeds directly and normalizes their responses.
pub struct DirectSource {
    feeds: Vec<Arc<dyn RateFeed>>,
    tradable: Option<Arc<super::BinanceClient>>,
}

impl DirectSource {
    /// Create a direct source over the given feeds.
    pub fn new(feeds: Vec<Arc<dyn RateFeed>>) -> Self {
        Self {
            feeds,
            tradable: None,
        }
    }

    /// Use a Binance client to load the tradable-symbol allowlist.
    pub fn with_tradable_client(mut self, client: Arc<super::BinanceClient>) -> Self {
        self.tradable = Some(client);
        self
    }
}

#[async_trait]
impl RateSource for DirectSource {
    fn name(&self) -> &str {
        "direct"
    }

    async fn fetch_snapshots(&self) -> Result<Vec<(ExchangeId, RateSnapshot)>, FeedError> {
        let results = join_all(self.feeds.iter().map(|feed| async move {
            (feed.exchange(), feed.fetch_rates().await)
        }))
        .await;

        let mut snapshots = Vec::with_capacity(results.len());
        for (exchange, result) in results {
            match result {
                Ok(response) => {
                    let snapshot = normalize(&response);
                    debug!(
                        exchange = %exchange,
                        raw = response.len(),
                        normalized = snapshot.len(),
                        "Normalized feed response"
                    );
                    snapshots.push((exchange, snapshot));
                }
                Err(e) => warn!(exchange = %exchange, "Feed unavailable this tick: {}", e),
            }
        }

        Ok(snapshots)
    }

    async fn fetch_intervals(&self) -> Result<IntervalMetadata, FeedError> {
        let results = join_all(self.feeds.iter().map(|feed| async move {
            (feed.exchange(), feed.fetch_intervals().await)
        }))
        .await;

        let mut metadata = IntervalMetadata::new();
        for (exchange, result) in results {
            match result {
                Ok(intervals) => {
                    for (symbol, hours) in intervals {
                        metadata.entry(symbol).or_default().insert(exchange, hours);
                    }
                }
                Err(e) => warn!(exchange = %exchange, "Interval metadata unavailable: {}", e),
            }
        }

        Ok(metadata)
    }

    async fn fetch_tradable(&self) -> Result<HashSet<String>, FeedError> {
        match &self.tradable {
            Some(client) => Ok(client.get_tradable_symbols().await?.into_iter().collect()),
            None => Ok(HashSet::new()),
        }
    }
}
