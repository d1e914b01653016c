//! Scripted rate feed for tests and offline runs.

use super::traits::{FeedError, RateFeed};
use super::types::*;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::debug;

/// Feed that returns a canned raw response.
///
/// The response can be swapped between polls with [`MockRateFeed::set_response`]
/// to simulate a live exchange.
pub struct MockRateFeed {
    exchange: ExchangeId,
    response: RwLock<Value>,
    error: Option<String>,
    intervals: FundingIntervals,
    calls: AtomicU64,
}

impl MockRateFeed {
    /// Create a feed that returns an empty ticker list.
    pub fn new(exchange: ExchangeId) -> Self {
        Self {
            exchange,
            response: RwLock::new(Value::Array(Vec::new())),
            error: None,
            intervals: FundingIntervals::new(),
            calls: AtomicU64::new(0),
        }
    }

    /// Return this raw body (list or map shaped) on every poll.
    pub fn with_response(self, body: Value) -> Self {
        self.set_response(body);
        self
    }

    /// Fail every poll with an API error.
    pub fn failing(mut self, message: &str) -> Self {
        self.error = Some(message.to_string());
        self
    }

    /// Report these funding intervals (hours).
    pub fn with_intervals<I, S>(mut self, intervals: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        self.intervals = intervals
            .into_iter()
            .map(|(symbol, hours)| (symbol.into(), hours))
            .collect();
        self
    }

    /// Replace the canned body for subsequent polls.
    pub fn set_response(&self, body: Value) {
        match self.response.write() {
            Ok(mut guard) => *guard = body,
            Err(poisoned) => *poisoned.into_inner() = body,
        }
    }

    /// Number of `fetch_rates` calls so far.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateFeed for MockRateFeed {
    fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    async fn fetch_rates(&self) -> Result<ExchangeResponse, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.error {
            return Err(FeedError::Api(message.clone()));
        }

        let body = match self.response.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        debug!(exchange = %self.exchange, "Serving scripted tickers");

        ExchangeResponse::from_value(body).ok_or_else(|| FeedError::Decode {
            url: format!("mock://{}", self.exchange.as_str()),
            reason: "scripted body is neither a list nor a map".to_string(),
        })
    }

    async fn fetch_intervals(&self) -> Result<FundingIntervals, FeedError> {
        match &self.error {
            Some(message) => Err(FeedError::Api(message.clone())),
            None => Ok(self.intervals.clone()),
        }
    }
}
