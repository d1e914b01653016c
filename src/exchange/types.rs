//! Type definitions shared by the exchange feeds and the rate pipeline.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Exchange identifier.
///
/// Serialized in lowercase to match the backend's JSON keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    Binance,
    Bybit,
    CoinSwitch,
}

impl ExchangeId {
    /// All supported exchanges.
    pub const ALL: [ExchangeId; 3] = [ExchangeId::Binance, ExchangeId::Bybit, ExchangeId::CoinSwitch];

    /// Lowercase key used in backend payloads and config.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Binance => "binance",
            ExchangeId::Bybit => "bybit",
            ExchangeId::CoinSwitch => "coinswitch",
        }
    }

    /// Short code for table display (2-3 chars).
    pub fn short_code(&self) -> &'static str {
        match self {
            ExchangeId::Binance => "BN",
            ExchangeId::Bybit => "BY",
            ExchangeId::CoinSwitch => "CS",
        }
    }

    /// Perpetual trading page for a canonical symbol.
    pub fn trade_url(&self, symbol: &str) -> String {
        match self {
            ExchangeId::Binance => format!("https://www.binance.com/en/futures/{}USDT", symbol),
            ExchangeId::Bybit => format!("https://www.bybit.com/trade/usdt/{}USDT", symbol),
            ExchangeId::CoinSwitch => format!("https://coinswitch.co/pro/futures/{}USDT", symbol),
        }
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeId::Binance => write!(f, "Binance"),
            ExchangeId::Bybit => write!(f, "Bybit"),
            ExchangeId::CoinSwitch => write!(f, "CoinSwitch"),
        }
    }
}

impl FromStr for ExchangeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binance" => Ok(ExchangeId::Binance),
            "bybit" => Ok(ExchangeId::Bybit),
            "coinswitch" => Ok(ExchangeId::CoinSwitch),
            other => Err(format!("unknown exchange: {}", other)),
        }
    }
}

/// Normalized funding data for one symbol on one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateRecord {
    /// Canonical base asset (e.g., "BTC")
    pub symbol: String,
    /// Funding rate as a fraction (0.0001 = 0.01%); positive = longs pay shorts
    pub rate: Decimal,
    /// Last known mark price in quote currency
    pub mark_price: Option<Decimal>,
    /// Next funding settlement (epoch milliseconds)
    pub next_funding_time: Option<i64>,
    /// Hours between funding settlements, if the feed reports it
    pub funding_interval_hours: Option<u32>,
}

impl RateRecord {
    /// Create a record with only a symbol and a rate.
    pub fn new(symbol: impl Into<String>, rate: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            rate,
            mark_price: None,
            next_funding_time: None,
            funding_interval_hours: None,
        }
    }

    /// Set the mark price.
    pub fn with_mark_price(mut self, mark_price: Decimal) -> Self {
        self.mark_price = Some(mark_price);
        self
    }

    /// Set the next funding time.
    pub fn with_next_funding_time(mut self, next_funding_time: i64) -> Self {
        self.next_funding_time = Some(next_funding_time);
        self
    }

    /// Set the funding interval.
    pub fn with_interval(mut self, hours: u32) -> Self {
        self.funding_interval_hours = Some(hours);
        self
    }
}

/// One exchange's normalized rates for a single poll, keyed by canonical symbol.
pub type RateSnapshot = BTreeMap<String, RateRecord>;

/// A raw ticker object as delivered by an exchange.
pub type RawTicker = Map<String, Value>;

/// Funding intervals (hours) reported by one exchange, keyed by canonical symbol.
pub type FundingIntervals = HashMap<String, u32>;

/// Funding intervals across exchanges: symbol -> exchange -> hours.
///
/// Same shape as the backend's `/api/metadata` response.
pub type IntervalMetadata = HashMap<String, HashMap<ExchangeId, u32>>;

/// Raw exchange response, in one of the two shapes exchanges use.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeResponse {
    /// List of ticker objects, each carrying its own symbol field
    List(Vec<RawTicker>),
    /// Map of pair name -> ticker object
    Map(Vec<(String, RawTicker)>),
}

impl ExchangeResponse {
    /// Classify a JSON value as a list or map response.
    ///
    /// Non-object entries are skipped; scalars yield `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(ExchangeResponse::List(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(obj) => Some(obj),
                        _ => None,
                    })
                    .collect(),
            )),
            Value::Object(map) => Some(ExchangeResponse::Map(
                map.into_iter()
                    .filter_map(|(pair, item)| match item {
                        Value::Object(obj) => Some((pair, obj)),
                        _ => None,
                    })
                    .collect(),
            )),
            _ => None,
        }
    }

    /// Number of raw entries in the response.
    pub fn len(&self) -> usize {
        match self {
            ExchangeResponse::List(items) => items.len(),
            ExchangeResponse::Map(items) => items.len(),
        }
    }

    /// Whether the response carries no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ExchangeResponse {
    fn default() -> Self {
        ExchangeResponse::List(Vec::new())
    }
}
