//! Rate normalizer: raw exchange tickers -> canonical `RateRecord`s.
//!
//! Exchanges disagree on field names and on how pairs are spelled
//! (`BTCUSDT`, `BTC/USDT`, `BTC/INR`). Everything is resolved here, once,
//! through ordered alias tables; nothing downstream sees raw tickers.

use crate::exchange::{ExchangeId, ExchangeResponse, RateRecord, RateSnapshot, RawTicker};
use crate::utils::decimal::{decimal_from_json, i64_from_json};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::trace;

/// Recognized quote suffixes, longest first so `/USDT` wins over `USDT`.
pub const QUOTE_SUFFIXES: [&str; 4] = ["/USDT", "/INR", "USDT", "INR"];

/// Symbol field aliases for list-shaped responses.
pub const SYMBOL_FIELDS: [&str; 3] = ["symbol", "pair", "s"];

/// Funding rate aliases, camelCase before snake_case.
pub const RATE_FIELDS: [&str; 4] = ["lastFundingRate", "fundingRate", "funding_rate", "r"];

/// Mark price aliases; last traded price is the fallback for spot pairs.
pub const MARK_PRICE_FIELDS: [&str; 5] = ["markPrice", "mark_price", "p", "lastPrice", "last_price"];

/// Next funding time aliases (epoch milliseconds).
pub const NEXT_FUNDING_FIELDS: [&str; 3] = ["nextFundingTime", "next_funding_time", "T"];

/// Funding interval aliases (hours).
pub const INTERVAL_FIELDS: [&str; 2] = ["fundingIntervalHours", "funding_interval_hours"];

/// Strip exactly one recognized quote suffix from a pair name.
///
/// Returns `None` when no recognized quote matches or the base is empty.
pub fn strip_quote_suffix(raw: &str) -> Option<String> {
    let upper = raw.trim().to_ascii_uppercase();

    QUOTE_SUFFIXES.iter().find_map(|suffix| {
        let base = upper.strip_suffix(suffix)?;
        if base.is_empty() {
            None
        } else {
            Some(base.to_string())
        }
    })
}

/// Return the first alias that is present and parses.
fn first_field<T>(ticker: &RawTicker, aliases: &[&str], read: fn(&Value) -> Option<T>) -> Option<T> {
    aliases
        .iter()
        .find_map(|key| ticker.get(*key).and_then(read))
}

fn read_str(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string).filter(|s| !s.is_empty())
}

fn read_interval(value: &Value) -> Option<u32> {
    i64_from_json(value)
        .filter(|h| *h > 0)
        .and_then(|h| u32::try_from(h).ok())
}

/// Build a record for an already-canonical symbol from a raw ticker.
///
/// A missing rate means "no funding" (spot pair) and becomes zero.
pub fn record_from_ticker(symbol: String, ticker: &RawTicker) -> RateRecord {
    RateRecord {
        symbol,
        rate: first_field(ticker, &RATE_FIELDS, decimal_from_json).unwrap_or(Decimal::ZERO),
        mark_price: first_field(ticker, &MARK_PRICE_FIELDS, decimal_from_json),
        next_funding_time: first_field(ticker, &NEXT_FUNDING_FIELDS, i64_from_json),
        funding_interval_hours: first_field(ticker, &INTERVAL_FIELDS, read_interval),
    }
}

/// Normalize a raw exchange response into a snapshot keyed by canonical symbol.
///
/// Entries with no symbol or an unrecognized quote are dropped. When two
/// pairs map to the same base, the later entry wins.
pub fn normalize(response: &ExchangeResponse) -> RateSnapshot {
    let mut snapshot = RateSnapshot::new();

    let mut accept = |raw_symbol: &str, ticker: &RawTicker| match strip_quote_suffix(raw_symbol) {
        Some(symbol) => {
            let record = record_from_ticker(symbol.clone(), ticker);
            snapshot.insert(symbol, record);
        }
        None => trace!(raw_symbol, "Dropping pair without recognized quote"),
    };

    match response {
        ExchangeResponse::List(items) => {
            for ticker in items {
                match first_field(ticker, &SYMBOL_FIELDS, read_str) {
                    Some(raw_symbol) => accept(&raw_symbol, ticker),
                    None => trace!("Dropping ticker without symbol"),
                }
            }
        }
        ExchangeResponse::Map(entries) => {
            for (pair, ticker) in entries {
                accept(pair, ticker);
            }
        }
    }

    snapshot
}

/// Normalize the backend's `/api/rates` body.
///
/// Shape: `{ "<exchange>": { "<SYMBOL>": { rate, markPrice, nextFundingTime } }, ... }`.
/// Symbols are already canonical; unknown top-level keys (e.g. `source`)
/// are ignored.
pub fn normalize_backend_rates(body: &Value) -> Vec<(ExchangeId, RateSnapshot)> {
    let Some(exchanges) = body.as_object() else {
        return Vec::new();
    };

    let mut snapshots = Vec::new();
    for (key, rates) in exchanges {
        let Ok(exchange) = key.parse::<ExchangeId>() else {
            continue;
        };
        let Some(rates) = rates.as_object() else {
            continue;
        };

        let snapshot: RateSnapshot = rates
            .iter()
            .filter_map(|(symbol, value)| {
                let symbol = symbol.trim().to_ascii_uppercase();
                let ticker = value.as_object()?;
                if symbol.is_empty() {
                    return None;
                }
                let mut record = record_from_ticker(symbol.clone(), ticker);
                if let Some(rate) = ticker.get("rate").and_then(decimal_from_json) {
                    record.rate = rate;
                }
                Some((symbol, record))
            })
            .collect();

        snapshots.push((exchange, snapshot));
    }

    snapshots.sort_by_key(|(exchange, _)| *exchange);
    snapshots
}
