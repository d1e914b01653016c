//! Snapshot merger: folds per-exchange snapshots into one keyed market state.

use crate::exchange::{ExchangeId, IntervalMetadata, RateSnapshot};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

/// Last-known funding data for one exchange side of a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeQuote {
    /// Funding rate as a fraction
    pub rate: Decimal,
    pub mark_price: Option<Decimal>,
    /// Next settlement (epoch milliseconds)
    pub next_funding_time: Option<i64>,
    /// Interval reported alongside the rate, if any
    pub funding_interval_hours: Option<u32>,
}

/// Merged funding state for one canonical symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedSymbolState {
    pub symbol: String,
    /// Sparse: an exchange is present only once it has reported this symbol
    pub rates_by_exchange: BTreeMap<ExchangeId, ExchangeQuote>,
}

impl MergedSymbolState {
    fn new(symbol: String) -> Self {
        Self {
            symbol,
            rates_by_exchange: BTreeMap::new(),
        }
    }

    /// Quote for one exchange, if observed.
    pub fn quote(&self, exchange: ExchangeId) -> Option<&ExchangeQuote> {
        self.rates_by_exchange.get(&exchange)
    }

    /// Whether the exchange has reported this symbol at least once.
    pub fn is_observed(&self, exchange: ExchangeId) -> bool {
        self.rates_by_exchange.contains_key(&exchange)
    }

    /// Soonest reported next funding time across the given exchanges.
    pub fn next_funding_time_for(&self, exchanges: &[ExchangeId]) -> Option<i64> {
        exchanges
            .iter()
            .filter_map(|ex| self.quote(*ex)?.next_funding_time)
            .min()
    }

    /// Soonest reported next funding time across all observed exchanges.
    pub fn next_funding_time(&self) -> Option<i64> {
        self.rates_by_exchange
            .values()
            .filter_map(|q| q.next_funding_time)
            .min()
    }

    /// Mark price, preferring the exchanges in the given order.
    pub fn mark_price(&self, preference: &[ExchangeId]) -> Option<Decimal> {
        preference
            .iter()
            .find_map(|ex| self.quote(*ex)?.mark_price)
            .or_else(|| self.rates_by_exchange.values().find_map(|q| q.mark_price))
    }
}

/// All merged symbol states plus interval metadata.
///
/// Owned by the refresh loop and passed explicitly to each pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketState {
    symbols: BTreeMap<String, MergedSymbolState>,
    interval_hints: HashMap<String, HashMap<ExchangeId, u32>>,
}

impl MarketState {
    /// Create an empty market state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a snapshot, returning the next state.
    pub fn merge(mut self, exchange: ExchangeId, snapshot: &RateSnapshot) -> Self {
        self.merge_in_place(exchange, snapshot);
        self
    }

    /// Merge a snapshot into this state.
    ///
    /// Only `exchange`'s fields are overwritten. An interval is replaced only
    /// when the snapshot supplies one.
    pub fn merge_in_place(&mut self, exchange: ExchangeId, snapshot: &RateSnapshot) {
        for (symbol, record) in snapshot {
            let state = self
                .symbols
                .entry(symbol.clone())
                .or_insert_with(|| MergedSymbolState::new(symbol.clone()));

            let previous_interval = state
                .quote(exchange)
                .and_then(|q| q.funding_interval_hours);

            state.rates_by_exchange.insert(
                exchange,
                ExchangeQuote {
                    rate: record.rate,
                    mark_price: record.mark_price,
                    next_funding_time: record.next_funding_time,
                    funding_interval_hours: record.funding_interval_hours.or(previous_interval),
                },
            );
        }
    }

    /// Record interval metadata without creating symbols or observing sides.
    pub fn apply_intervals(&mut self, metadata: &IntervalMetadata) {
        for (symbol, by_exchange) in metadata {
            let hints = self.interval_hints.entry(symbol.clone()).or_default();
            for (exchange, hours) in by_exchange {
                if *hours > 0 {
                    hints.insert(*exchange, *hours);
                }
            }
        }
    }

    /// Funding interval for one side: quote value, then metadata hint.
    pub fn interval_for(&self, symbol: &str, exchange: ExchangeId) -> Option<u32> {
        self.symbols
            .get(symbol)
            .and_then(|s| s.quote(exchange))
            .and_then(|q| q.funding_interval_hours)
            .filter(|h| *h > 0)
            .or_else(|| {
                self.interval_hints
                    .get(symbol)
                    .and_then(|hints| hints.get(&exchange).copied())
            })
    }

    /// Look up one symbol.
    pub fn get(&self, symbol: &str) -> Option<&MergedSymbolState> {
        self.symbols.get(symbol)
    }

    /// Iterate symbols in ascending symbol order.
    pub fn iter(&self) -> impl Iterator<Item = &MergedSymbolState> {
        self.symbols.values()
    }

    /// Number of tracked symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether no symbol has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::RateRecord;
    use rust_decimal_macros::dec;

    fn snapshot(records: Vec<RateRecord>) -> RateSnapshot {
        records.into_iter().map(|r| (r.symbol.clone(), r)).collect()
    }

    #[test]
    fn test_merge_creates_symbol_lazily() {
        let state = MarketState::new().merge(
            ExchangeId::Binance,
            &snapshot(vec![RateRecord::new("BTC", dec!(0.0001))]),
        );

        let btc = state.get("BTC").unwrap();
        assert!(btc.is_observed(ExchangeId::Binance));
        assert!(!btc.is_observed(ExchangeId::Bybit));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let records = snapshot(vec![
            RateRecord::new("BTC", dec!(0.0001)).with_next_funding_time(1_000),
            RateRecord::new("ETH", dec!(-0.0003)).with_interval(4),
        ]);

        let once = MarketState::new().merge(ExchangeId::Bybit, &records);
        let twice = once.clone().merge(ExchangeId::Bybit, &records);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_preserves_other_exchange_fields() {
        let state = MarketState::new().merge(
            ExchangeId::Bybit,
            &snapshot(vec![RateRecord::new("BTC", dec!(-0.0002))
                .with_mark_price(dec!(50001))
                .with_next_funding_time(2_000)
                .with_interval(4)]),
        );
        let before = state.get("BTC").unwrap().quote(ExchangeId::Bybit).cloned();

        let state = state.merge(
            ExchangeId::Binance,
            &snapshot(vec![RateRecord::new("BTC", dec!(0.0001)).with_next_funding_time(1_000)]),
        );

        let btc = state.get("BTC").unwrap();
        assert_eq!(btc.quote(ExchangeId::Bybit).cloned(), before);
        assert_eq!(btc.quote(ExchangeId::Binance).unwrap().rate, dec!(0.0001));
    }

    #[test]
    fn test_next_funding_time_prefers_earliest() {
        let state = MarketState::new()
            .merge(
                ExchangeId::Binance,
                &snapshot(vec![RateRecord::new("BTC", dec!(0)).with_next_funding_time(5_000)]),
            )
            .merge(
                ExchangeId::Bybit,
                &snapshot(vec![
                    RateRecord::new("BTC", dec!(0)).with_next_funding_time(3_000),
                    RateRecord::new("ETH", dec!(0)),
                ]),
            );

        assert_eq!(state.get("BTC").unwrap().next_funding_time(), Some(3_000));
        assert_eq!(
            state
                .get("BTC")
                .unwrap()
                .next_funding_time_for(&[ExchangeId::Binance]),
            Some(5_000)
        );
        assert_eq!(state.get("ETH").unwrap().next_funding_time(), None);
    }

    #[test]
    fn test_interval_kept_when_not_supplied() {
        let state = MarketState::new()
            .merge(
                ExchangeId::Binance,
                &snapshot(vec![RateRecord::new("BTC", dec!(0.0001)).with_interval(4)]),
            )
            .merge(
                ExchangeId::Binance,
                &snapshot(vec![RateRecord::new("BTC", dec!(0.0002))]),
            );

        assert_eq!(state.interval_for("BTC", ExchangeId::Binance), Some(4));
        assert_eq!(state.interval_for("BTC", ExchangeId::Bybit), None);
    }

    #[test]
    fn test_interval_hints_do_not_create_symbols() {
        let mut metadata = IntervalMetadata::new();
        metadata
            .entry("SOL".to_string())
            .or_default()
            .insert(ExchangeId::Bybit, 1);

        let mut state = MarketState::new();
        state.apply_intervals(&metadata);

        assert!(state.is_empty());
        assert_eq!(state.interval_for("SOL", ExchangeId::Bybit), Some(1));
    }

    #[test]
    fn test_mark_price_preference() {
        let state = MarketState::new()
            .merge(
                ExchangeId::Bybit,
                &snapshot(vec![RateRecord::new("BTC", dec!(0)).with_mark_price(dec!(2))]),
            )
            .merge(
                ExchangeId::Binance,
                &snapshot(vec![RateRecord::new("BTC", dec!(0)).with_mark_price(dec!(1))]),
            );

        let btc = state.get("BTC").unwrap();
        assert_eq!(btc.mark_price(&[ExchangeId::Binance]), Some(dec!(1)));
        assert_eq!(btc.mark_price(&[ExchangeId::CoinSwitch]), Some(dec!(1)));
    }
}
