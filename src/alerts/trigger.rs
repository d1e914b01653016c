//! Funding-window alert trigger.
//!
//! A symbol fires when its cross-exchange difference is large enough and
//! its next settlement is close. Each (symbol, funding time) fires at most
//! once; the next settlement makes the symbol eligible again.

use crate::config::AlertsConfig;
use crate::pipeline::calculator::{compute_symbol, ComparisonPair, ComputedView};
use crate::pipeline::MarketState;
use crate::utils::time::format_countdown;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};

/// Trigger thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertSettings {
    /// Minimum `|diff|` in percentage points (inclusive)
    pub threshold_pct: Decimal,
    /// How long before settlement a symbol becomes eligible
    pub lead_time_ms: i64,
}

impl From<&AlertsConfig> for AlertSettings {
    fn from(config: &AlertsConfig) -> Self {
        Self {
            threshold_pct: config.threshold_pct,
            lead_time_ms: i64::from(config.lead_time_minutes) * 60_000,
        }
    }
}

/// Last alerted funding time per symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertLedger {
    entries: HashMap<String, i64>,
}

impl AlertLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted entries.
    pub fn from_map(entries: HashMap<String, i64>) -> Self {
        Self { entries }
    }

    /// Whether this exact settlement was already alerted for the symbol.
    pub fn already_alerted(&self, symbol: &str, funding_time: i64) -> bool {
        self.entries.get(symbol) == Some(&funding_time)
    }

    pub fn record(&mut self, symbol: &str, funding_time: i64) {
        self.entries.insert(symbol.to_string(), funding_time);
    }

    pub fn last_alerted(&self, symbol: &str) -> Option<i64> {
        self.entries.get(symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A fired alert, ready to hand to a notifier.
#[derive(Debug, Clone, PartialEq)]
pub struct FundingAlert {
    pub symbol: String,
    pub diff: Decimal,
    pub spread: Decimal,
    pub apr: Decimal,
    pub next_funding_time: i64,
    pub message: String,
}

/// Evaluates market state against the alert thresholds.
#[derive(Debug, Clone)]
pub struct AlertTrigger {
    settings: AlertSettings,
    pair: ComparisonPair,
    ledger: AlertLedger,
}

impl AlertTrigger {
    pub fn new(settings: AlertSettings, pair: ComparisonPair) -> Self {
        Self::with_ledger(settings, pair, AlertLedger::new())
    }

    /// Start from a previously persisted ledger.
    pub fn with_ledger(settings: AlertSettings, pair: ComparisonPair, ledger: AlertLedger) -> Self {
        Self {
            settings,
            pair,
            ledger,
        }
    }

    pub fn ledger(&self) -> &AlertLedger {
        &self.ledger
    }

    pub fn settings(&self) -> &AlertSettings {
        &self.settings
    }

    /// Evaluate every symbol and return the alerts that fire now.
    ///
    /// The ledger is updated for each fired alert before returning, so a
    /// failed delivery is not retried for the same settlement.
    pub fn evaluate(&mut self, market: &MarketState, now_ms: i64) -> Vec<FundingAlert> {
        let mut fired = Vec::new();

        for state in market.iter() {
            let view = compute_symbol(market, state, &self.pair);
            let Some(funding_time) = self.eligible_funding_time(&view, now_ms) else {
                continue;
            };

            if self.ledger.already_alerted(&view.symbol, funding_time) {
                debug!(symbol = %view.symbol, funding_time, "Alert already sent for this settlement");
                continue;
            }

            self.ledger.record(&view.symbol, funding_time);

            info!(
                symbol = %view.symbol,
                diff = %view.diff,
                funding_time,
                "Funding alert triggered"
            );

            fired.push(FundingAlert {
                message: format_message(&view, &self.pair, funding_time, now_ms),
                symbol: view.symbol,
                diff: view.diff,
                spread: view.spread,
                apr: view.apr,
                next_funding_time: funding_time,
            });
        }

        fired
    }

    fn eligible_funding_time(&self, view: &ComputedView, now_ms: i64) -> Option<i64> {
        if !view.is_complete() || view.diff.abs() < self.settings.threshold_pct {
            return None;
        }

        let funding_time = view.next_funding_time?;
        let remaining = funding_time.saturating_sub(now_ms);
        (remaining > 0 && remaining <= self.settings.lead_time_ms).then_some(funding_time)
    }
}

fn format_message(view: &ComputedView, pair: &ComparisonPair, funding_time: i64, now_ms: i64) -> String {
    let mut message = format!(
        "*Funding Alert: {}*\n\n{}: {}%\n{}: {}%\nDiff: {}%\nAPR: {}%\nFunding in: {}",
        view.symbol,
        pair.exchange_a,
        view.pct_a.round_dp(4),
        pair.exchange_b,
        view.pct_b.round_dp(4),
        view.diff.round_dp(4),
        view.apr.round_dp(2),
        format_countdown(funding_time, now_ms),
    );

    if let Some((long, short)) = view.suggested_legs(pair) {
        message.push_str(&format!("\n\nLong {} / Short {}", long, short));
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{ExchangeId, RateRecord, RateSnapshot};
    use rust_decimal_macros::dec;

    const NOW: i64 = 1_700_000_000_000;

    fn snapshot(symbol: &str, rate: Decimal, funding_time: i64) -> RateSnapshot {
        let record = RateRecord::new(symbol, rate).with_next_funding_time(funding_time);
        RateSnapshot::from([(symbol.to_string(), record)])
    }

    fn market(rate_a: Decimal, rate_b: Decimal, funding_time: i64) -> MarketState {
        MarketState::new()
            .merge(ExchangeId::Binance, &snapshot("BTC", rate_a, funding_time))
            .merge(ExchangeId::Bybit, &snapshot("BTC", rate_b, funding_time))
    }

    fn trigger() -> AlertTrigger {
        AlertTrigger::new(
            AlertSettings {
                threshold_pct: dec!(0.5),
                lead_time_ms: 10 * 60_000,
            },
            ComparisonPair::default(),
        )
    }

    #[test]
    fn test_fires_once_per_funding_time() {
        let mut trigger = trigger();
        // diff = 0.6 - 0 = 0.6pp, settlement 5 minutes away
        let state = market(dec!(0.006), dec!(0), NOW + 5 * 60_000);

        let first = trigger.evaluate(&state, NOW);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].symbol, "BTC");
        assert_eq!(first[0].diff, dec!(0.6));
        assert!(first[0].message.contains("Funding in: 5m 00s"));

        let second = trigger.evaluate(&state, NOW + 1_000);
        assert!(second.is_empty());
    }

    #[test]
    fn test_next_settlement_is_eligible_again() {
        let mut trigger = trigger();
        let first_window = NOW + 5 * 60_000;
        assert_eq!(trigger.evaluate(&market(dec!(0.006), dec!(0), first_window), NOW).len(), 1);

        let next_window = first_window + 8 * 3_600_000;
        let later = next_window - 60_000;
        let fired = trigger.evaluate(&market(dec!(0.006), dec!(0), next_window), later);
        assert_eq!(fired.len(), 1);
        assert_eq!(trigger.ledger().last_alerted("BTC"), Some(next_window));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut trigger = trigger();
        let state = market(dec!(0), dec!(0.005), NOW + 60_000);
        let fired = trigger.evaluate(&state, NOW);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].diff, dec!(-0.5));
    }

    #[test]
    fn test_below_threshold_or_outside_window() {
        let mut trigger = trigger();
        assert!(trigger
            .evaluate(&market(dec!(0.0049), dec!(0), NOW + 60_000), NOW)
            .is_empty());
        // Too early
        assert!(trigger
            .evaluate(&market(dec!(0.006), dec!(0), NOW + 11 * 60_000), NOW)
            .is_empty());
        // Already settled
        assert!(trigger
            .evaluate(&market(dec!(0.006), dec!(0), NOW), NOW)
            .is_empty());
        assert!(trigger.ledger().is_empty());
    }

    #[test]
    fn test_single_sided_symbol_never_fires() {
        let mut trigger = trigger();
        let state = MarketState::new().merge(
            ExchangeId::Binance,
            &snapshot("BTC", dec!(0.01), NOW + 60_000),
        );
        assert!(trigger.evaluate(&state, NOW).is_empty());
    }

    #[test]
    fn test_persisted_ledger_suppresses_duplicate() {
        let funding_time = NOW + 60_000;
        let ledger = AlertLedger::from_map(HashMap::from([("BTC".to_string(), funding_time)]));
        let mut trigger = AlertTrigger::with_ledger(
            AlertSettings {
                threshold_pct: dec!(0.5),
                lead_time_ms: 600_000,
            },
            ComparisonPair::default(),
            ledger,
        );

        assert!(trigger
            .evaluate(&market(dec!(0.006), dec!(0), funding_time), NOW)
            .is_empty());
    }

    #[test]
    fn test_settings_from_config() {
        let settings = AlertSettings::from(&AlertsConfig::default());
        assert_eq!(settings.threshold_pct, dec!(0.5));
        assert_eq!(settings.lead_time_ms, 600_000);
    }

    #[test]
    fn test_window_upper_bound_is_inclusive() {
        let lead = 10 * 60_000;

        let mut at_bound = trigger();
        assert_eq!(at_bound.evaluate(&market(dec!(0.006), dec!(0), NOW + lead), NOW).len(), 1);

        let mut past_bound = trigger();
        assert!(past_bound
            .evaluate(&market(dec!(0.006), dec!(0), NOW + lead + 1), NOW)
            .is_empty());
    }

    #[test]
    fn test_extreme_timestamps_do_not_fire() {
        let mut trigger = trigger();
        assert!(trigger
            .evaluate(&market(dec!(0.006), dec!(0), i64::MIN), NOW)
            .is_empty());
        assert!(trigger
            .evaluate(&market(dec!(0.006), dec!(0), i64::MAX), i64::MIN)
            .is_empty());
    }
}
