//! Spread / APR calculator.
//!
//! Rates arrive as fractions and are converted to percentage points exactly
//! once, here. Everything downstream (ranking, alerts, display) works in
//! percentage points.

use super::merger::{MarketState, MergedSymbolState};
use crate::exchange::ExchangeId;
use crate::utils::decimal::{safe_div, to_percent};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Interval assumed when an exchange does not report one.
pub const DEFAULT_FUNDING_INTERVAL_HOURS: u32 = 8;

/// The two exchanges being compared: `diff = A% - B%`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonPair {
    pub exchange_a: ExchangeId,
    pub exchange_b: ExchangeId,
}

impl ComparisonPair {
    pub fn new(exchange_a: ExchangeId, exchange_b: ExchangeId) -> Self {
        Self {
            exchange_a,
            exchange_b,
        }
    }

    pub fn as_array(&self) -> [ExchangeId; 2] {
        [self.exchange_a, self.exchange_b]
    }
}

impl Default for ComparisonPair {
    fn default() -> Self {
        Self::new(ExchangeId::Binance, ExchangeId::Bybit)
    }
}

/// Derived per-symbol view for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedView {
    pub symbol: String,
    /// Side A rate as a fraction, if observed
    pub rate_a: Option<Decimal>,
    /// Side B rate as a fraction, if observed
    pub rate_b: Option<Decimal>,
    /// Side A rate in percentage points (0 when unobserved)
    pub pct_a: Decimal,
    /// Side B rate in percentage points (0 when unobserved)
    pub pct_b: Decimal,
    /// Signed difference `pct_a - pct_b`
    pub diff: Decimal,
    /// `|diff|`
    pub spread: Decimal,
    /// Annualized projection in percent
    pub apr: Decimal,
    pub interval_a: u32,
    pub interval_b: u32,
    /// Settlements per day at the faster of the two intervals
    pub freq_per_day: Decimal,
    pub mark_price: Option<Decimal>,
    pub next_funding_time: Option<i64>,
}

impl ComputedView {
    /// Whether both compared exchanges have reported this symbol.
    pub fn is_complete(&self) -> bool {
        self.rate_a.is_some() && self.rate_b.is_some()
    }

    /// Suggested (long, short) legs: short the side paying the higher rate.
    pub fn suggested_legs(&self, pair: &ComparisonPair) -> Option<(ExchangeId, ExchangeId)> {
        if !self.is_complete() || self.diff == Decimal::ZERO {
            return None;
        }
        if self.diff > Decimal::ZERO {
            Some((pair.exchange_b, pair.exchange_a))
        } else {
            Some((pair.exchange_a, pair.exchange_b))
        }
    }
}

fn effective_interval(hours: Option<u32>) -> u32 {
    match hours {
        Some(h) if h > 0 && h <= 24 => h,
        _ => DEFAULT_FUNDING_INTERVAL_HOURS,
    }
}

/// `(pct_a, pct_b, diff, spread, apr)`, or `None` when a feed value
/// overflows decimal range.
fn spread_figures(
    rate_a: Option<Decimal>,
    rate_b: Option<Decimal>,
    freq_per_day: Decimal,
) -> Option<(Decimal, Decimal, Decimal, Decimal, Decimal)> {
    let pct_a = rate_a.map_or(Some(Decimal::ZERO), to_percent)?;
    let pct_b = rate_b.map_or(Some(Decimal::ZERO), to_percent)?;

    if rate_a.is_none() || rate_b.is_none() {
        return Some((pct_a, pct_b, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO));
    }

    let diff = pct_a.checked_sub(pct_b)?;
    let spread = diff.abs();
    let apr = spread.checked_mul(freq_per_day)?.checked_mul(dec!(365))?;
    Some((pct_a, pct_b, diff, spread, apr))
}

/// Compute the view for one symbol.
pub fn compute_symbol(
    market: &MarketState,
    state: &MergedSymbolState,
    pair: &ComparisonPair,
) -> ComputedView {
    let rate_a = state.quote(pair.exchange_a).map(|q| q.rate);
    let rate_b = state.quote(pair.exchange_b).map(|q| q.rate);

    let interval_a = effective_interval(market.interval_for(&state.symbol, pair.exchange_a));
    let interval_b = effective_interval(market.interval_for(&state.symbol, pair.exchange_b));
    let freq_per_day = safe_div(dec!(24), Decimal::from(interval_a.min(interval_b)));

    let (pct_a, pct_b, diff, spread, apr) = spread_figures(rate_a, rate_b, freq_per_day)
        .unwrap_or_else(|| {
            warn!(symbol = %state.symbol, "Rate out of range, zeroing row");
            Default::default()
        });

    ComputedView {
        symbol: state.symbol.clone(),
        rate_a,
        rate_b,
        pct_a,
        pct_b,
        diff,
        spread,
        apr,
        interval_a,
        interval_b,
        freq_per_day,
        mark_price: state.mark_price(&pair.as_array()),
        next_funding_time: state
            .next_funding_time_for(&pair.as_array())
            .or_else(|| state.next_funding_time()),
    }
}

/// Compute views for every tracked symbol, ordered by symbol.
///
/// Symbols with a missing side are kept with zero spread; filtering is the
/// ranker's job.
pub fn compute(market: &MarketState, pair: &ComparisonPair) -> Vec<ComputedView> {
    market
        .iter()
        .map(|state| compute_symbol(market, state, pair))
        .collect()
}

/// Estimated funding income for a budget split evenly across both legs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfitProjection {
    pub budget: Decimal,
    /// Income per funding settlement
    pub per_interval: Decimal,
    /// Income per day at the view's settlement frequency
    pub daily: Decimal,
}

impl ProfitProjection {
    /// Project income for `budget` (quote currency) on a computed view.
    pub fn for_budget(view: &ComputedView, budget: Decimal) -> Self {
        let per_interval = (budget / dec!(2))
            .checked_mul(view.spread)
            .map(|v| v / dec!(100))
            .unwrap_or(Decimal::ZERO);
        Self {
            budget,
            per_interval,
            daily: per_interval.checked_mul(view.freq_per_day).unwrap_or(Decimal::ZERO),
        }
    }
}
