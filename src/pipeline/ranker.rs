//! Opportunity ranking, filtering and pagination.

use super::calculator::ComputedView;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Symbols kept per refresh cycle, by absolute spread.
pub const DEFAULT_TOP_N: usize = 200;

/// Rows per page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// `|diff|` above which a row counts as a high difference.
pub const DEFAULT_HIGH_DIFF_THRESHOLD: Decimal = dec!(0.5);

/// Column to sort on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Symbol,
    Spread,
    Diff,
    Apr,
    RateA,
    RateB,
    MarkPrice,
    NextFundingTime,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "symbol" => Ok(SortKey::Symbol),
            "spread" => Ok(SortKey::Spread),
            "diff" => Ok(SortKey::Diff),
            "apr" => Ok(SortKey::Apr),
            "rate_a" => Ok(SortKey::RateA),
            "rate_b" => Ok(SortKey::RateB),
            "mark_price" => Ok(SortKey::MarkPrice),
            "next_funding_time" => Ok(SortKey::NextFundingTime),
            other => Err(format!("unknown sort key: {}", other)),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Asc),
            "desc" | "descending" => Ok(SortDirection::Desc),
            other => Err(format!("unknown sort direction: {}", other)),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "asc"),
            SortDirection::Desc => write!(f, "desc"),
        }
    }
}

/// Filters applied to computed views. All conditions must hold.
#[derive(Debug, Clone)]
pub struct RankFilters {
    /// Inclusive lower bound on `spread` (percentage points)
    pub min_spread: Decimal,
    /// Case-insensitive substring of the symbol
    pub search_query: String,
    /// Keep only rows with `|diff| > high_diff_threshold`
    pub high_diff_only: bool,
    pub high_diff_threshold: Decimal,
    /// Tradable allowlist. `None` = unrestricted; an empty set means the
    /// list has not loaded yet and filters nothing.
    pub tradable: Option<HashSet<String>>,
}

impl Default for RankFilters {
    fn default() -> Self {
        Self {
            min_spread: Decimal::ZERO,
            search_query: String::new(),
            high_diff_only: false,
            high_diff_threshold: DEFAULT_HIGH_DIFF_THRESHOLD,
            tradable: None,
        }
    }
}

impl RankFilters {
    /// Whether a view passes every filter.
    pub fn matches(&self, view: &ComputedView) -> bool {
        if view.spread < self.min_spread {
            return false;
        }

        if !self.search_query.is_empty()
            && !view
                .symbol
                .to_lowercase()
                .contains(&self.search_query.to_lowercase())
        {
            return false;
        }

        if self.high_diff_only && view.diff.abs() <= self.high_diff_threshold {
            return false;
        }

        match &self.tradable {
            Some(allowed) if !allowed.is_empty() => allowed.contains(&view.symbol),
            _ => true,
        }
    }
}

fn compare_by(key: SortKey, a: &ComputedView, b: &ComputedView) -> Ordering {
    match key {
        SortKey::Symbol => a.symbol.cmp(&b.symbol),
        SortKey::Spread => a.spread.cmp(&b.spread),
        SortKey::Diff => a.diff.cmp(&b.diff),
        SortKey::Apr => a.apr.cmp(&b.apr),
        SortKey::RateA => a.pct_a.cmp(&b.pct_a),
        SortKey::RateB => a.pct_b.cmp(&b.pct_b),
        SortKey::MarkPrice => a.mark_price.cmp(&b.mark_price),
        SortKey::NextFundingTime => a.next_funding_time.cmp(&b.next_funding_time),
    }
}

/// Keep the `n` symbols with the largest absolute spread.
///
/// Applied once per refresh cycle, before any user filter. The result is
/// ordered by spread, largest first; equal spreads keep input order.
pub fn cap_by_spread(mut views: Vec<ComputedView>, n: usize) -> Vec<ComputedView> {
    views.sort_by(|a, b| b.spread.abs().cmp(&a.spread.abs()));
    views.truncate(n);
    views
}

/// Filter and sort views.
///
/// The sort is stable: rows comparing equal keep their input order. Fed the
/// output of [`cap_by_spread`], ties therefore fall back to largest spread
/// first, not to symbol order.
pub fn rank(
    views: &[ComputedView],
    key: SortKey,
    direction: SortDirection,
    filters: &RankFilters,
) -> Vec<ComputedView> {
    let mut ranked: Vec<ComputedView> = views
        .iter()
        .filter(|v| filters.matches(v))
        .cloned()
        .collect();

    ranked.sort_by(|a, b| match direction {
        SortDirection::Asc => compare_by(key, a, b),
        SortDirection::Desc => compare_by(key, b, a),
    });

    ranked
}

/// One page of ranked rows.
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<ComputedView>,
    /// Zero-based page index
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

/// Slice a ranked list into a fixed-size page.
///
/// Out-of-range pages are empty; resetting the index is the caller's job.
pub fn paginate(ranked: &[ComputedView], page: usize, page_size: usize) -> Page {
    let page_size = page_size.max(1);
    let total_items = ranked.len();
    let total_pages = total_items.div_ceil(page_size);

    let start = page.saturating_mul(page_size).min(total_items);
    let end = (start + page_size).min(total_items);

    Page {
        items: ranked[start..end].to_vec(),
        page,
        page_size,
        total_items,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(symbol: &str, spread: Decimal, diff: Decimal, apr: Decimal) -> ComputedView {
        ComputedView {
            symbol: symbol.to_string(),
            rate_a: Some(Decimal::ZERO),
            rate_b: Some(Decimal::ZERO),
            pct_a: diff,
            pct_b: Decimal::ZERO,
            diff,
            spread,
            apr,
            interval_a: 8,
            interval_b: 8,
            freq_per_day: dec!(3),
            mark_price: None,
            next_funding_time: None,
        }
    }

    fn symbols(views: &[ComputedView]) -> Vec<&str> {
        views.iter().map(|v| v.symbol.as_str()).collect()
    }

    #[test]
    fn test_min_spread_is_inclusive() {
        let views = vec![
            view("AAA", dec!(0.03), dec!(0.03), dec!(32.85)),
            view("BBB", dec!(0.05), dec!(0.05), dec!(54.75)),
        ];
        let filters = RankFilters {
            min_spread: dec!(0.05),
            ..Default::default()
        };

        let ranked = rank(&views, SortKey::Spread, SortDirection::Desc, &filters);
        assert_eq!(symbols(&ranked), vec!["BBB"]);
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let views = vec![
            view("ZZZ", dec!(0.1), dec!(0.1), dec!(100)),
            view("AAA", dec!(0.2), dec!(0.2), dec!(200)),
            view("MMM", dec!(0.1), dec!(0.1), dec!(100)),
        ];

        let desc = rank(&views, SortKey::Apr, SortDirection::Desc, &RankFilters::default());
        assert_eq!(symbols(&desc), vec!["AAA", "ZZZ", "MMM"]);

        let asc = rank(&views, SortKey::Apr, SortDirection::Asc, &RankFilters::default());
        assert_eq!(symbols(&asc), vec!["ZZZ", "MMM", "AAA"]);
    }

    #[test]
    fn test_ties_after_cap_keep_spread_order() {
        // Equal APR, different spreads (different intervals)
        let views = vec![
            view("AAA", dec!(0.1), dec!(0.1), dec!(100)),
            view("BBB", dec!(0.3), dec!(0.3), dec!(100)),
            view("CCC", dec!(0.2), dec!(0.2), dec!(100)),
        ];

        let capped = cap_by_spread(views, 10);
        let ranked = rank(&capped, SortKey::Apr, SortDirection::Desc, &RankFilters::default());
        assert_eq!(symbols(&ranked), vec!["BBB", "CCC", "AAA"]);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let views = vec![
            view("BTC", dec!(0.1), dec!(0.1), dec!(1)),
            view("WBTC", dec!(0.1), dec!(0.1), dec!(1)),
            view("ETH", dec!(0.1), dec!(0.1), dec!(1)),
        ];
        let filters = RankFilters {
            search_query: "bt".to_string(),
            ..Default::default()
        };

        let ranked = rank(&views, SortKey::Symbol, SortDirection::Asc, &filters);
        assert_eq!(symbols(&ranked), vec!["BTC", "WBTC"]);
    }

    #[test]
    fn test_high_diff_only() {
        let views = vec![
            view("LOW", dec!(0.5), dec!(-0.5), dec!(1)),
            view("HIGH", dec!(0.6), dec!(-0.6), dec!(1)),
        ];
        let filters = RankFilters {
            high_diff_only: true,
            ..Default::default()
        };

        let ranked = rank(&views, SortKey::Symbol, SortDirection::Asc, &filters);
        assert_eq!(symbols(&ranked), vec!["HIGH"]);
    }

    #[test]
    fn test_empty_allowlist_filters_nothing() {
        let views = vec![
            view("BTC", dec!(0.1), dec!(0.1), dec!(1)),
            view("ETH", dec!(0.1), dec!(0.1), dec!(1)),
        ];

        let unloaded = RankFilters {
            tradable: Some(HashSet::new()),
            ..Default::default()
        };
        assert_eq!(
            rank(&views, SortKey::Symbol, SortDirection::Asc, &unloaded).len(),
            2
        );

        let loaded = RankFilters {
            tradable: Some(HashSet::from(["ETH".to_string()])),
            ..Default::default()
        };
        let ranked = rank(&views, SortKey::Symbol, SortDirection::Asc, &loaded);
        assert_eq!(symbols(&ranked), vec!["ETH"]);
    }

    #[test]
    fn test_cap_by_spread_keeps_largest() {
        let views = vec![
            view("A", dec!(0.01), dec!(0.01), dec!(1)),
            view("B", dec!(0.30), dec!(-0.30), dec!(1)),
            view("C", dec!(0.20), dec!(0.20), dec!(1)),
        ];

        let capped = cap_by_spread(views, 2);
        assert_eq!(symbols(&capped), vec!["B", "C"]);
    }

    #[test]
    fn test_paginate() {
        let views: Vec<ComputedView> = (0..45)
            .map(|i| view(&format!("S{:02}", i), dec!(0.1), dec!(0.1), dec!(1)))
            .collect();

        let first = paginate(&views, 0, DEFAULT_PAGE_SIZE);
        assert_eq!(first.items.len(), 20);
        assert_eq!(first.total_pages, 3);

        let last = paginate(&views, 2, DEFAULT_PAGE_SIZE);
        assert_eq!(last.items.len(), 5);
        assert_eq!(last.items[0].symbol, "S40");

        let beyond = paginate(&views, 7, DEFAULT_PAGE_SIZE);
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total_items, 45);
    }

    #[test]
    fn test_parse_sort_options() {
        assert_eq!("APR".parse::<SortKey>().unwrap(), SortKey::Apr);
        assert_eq!("next-funding-time".parse::<SortKey>().unwrap(), SortKey::NextFundingTime);
        assert_eq!("ascending".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert!("sideways".parse::<SortDirection>().is_err());
    }
}
