//! Plain-text rendering of ranked opportunities.

use crate::pipeline::{ComparisonPair, ComputedView, Page};
use crate::utils::time::format_countdown;
use std::fmt::Write;

fn rate_cell(pct: rust_decimal::Decimal, observed: bool) -> String {
    if observed {
        format!("{:+.4}%", pct)
    } else {
        "-".to_string()
    }
}

fn interval_cell(view: &ComputedView) -> String {
    if view.interval_a == view.interval_b {
        format!("{}h", view.interval_a)
    } else {
        format!("{}h/{}h", view.interval_a, view.interval_b)
    }
}

/// One table row.
pub fn format_row(view: &ComputedView, now_ms: i64) -> String {
    let countdown = view
        .next_funding_time
        .map(|t| format_countdown(t, now_ms))
        .unwrap_or_else(|| "-".to_string());
    let mark = view
        .mark_price
        .map(|p| p.normalize().to_string())
        .unwrap_or_else(|| "-".to_string());

    format!(
        "{:<12} {:>11} {:>11} {:>9} {:>9} {:>10} {:>7} {:>9} {:>14}",
        view.symbol,
        rate_cell(view.pct_a, view.rate_a.is_some()),
        rate_cell(view.pct_b, view.rate_b.is_some()),
        format!("{:+.4}", view.diff),
        format!("{:.4}", view.spread),
        format!("{:.2}%", view.apr),
        interval_cell(view),
        countdown,
        mark,
    )
}

/// Render a page as a fixed-width table.
pub fn format_page(page: &Page, pair: &ComparisonPair, now_ms: i64) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<12} {:>11} {:>11} {:>9} {:>9} {:>10} {:>7} {:>9} {:>14}",
        "SYMBOL",
        pair.exchange_a.short_code(),
        pair.exchange_b.short_code(),
        "DIFF",
        "SPREAD",
        "APR",
        "INT",
        "FUNDING",
        "MARK",
    );

    for view in &page.items {
        let _ = writeln!(out, "{}", format_row(view, now_ms));
    }

    let _ = write!(
        out,
        "Page {}/{} ({} symbols)",
        if page.total_pages == 0 { 0 } else { page.page + 1 },
        page.total_pages,
        page.total_items
    );
    out
}
