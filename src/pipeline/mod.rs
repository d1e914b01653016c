//! Pure pipeline stages: normalize -> merge -> compute -> rank.
//!
//! Nothing in here performs I/O. The refresh loop owns the `MarketState`
//! and threads it through each stage.

pub mod calculator;
pub mod merger;
pub mod normalizer;
pub mod ranker;

pub use calculator::{compute, compute_symbol, ComparisonPair, ComputedView, ProfitProjection};
pub use merger::{ExchangeQuote, MarketState, MergedSymbolState};
pub use normalizer::{normalize, normalize_backend_rates, strip_quote_suffix};
pub use ranker::{
    cap_by_spread, paginate, rank, Page, RankFilters, SortDirection, SortKey,
};
