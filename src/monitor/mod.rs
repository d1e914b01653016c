//! Refresh loop.
//!
//! The monitor owns the `MarketState` and is the only writer to it. Rate
//! polls, metadata polls, the tradable-list poll and stream frames each
//! compute the next state and swap it in with a single assignment. Results
//! that arrive after teardown are dropped before they touch state.

pub mod report;

use crate::alerts::{AlertDispatcher, AlertTrigger};
use crate::config::{Config, PollingConfig};
use crate::exchange::{BinanceMarkPriceStream, ExchangeId, RateSource, RateSnapshot, StreamEvent};
use crate::persistence::AlertStore;
use crate::pipeline::{
    cap_by_spread, compute, compute_symbol, paginate, rank, ComparisonPair, ComputedView,
    MarketState, Page, RankFilters, SortDirection, SortKey,
};
use crate::utils::decimal::round_to_precision;
use crate::utils::time::now_ms;
use anyhow::Result;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// View settings for ranking and paging.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub pair: ComparisonPair,
    pub top_n: usize,
    pub page_size: usize,
    pub sort_key: SortKey,
    pub sort_direction: SortDirection,
    pub filters: RankFilters,
    pub restrict_to_tradable: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ScanSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pair: config.comparison,
            top_n: config.scanner.top_n,
            page_size: config.scanner.page_size,
            sort_key: config.scanner.sort_key,
            sort_direction: config.scanner.sort_direction,
            filters: RankFilters {
                min_spread: config.scanner.min_spread,
                high_diff_only: config.scanner.high_diff_only,
                high_diff_threshold: config.scanner.high_diff_threshold,
                ..Default::default()
            },
            restrict_to_tradable: config.scanner.restrict_to_tradable,
        }
    }
}

/// Clear `active` once `signal` resolves.
///
/// A signal listener that fails to install leaves the flag set.
pub async fn shutdown_on<F>(active: Arc<AtomicBool>, signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Shutdown signal received");
            active.store(false, Ordering::SeqCst);
        }
        Err(e) => error!("Shutdown signal unavailable: {}", e),
    }
}

/// Alert wiring: trigger, delivery and optional history store.
pub struct AlertPipeline {
    pub trigger: AlertTrigger,
    pub dispatcher: AlertDispatcher,
    pub store: Option<AlertStore>,
}

/// Owns market state and drives the refresh cycle.
pub struct Monitor {
    source: Arc<dyn RateSource>,
    settings: ScanSettings,
    market: MarketState,
    tradable: HashSet<String>,
    views: Vec<ComputedView>,
    alerts: Option<AlertPipeline>,
    active: Arc<AtomicBool>,
    page: usize,
}

impl Monitor {
    pub fn new(source: Arc<dyn RateSource>, settings: ScanSettings) -> Self {
        Self {
            source,
            settings,
            market: MarketState::new(),
            tradable: HashSet::new(),
            views: Vec::new(),
            alerts: None,
            active: Arc::new(AtomicBool::new(true)),
            page: 0,
        }
    }

    pub fn with_alerts(mut self, alerts: AlertPipeline) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Flag cleared on teardown. Clearing it stops the loop and discards
    /// in-flight results.
    pub fn active_flag(&self) -> Arc<AtomicBool> {
        self.active.clone()
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn market(&self) -> &MarketState {
        &self.market
    }

    /// Current view of one symbol, unaffected by ranking filters.
    pub fn view(&self, symbol: &str) -> Option<ComputedView> {
        self.market
            .get(symbol)
            .map(|state| compute_symbol(&self.market, state, &self.settings.pair))
    }

    /// Mark price reported by one exchange.
    pub fn mark_price(&self, symbol: &str, exchange: ExchangeId) -> Option<Decimal> {
        self.market.get(symbol)?.quote(exchange)?.mark_price
    }

    /// Poll rates and merge every returned snapshot.
    ///
    /// A failed poll leaves the previous state in place.
    pub async fn refresh_rates(&mut self) -> usize {
        let snapshots = match self.source.fetch_snapshots().await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!(source = self.source.name(), "Rate poll failed, keeping last state: {}", e);
                return 0;
            }
        };

        if !self.is_active() {
            debug!("Discarding rate poll after teardown");
            return 0;
        }

        let merged = snapshots.len();
        let next = snapshots
            .iter()
            .fold(self.market.clone(), |state, (exchange, snapshot)| {
                state.merge(*exchange, snapshot)
            });
        self.market = next;
        self.recompute();

        debug!(exchanges = merged, symbols = self.market.len(), "Rates merged");
        merged
    }

    /// Poll funding interval metadata.
    pub async fn refresh_intervals(&mut self) {
        match self.source.fetch_intervals().await {
            Ok(metadata) if self.is_active() => {
                let mut next = self.market.clone();
                next.apply_intervals(&metadata);
                self.market = next;
                self.recompute();
                debug!(symbols = metadata.len(), "Interval metadata applied");
            }
            Ok(_) => debug!("Discarding metadata after teardown"),
            Err(e) => warn!("Interval metadata unavailable: {}", e),
        }
    }

    /// Poll the tradable-symbol allowlist.
    pub async fn refresh_tradable(&mut self) {
        match self.source.fetch_tradable().await {
            Ok(symbols) if self.is_active() => {
                debug!(count = symbols.len(), "Tradable list refreshed");
                self.tradable = symbols;
            }
            Ok(_) => {}
            Err(e) => warn!("Tradable list unavailable: {}", e),
        }
    }

    /// Merge a streamed Binance snapshot.
    pub fn apply_stream(&mut self, snapshot: &RateSnapshot) {
        if !self.is_active() {
            return;
        }
        self.market = self.market.clone().merge(ExchangeId::Binance, snapshot);
        self.recompute();
    }

    fn recompute(&mut self) {
        self.views = cap_by_spread(compute(&self.market, &self.settings.pair), self.settings.top_n);
    }

    /// Current filter set, with the allowlist when restricted.
    fn filters(&self) -> RankFilters {
        let mut filters = self.settings.filters.clone();
        if self.settings.restrict_to_tradable {
            filters.tradable = Some(self.tradable.clone());
        }
        filters
    }

    /// Capped views, filtered and sorted.
    pub fn ranked(&self) -> Vec<ComputedView> {
        rank(
            &self.views,
            self.settings.sort_key,
            self.settings.sort_direction,
            &self.filters(),
        )
    }

    /// Page of the ranked list.
    pub fn page(&self, page: usize) -> Page {
        paginate(&self.ranked(), page, self.settings.page_size)
    }

    /// Change the search query; the page index goes back to the first page.
    pub fn set_search(&mut self, query: &str) {
        self.settings.filters.search_query = query.to_string();
        self.page = 0;
    }

    pub fn current_page(&self) -> Page {
        self.page(self.page)
    }

    /// Evaluate alert conditions and deliver anything that fired.
    ///
    /// Returns the number of alerts fired.
    pub async fn evaluate_alerts(&mut self, now_ms: i64) -> usize {
        let Some(pipeline) = self.alerts.as_mut() else {
            return 0;
        };

        let fired = pipeline.trigger.evaluate(&self.market, now_ms);
        if fired.is_empty() {
            return 0;
        }

        let count = fired.len();
        for (alert, delivered) in pipeline.dispatcher.dispatch(fired).await {
            if let Some(store) = &pipeline.store {
                if let Err(e) = store.record(&alert, delivered) {
                    error!(symbol = %alert.symbol, "Failed to persist alert: {}", e);
                }
            }
        }
        count
    }

    fn log_top(&self, n: usize) {
        let ranked = self.ranked();
        info!(
            symbols = self.market.len(),
            shown = ranked.len(),
            "Top opportunities {} vs {}",
            self.settings.pair.exchange_a,
            self.settings.pair.exchange_b
        );
        for view in ranked.iter().take(n) {
            info!(
                symbol = %view.symbol,
                diff = %round_to_precision(view.diff, 4),
                apr = %round_to_precision(view.apr, 2),
                "  {}",
                report::format_row(view, now_ms())
            );
        }
    }

    /// Run until the active flag is cleared.
    pub async fn run(&mut self, polling: &PollingConfig, stream: Option<BinanceMarkPriceStream>) -> Result<()> {
        let mut tick = interval(Duration::from_millis(polling.tick_ms));
        let mut rates = interval(Duration::from_secs(polling.rates_secs));
        let mut metadata = interval(Duration::from_secs(polling.metadata_secs));
        let mut tradable = interval(Duration::from_secs(polling.tradable_secs));
        for timer in [&mut tick, &mut rates, &mut metadata, &mut tradable] {
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        }

        let (tx, mut rx) = mpsc::channel::<StreamEvent>(64);
        let mut stream_connected = false;

        info!(source = self.source.name(), "Monitor started");

        while self.is_active() {
            tokio::select! {
                _ = tick.tick() => {
                    let fired = self.evaluate_alerts(now_ms()).await;
                    if fired > 0 {
                        info!(fired, "Alerts evaluated");
                    }
                }
                _ = rates.tick() => {
                    self.refresh_rates().await;
                    self.log_top(5);

                    if let Some(stream) = &stream {
                        if !stream_connected {
                            match stream.subscribe(tx.clone()).await {
                                Ok(()) => stream_connected = true,
                                Err(e) => warn!("Mark price stream unavailable: {}", e),
                            }
                        }
                    }
                }
                _ = metadata.tick() => self.refresh_intervals().await,
                _ = tradable.tick() => {
                    if self.settings.restrict_to_tradable {
                        self.refresh_tradable().await;
                    }
                }
                Some(event) = rx.recv() => match event {
                    StreamEvent::Rates(snapshot) => self.apply_stream(&snapshot),
                    StreamEvent::Connected => info!("Mark price stream connected"),
                    StreamEvent::Disconnected => {
                        warn!("Mark price stream disconnected, will reconnect on next poll");
                        stream_connected = false;
                    }
                },
            }
        }

        info!("Monitor stopped");
        Ok(())
    }
}
