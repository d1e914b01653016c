//! Funding Arbitrage Scanner - Main Entry Point

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use funding_arb_scanner::alerts::{
    AlertDispatcher, AlertTrigger, BackendRelayNotifier, Notifier, TelegramNotifier,
};
use funding_arb_scanner::config::{Config, FeedSource};
use funding_arb_scanner::exchange::{
    BackendClient, BinanceClient, BinanceMarkPriceStream, BybitClient, CoinSwitchClient,
    DirectSource, ExchangeId, RateFeed, RateSource,
};
use funding_arb_scanner::monitor::report::format_page;
use funding_arb_scanner::monitor::{shutdown_on, AlertPipeline, Monitor, ScanSettings};
use funding_arb_scanner::persistence::AlertStore;
use funding_arb_scanner::pipeline::{ProfitProjection, SortDirection, SortKey};
use funding_arb_scanner::trading::{
    rank_leaderboard, realized_total, AutoTradeConfig, LegPosition, Platform, ScheduleTradeRequest,
    TradeDirection,
};
use funding_arb_scanner::utils::time::{format_countdown, now_ms};
use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Funding Arbitrage Scanner CLI
#[derive(Parser)]
#[command(name = "funding-arb-scanner")]
#[command(version, about = "Cross-exchange funding rate arbitrage scanner")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Overrides for the configured view.
#[derive(Args, Debug, Default)]
struct ViewArgs {
    /// Side A exchange (binance, bybit, coinswitch)
    #[arg(long)]
    exchange_a: Option<ExchangeId>,

    /// Side B exchange
    #[arg(long)]
    exchange_b: Option<ExchangeId>,

    /// Minimum spread in percentage points
    #[arg(long)]
    min_spread: Option<Decimal>,

    /// Only show |diff| above the high-diff threshold
    #[arg(long)]
    high_diff_only: bool,

    /// Only show symbols tradable on the execution venue
    #[arg(long)]
    tradable_only: bool,

    /// Case-insensitive symbol search
    #[arg(short, long)]
    search: Option<String>,

    /// Sort column (symbol, spread, diff, apr, rate_a, rate_b, mark_price, next_funding_time)
    #[arg(long)]
    sort: Option<SortKey>,

    /// Sort direction (asc, desc)
    #[arg(long)]
    direction: Option<SortDirection>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the refresh loop with alerts (default)
    Scan {
        #[command(flatten)]
        view: ViewArgs,

        /// Subscribe to the Binance mark-price stream
        #[arg(long)]
        websocket: bool,
    },

    /// Fetch once and print a page of opportunities
    Snapshot {
        #[command(flatten)]
        view: ViewArgs,

        /// Zero-based page index
        #[arg(short, long, default_value = "0")]
        page: usize,

        /// Show projected income for this budget on the top row
        #[arg(long)]
        budget: Option<Decimal>,
    },

    /// Show recent alert history
    Alerts {
        /// Path to SQLite database (defaults to alerts.db_path)
        #[arg(short, long)]
        db: Option<String>,

        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Schedule a trade around the next funding settlement
    Schedule {
        symbol: String,

        /// Quantity per leg
        #[arg(short, long)]
        qty: Decimal,

        /// Buy, Sell or Auto
        #[arg(short, long, default_value = "auto")]
        direction: TradeDirection,

        /// Binance, Bybit or Both
        #[arg(short, long, default_value = "both")]
        platform: Platform,

        #[arg(short, long, default_value = "5")]
        leverage: u32,

        /// Settlement time in epoch seconds (defaults to the next funding time)
        #[arg(short, long)]
        target_time: Option<i64>,
    },

    /// List scheduled trades
    Tasks,

    /// Manage the backend auto-trader
    AutoTrade {
        #[command(subcommand)]
        action: AutoTradeAction,
    },

    /// Realized P&L summary, open trades and closed-trade history
    Pnl {
        /// Reconcile backend state with exchange positions first
        #[arg(long)]
        sync: bool,

        /// Closed trades to list
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Inspect or flatten exchange positions
    Positions {
        #[command(subcommand)]
        action: PositionsAction,
    },

    /// Show wallet balances on both execution venues
    Wallet,

    /// Show the shared bot leaderboard
    Leaderboard,

    /// Control the backend's Binance price stream
    Stream {
        #[command(subcommand)]
        action: StreamAction,
    },
}

#[derive(Subcommand)]
enum PositionsAction {
    /// Show both legs for one symbol
    Show { symbol: String },

    /// Market-close every open position on both venues
    CloseAll {
        /// Required; closes are not reversible
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum StreamAction {
    Start,
    Stop,
    Status,
}

#[derive(Subcommand)]
enum AutoTradeAction {
    /// Show open positions, pending opportunities and recent logs
    Status,

    /// Push auto-trade settings
    Configure {
        /// Enable the auto-trader
        #[arg(long)]
        active: bool,

        #[arg(long)]
        total_investment: Option<Decimal>,

        #[arg(long)]
        max_trades: Option<u32>,

        #[arg(long)]
        leverage: Option<u32>,

        /// Minimum |diff| in percentage points
        #[arg(long)]
        min_diff: Option<Decimal>,

        /// Trading window start (HH:MM)
        #[arg(long)]
        start_time: Option<String>,

        /// Trading window end (HH:MM)
        #[arg(long)]
        end_time: Option<String>,

        #[arg(long)]
        entry_before_seconds: Option<u32>,

        #[arg(long)]
        exit_after_seconds: Option<u32>,

        /// Keep positions open after settlement
        #[arg(long)]
        no_auto_exit: bool,

        #[arg(long)]
        ignore_timing: bool,
    },

    /// Remove a symbol from the auto-trader
    Remove {
        symbol: String,

        /// Leave exchange positions open
        #[arg(long)]
        keep_positions: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    let config = Config::load()?;
    config.validate()?;

    match cli.command {
        None => run_scan(config, ViewArgs::default(), false).await,
        Some(Commands::Scan { view, websocket }) => run_scan(config, view, websocket).await,
        Some(Commands::Snapshot { view, page, budget }) => {
            run_snapshot(config, view, page, budget).await
        }
        Some(Commands::Alerts { db, limit }) => {
            show_alerts(db.as_deref().unwrap_or(&config.alerts.db_path), limit)
        }
        Some(Commands::Schedule {
            symbol,
            qty,
            direction,
            platform,
            leverage,
            target_time,
        }) => {
            let symbol = symbol.to_ascii_uppercase();
            let request = match target_time {
                Some(target_time) => ScheduleTradeRequest {
                    symbol,
                    direction,
                    target_time,
                    leverage,
                    qty,
                    platform,
                },
                None => ScheduleTradeRequest {
                    direction,
                    leverage,
                    platform,
                    ..next_settlement_request(&config, &symbol, qty).await?
                },
            };
            schedule_trade(&config, request).await
        }
        Some(Commands::Tasks) => show_tasks(&config).await,
        Some(Commands::AutoTrade { action }) => auto_trade(&config, action).await,
        Some(Commands::Pnl { sync, limit }) => show_pnl(&config, sync, limit).await,
        Some(Commands::Positions { action }) => positions(&config, action).await,
        Some(Commands::Wallet) => show_wallets(&config).await,
        Some(Commands::Leaderboard) => show_leaderboard(&config).await,
        Some(Commands::Stream { action }) => stream(&config, action).await,
    }
}

fn backend_client(config: &Config) -> Result<Arc<BackendClient>> {
    Ok(Arc::new(BackendClient::new(
        &config.backend,
        config.credentials.clone(),
    )?))
}

/// Build the configured rate source.
fn build_source(config: &Config) -> Result<Arc<dyn RateSource>> {
    match config.feeds.source {
        FeedSource::Backend => {
            info!(url = %config.backend.primary_url, "Using backend rate source");
            let backend: Arc<dyn RateSource> = backend_client(config)?;
            Ok(backend)
        }
        FeedSource::Direct => {
            let timeout = config.feeds.request_timeout_secs;
            let binance = Arc::new(BinanceClient::new(&config.feeds)?);
            let feeds: Vec<Arc<dyn RateFeed>> = vec![
                binance.clone(),
                Arc::new(BybitClient::new(timeout)?),
                Arc::new(CoinSwitchClient::new(&config.feeds.coinswitch_url, timeout)?),
            ];
            info!("Using direct exchange feeds");
            let direct: Arc<dyn RateSource> =
                Arc::new(DirectSource::new(feeds).with_tradable_client(binance));
            Ok(direct)
        }
    }
}

fn scan_settings(config: &Config, view: &ViewArgs) -> ScanSettings {
    let mut settings = ScanSettings::from_config(config);
    if let Some(exchange) = view.exchange_a {
        settings.pair.exchange_a = exchange;
    }
    if let Some(exchange) = view.exchange_b {
        settings.pair.exchange_b = exchange;
    }
    if let Some(min_spread) = view.min_spread {
        settings.filters.min_spread = min_spread;
    }
    if let Some(search) = &view.search {
        settings.filters.search_query = search.clone();
    }
    if let Some(sort) = view.sort {
        settings.sort_key = sort;
    }
    if let Some(direction) = view.direction {
        settings.sort_direction = direction;
    }
    settings.filters.high_diff_only |= view.high_diff_only;
    settings.restrict_to_tradable |= view.tradable_only;
    settings
}

/// Wire up alert delivery, if Telegram is configured.
fn alert_pipeline(config: &Config, settings: &ScanSettings) -> Result<Option<AlertPipeline>> {
    if !config.alerts.is_configured() {
        info!("Telegram not configured, alerts disabled");
        return Ok(None);
    }

    let notifier: Arc<dyn Notifier> = if config.alerts.relay_via_backend {
        Arc::new(BackendRelayNotifier::new(backend_client(config)?))
    } else {
        Arc::new(TelegramNotifier::new(config.backend.request_timeout_secs)?)
    };

    let store = match AlertStore::new(&config.alerts.db_path) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!("Alert history disabled: {:#}", e);
            None
        }
    };
    if let Some(store) = &store {
        if let Err(e) = store.apply_retention(config.alerts.retention_days) {
            warn!("Failed to prune alert history: {:#}", e);
        }
    }
    let ledger = match &store {
        Some(store) => store.load_ledger()?,
        None => Default::default(),
    };

    info!(
        threshold = %config.alerts.threshold_pct,
        lead_minutes = config.alerts.lead_time_minutes,
        restored = ledger.len(),
        "Alerts enabled"
    );

    Ok(Some(AlertPipeline {
        trigger: AlertTrigger::with_ledger((&config.alerts).into(), settings.pair, ledger),
        dispatcher: AlertDispatcher::new(notifier, &config.alerts, settings.pair.exchange_a),
        store,
    }))
}

async fn run_scan(config: Config, view: ViewArgs, websocket: bool) -> Result<()> {
    info!(
        "Funding Arbitrage Scanner v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let settings = scan_settings(&config, &view);
    anyhow::ensure!(
        settings.pair.exchange_a != settings.pair.exchange_b,
        "comparison exchanges must differ"
    );
    log_config(&config, &settings);

    let source = build_source(&config)?;
    let alerts = alert_pipeline(&config, &settings)?;

    let mut monitor = Monitor::new(source, settings);
    if let Some(alerts) = alerts {
        monitor = monitor.with_alerts(alerts);
    }

    let stream = (websocket || config.polling.use_websocket)
        .then(|| BinanceMarkPriceStream::new(config.feeds.binance_testnet));

    // Shutdown signal
    tokio::spawn(shutdown_on(monitor.active_flag(), tokio::signal::ctrl_c()));

    monitor.run(&config.polling, stream).await?;

    info!("Funding Arbitrage Scanner shutdown complete");
    Ok(())
}

async fn run_snapshot(
    config: Config,
    view: ViewArgs,
    page: usize,
    budget: Option<Decimal>,
) -> Result<()> {
    let settings = scan_settings(&config, &view);
    let pair = settings.pair;
    let restrict = settings.restrict_to_tradable;
    let mut monitor = Monitor::new(build_source(&config)?, settings);

    monitor.refresh_intervals().await;
    if restrict {
        monitor.refresh_tradable().await;
    }
    monitor.refresh_rates().await;

    let page = monitor.page(page);
    println!("{}", format_page(&page, &pair, now_ms()));

    if let (Some(budget), Some(top)) = (budget, page.items.first()) {
        let projection = ProfitProjection::for_budget(top, budget);
        println!(
            "\n{}: {} budget -> {:.4} per settlement, {:.4} per day",
            top.symbol, projection.budget, projection.per_interval, projection.daily
        );
        if let Some((long, short)) = top.suggested_legs(&pair) {
            println!("   Long {} / Short {}", long, short);
        }
    }

    Ok(())
}

fn show_alerts(db_path: &str, limit: usize) -> Result<()> {
    if !Path::new(db_path).exists() {
        println!("No alert history at {}", db_path);
        return Ok(());
    }

    let store = AlertStore::new(db_path)?;
    let records = store.recent(limit)?;
    if records.is_empty() {
        println!("No alerts recorded yet.");
        return Ok(());
    }

    for record in records {
        println!(
            "{}  {:<10} diff {:+.4}  apr {:>8.2}%  funding {}  {}",
            record.sent_at.format("%Y-%m-%d %H:%M:%S"),
            record.symbol,
            record.diff,
            record.apr,
            record.next_funding_time,
            if record.delivered { "sent" } else { "FAILED" },
        );
    }
    Ok(())
}

/// Fetch rates once and target the symbol's next settlement.
async fn next_settlement_request(
    config: &Config,
    symbol: &str,
    qty: Decimal,
) -> Result<ScheduleTradeRequest> {
    let mut monitor = Monitor::new(build_source(config)?, ScanSettings::from_config(config));
    monitor.refresh_rates().await;
    monitor
        .view(symbol)
        .and_then(|view| ScheduleTradeRequest::for_view(&view, qty))
        .with_context(|| format!("No next funding time known for {}", symbol))
}

async fn schedule_trade(config: &Config, request: ScheduleTradeRequest) -> Result<()> {
    request.validate()?;

    let response = backend_client(config)?.schedule_trade(&request).await?;
    println!(
        "Scheduled {} ({:?} on {}) for {}: task {} [{}]",
        request.symbol,
        request.direction,
        request.platform,
        request.target_time,
        response.task_id,
        response.status
    );
    Ok(())
}

async fn show_tasks(config: &Config) -> Result<()> {
    let tasks = backend_client(config)?.get_scheduled_tasks().await?;
    if tasks.tasks.is_empty() {
        println!("No scheduled tasks.");
        return Ok(());
    }

    for (id, task) in tasks.sorted() {
        let symbol = task
            .params
            .get("symbol")
            .and_then(|s| s.as_str())
            .unwrap_or("?");
        println!("{}  {:<10} {:<10} profit {}", id, symbol, task.status, task.profit);
    }
    println!("Total profit: {}", tasks.total_profit());
    Ok(())
}

async fn auto_trade(config: &Config, action: AutoTradeAction) -> Result<()> {
    let backend = backend_client(config)?;

    match action {
        AutoTradeAction::Status => {
            let status = backend.auto_trade_status().await?;
            println!("Active trades: {}", status.active_trades);

            let monitor = if status.active_positions.is_empty() {
                None
            } else {
                let mut monitor = Monitor::new(build_source(config)?, ScanSettings::from_config(config));
                monitor.refresh_rates().await;
                Some(monitor)
            };

            for position in &status.active_positions {
                println!(
                    "   {} BN {} {} @ {} / BY {} {} @ {}",
                    position.symbol,
                    position.sides.binance,
                    position.qty_binance,
                    position.entry_price_binance,
                    position.sides.bybit,
                    position.qty_bybit,
                    position.entry_price_bybit,
                );
                let marks = monitor.as_ref().and_then(|m| {
                    Some((
                        m.mark_price(&position.symbol, ExchangeId::Binance)?,
                        m.mark_price(&position.symbol, ExchangeId::Bybit)?,
                    ))
                });
                if let Some((mark_binance, mark_bybit)) = marks {
                    println!(
                        "      uPnL {:+.4} at {} / {}",
                        position.unrealized_pnl(mark_binance, mark_bybit),
                        mark_binance,
                        mark_bybit
                    );
                }
                if let Some(nft) = position.nft {
                    println!("      next funding in {}", format_countdown(nft, now_ms()));
                }
            }
            println!("Pending opportunities: {}", status.pending_opportunities.len());
            for log in status.logs.iter().rev().take(10) {
                println!("   [{}] {}", log.kind, log.text());
            }
        }
        AutoTradeAction::Configure {
            active,
            total_investment,
            max_trades,
            leverage,
            min_diff,
            start_time,
            end_time,
            entry_before_seconds,
            exit_after_seconds,
            no_auto_exit,
            ignore_timing,
        } => {
            let defaults = AutoTradeConfig::default();
            let settings = AutoTradeConfig {
                active,
                total_investment: total_investment.unwrap_or(defaults.total_investment),
                max_trades: max_trades.unwrap_or(defaults.max_trades),
                leverage: leverage.unwrap_or(defaults.leverage),
                min_diff: min_diff.unwrap_or(defaults.min_diff),
                is_live: config.backend.is_live,
                start_time: start_time.unwrap_or(defaults.start_time),
                end_time: end_time.unwrap_or(defaults.end_time),
                max_price_diff: defaults.max_price_diff,
                auto_exit: !no_auto_exit,
                entry_before_seconds: entry_before_seconds.unwrap_or(defaults.entry_before_seconds),
                exit_after_seconds: exit_after_seconds.unwrap_or(defaults.exit_after_seconds),
                ignore_timing,
            };
            settings.validate()?;

            let response = backend.configure_auto_trade(&settings).await?;
            println!("Auto-trade configured: {}", response);
            println!(
                "   {} per leg across {} trades, window {}-{} ({})",
                settings.per_leg_investment(),
                settings.max_trades,
                settings.start_time,
                settings.end_time,
                if settings.in_trading_window(Local::now().time())? {
                    "open now"
                } else {
                    "closed now"
                }
            );
        }
        AutoTradeAction::Remove {
            symbol,
            keep_positions,
        } => {
            let response = backend
                .remove_auto_trade(&symbol.to_ascii_uppercase(), !keep_positions)
                .await?;
            println!("Removed {}: {}", symbol, response);
        }
    }

    Ok(())
}

fn format_epoch_secs(secs: f64) -> String {
    DateTime::from_timestamp(secs as i64, 0)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

async fn show_pnl(config: &Config, sync: bool, limit: usize) -> Result<()> {
    let backend = backend_client(config)?;
    if sync {
        let response = backend.sync_positions().await?;
        println!("Synced positions: {}", response);
    }

    let overview = backend.pnl_overview().await?;
    let summary = &overview.summary;
    println!(
        "Total P&L {:+.4} over {} trades, last 24h {:+.4}",
        summary.total_pnl, summary.total_trades, summary.pnl_24h
    );

    println!("Open trades: {}", overview.active_trades.count);
    for trade in &overview.active_trades.list {
        println!(
            "   {:<10} BN {} / BY {}  qty {}  amount {}  since {}",
            trade.symbol,
            trade.sides.binance,
            trade.sides.bybit,
            trade.qty,
            trade.amount,
            format_epoch_secs(trade.entry_time),
        );
    }

    let history = backend.pnl_history().await?;
    println!("Closed trades (last {} of {}):", limit.min(history.len()), history.len());
    for trade in history.iter().take(limit) {
        let realized = trade
            .realized_profit
            .map(|p| format!("{:+.4}", p))
            .unwrap_or_else(|| "pending".to_string());
        println!(
            "   {}  {:<10} {}/{}  est {:+.4}  realized {}  {}",
            format_epoch_secs(trade.exit_time),
            trade.symbol,
            trade.side_binance,
            trade.side_bybit,
            trade.est_profit,
            realized,
            trade.status,
        );
    }
    println!("Realized total: {:+.4}", realized_total(&history));
    Ok(())
}

fn print_leg(venue: &str, leg: &Option<LegPosition>) {
    match leg {
        Some(leg) => println!(
            "   {:<8} {} {} @ {}  pnl {:+.4}",
            venue, leg.side, leg.size, leg.entry_price, leg.pnl
        ),
        None => println!("   {:<8} flat", venue),
    }
}

async fn positions(config: &Config, action: PositionsAction) -> Result<()> {
    let backend = backend_client(config)?;

    match action {
        PositionsAction::Show { symbol } => {
            let symbol = symbol.to_ascii_uppercase();
            let positions = backend.positions(&symbol).await?;
            if positions.is_flat() {
                println!("No open positions for {}", symbol);
                return Ok(());
            }
            println!("{}", symbol);
            print_leg("Binance", &positions.binance);
            print_leg("Bybit", &positions.bybit);
            println!("   Total pnl {:+.4}", positions.total_pnl());
        }
        PositionsAction::CloseAll { yes } => {
            anyhow::ensure!(yes, "refusing to close every position without --yes");
            warn!("Closing all positions on both venues");
            let report = backend.close_all_positions().await?;
            for line in &report.binance {
                println!("   Binance: {}", line);
            }
            for line in &report.bybit {
                println!("   Bybit: {}", line);
            }
        }
    }
    Ok(())
}

async fn show_wallets(config: &Config) -> Result<()> {
    let backend = backend_client(config)?;

    match backend.bybit_wallet().await {
        Ok(wallet) => println!(
            "Bybit: equity {:.2}  wallet {:.2}  available {:.2}",
            wallet.total_equity, wallet.wallet_balance, wallet.available_balance
        ),
        Err(e) => warn!("Bybit wallet unavailable: {}", e),
    }

    match backend.binance_wallet().await {
        Ok(balances) if balances.is_empty() => println!("Binance: no balances"),
        Ok(balances) => {
            println!("Binance:");
            for balance in balances {
                println!(
                    "   {:<6} balance {:.4}  available {:.4}  uPnL {:+.4}",
                    balance.asset,
                    balance.balance,
                    balance.available_balance,
                    balance.unrealized_pnl
                );
            }
        }
        Err(e) => warn!("Binance wallet unavailable: {}", e),
    }
    Ok(())
}

async fn show_leaderboard(config: &Config) -> Result<()> {
    let board = backend_client(config)?.leaderboard().await?;
    if board.is_empty() {
        println!("Leaderboard is empty.");
        return Ok(());
    }

    for (rank, (id, entry)) in rank_leaderboard(&board).into_iter().enumerate() {
        let name = if entry.name.is_empty() { id.as_str() } else { entry.name.as_str() };
        println!(
            "{:>3}. {:<20} P&L {:+.4}  trades {:<4} 24h {:+.4}  seen {}",
            rank + 1,
            name,
            entry.stats.total_pnl,
            entry.stats.total_trades,
            entry.stats.pnl_24h,
            format_epoch_secs(entry.last_seen),
        );
    }
    Ok(())
}

async fn stream(config: &Config, action: StreamAction) -> Result<()> {
    let backend = backend_client(config)?;

    match action {
        StreamAction::Start => println!("{}", backend.start_stream().await?),
        StreamAction::Stop => println!("{}", backend.stop_stream().await?),
        StreamAction::Status => {
            let status = backend.stream_status().await?;
            println!(
                "Stream {} ({}) {}",
                if status.running { "running" } else { "stopped" },
                status.mode,
                status.url
            );
        }
    }
    Ok(())
}

/// Initialize logging with both console and file output.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "funding-arb-scanner.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer guard alive for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("funding_arb_scanner=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config, settings: &ScanSettings) {
    info!("Configuration:");
    info!(
        "   Comparing: {} vs {}",
        settings.pair.exchange_a, settings.pair.exchange_b
    );
    info!("   Source: {:?}", config.feeds.source);
    info!("   Min Spread: {}%", settings.filters.min_spread);
    info!("   Top N: {}", settings.top_n);
    info!(
        "   Sort: {:?} {}",
        settings.sort_key, settings.sort_direction
    );
    info!(
        "   Polling: rates {}s, metadata {}s, tradable {}s",
        config.polling.rates_secs, config.polling.metadata_secs, config.polling.tradable_secs
    );
    info!(
        "   Alerts: threshold {}%, lead {} min",
        config.alerts.threshold_pct, config.alerts.lead_time_minutes
    );
}
