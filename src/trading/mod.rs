//! Request and response bodies for the backend's trading endpoints.
//!
//! The scanner never places orders itself; it hands scheduled trades and
//! auto-trade settings to the backend, which executes them.

pub mod account;

pub use account::{
    parse_binance_balances, parse_bybit_wallet, rank_leaderboard, realized_total, AssetBalance,
    CloseAllReport, ClosedTrade, Leaderboard, LeaderboardEntry, LegPosition, OpenTrade, OpenTrades,
    PnlOverview, PnlSummary, SymbolPositions, TradeSides, WalletSummary,
};

use crate::pipeline::ComputedView;
use anyhow::{Context, Result};
use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Side of the scheduled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    Buy,
    Sell,
    /// Let the backend pick from live rates at execution time
    Auto,
}

impl FromStr for TradeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "long" => Ok(TradeDirection::Buy),
            "sell" | "short" => Ok(TradeDirection::Sell),
            "auto" => Ok(TradeDirection::Auto),
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}

/// Venue(s) the backend should trade on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Binance,
    Bybit,
    Both,
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "binance" => Ok(Platform::Binance),
            "bybit" => Ok(Platform::Bybit),
            "both" => Ok(Platform::Both),
            other => Err(format!("unknown platform: {}", other)),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Binance => write!(f, "Binance"),
            Platform::Bybit => write!(f, "Bybit"),
            Platform::Both => write!(f, "Both"),
        }
    }
}

fn default_schedule_leverage() -> u32 {
    5
}

fn default_platform() -> Platform {
    Platform::Both
}

/// Body of `POST /api/schedule-trade`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTradeRequest {
    pub symbol: String,
    pub direction: TradeDirection,
    /// Settlement time, epoch seconds
    #[serde(rename = "targetTime")]
    pub target_time: i64,
    #[serde(default = "default_schedule_leverage")]
    pub leverage: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub qty: Decimal,
    #[serde(default = "default_platform")]
    pub platform: Platform,
}

impl ScheduleTradeRequest {
    /// Build a request for a computed opportunity, targeting its next settlement.
    ///
    /// Returns `None` when the view has no settlement time.
    pub fn for_view(view: &ComputedView, qty: Decimal) -> Option<Self> {
        let funding_time = view.next_funding_time?;
        Some(Self {
            symbol: view.symbol.clone(),
            direction: TradeDirection::Auto,
            target_time: funding_time / 1000,
            leverage: default_schedule_leverage(),
            qty,
            platform: Platform::Both,
        })
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.symbol.trim().is_empty(), "symbol must not be empty");
        anyhow::ensure!(self.qty > Decimal::ZERO, "qty must be positive");
        anyhow::ensure!(
            (1..=125).contains(&self.leverage),
            "leverage must be between 1 and 125"
        );
        Ok(())
    }
}

/// Response of `POST /api/schedule-trade`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleTradeResponse {
    pub status: String,
    #[serde(rename = "taskId")]
    pub task_id: String,
}

/// One entry of `GET /api/scheduled-tasks`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduledTask {
    pub status: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub profit: Decimal,
    /// Epoch seconds
    #[serde(default)]
    pub created_at: f64,
}

/// Body of `GET /api/scheduled-tasks`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduledTasks {
    #[serde(default)]
    pub tasks: HashMap<String, ScheduledTask>,
    #[serde(default)]
    pub profit_log: Vec<Value>,
}

impl ScheduledTasks {
    /// Tasks ordered by creation time, oldest first.
    pub fn sorted(&self) -> Vec<(&String, &ScheduledTask)> {
        let mut tasks: Vec<_> = self.tasks.iter().collect();
        tasks.sort_by(|a, b| a.1.created_at.total_cmp(&b.1.created_at));
        tasks
    }

    /// Sum of reported profit across tasks.
    pub fn total_profit(&self) -> Decimal {
        self.tasks.values().map(|t| t.profit).sum()
    }
}

fn default_true() -> bool {
    true
}
fn default_total_investment() -> Decimal {
    dec!(100)
}
fn default_max_trades() -> u32 {
    1
}
fn default_auto_leverage() -> u32 {
    10
}
fn default_min_diff() -> Decimal {
    dec!(0.5)
}
fn default_start_time() -> String {
    "00:00".to_string()
}
fn default_end_time() -> String {
    "23:59".to_string()
}
fn default_max_price_diff() -> Decimal {
    dec!(2.0)
}
fn default_entry_before_seconds() -> u32 {
    300
}
fn default_exit_after_seconds() -> u32 {
    30
}

/// Body of `POST /api/auto-trade/config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoTradeConfig {
    #[serde(default)]
    pub active: bool,
    /// Quote currency split across both legs
    #[serde(default = "default_total_investment", with = "rust_decimal::serde::float")]
    pub total_investment: Decimal,
    #[serde(default = "default_max_trades")]
    pub max_trades: u32,
    #[serde(default = "default_auto_leverage")]
    pub leverage: u32,
    /// Minimum `|diff|` in percentage points
    #[serde(default = "default_min_diff", with = "rust_decimal::serde::float")]
    pub min_diff: Decimal,
    #[serde(default)]
    pub is_live: bool,
    /// Trading window start, "HH:MM"
    #[serde(default = "default_start_time")]
    pub start_time: String,
    /// Trading window end, "HH:MM"
    #[serde(default = "default_end_time")]
    pub end_time: String,
    /// Maximum mark price gap between venues, percent
    #[serde(default = "default_max_price_diff", with = "rust_decimal::serde::float")]
    pub max_price_diff: Decimal,
    #[serde(default = "default_true")]
    pub auto_exit: bool,
    #[serde(default = "default_entry_before_seconds")]
    pub entry_before_seconds: u32,
    #[serde(default = "default_exit_after_seconds")]
    pub exit_after_seconds: u32,
    #[serde(default)]
    pub ignore_timing: bool,
}

impl Default for AutoTradeConfig {
    fn default() -> Self {
        Self {
            active: false,
            total_investment: default_total_investment(),
            max_trades: default_max_trades(),
            leverage: default_auto_leverage(),
            min_diff: default_min_diff(),
            is_live: false,
            start_time: default_start_time(),
            end_time: default_end_time(),
            max_price_diff: default_max_price_diff(),
            auto_exit: true,
            entry_before_seconds: default_entry_before_seconds(),
            exit_after_seconds: default_exit_after_seconds(),
            ignore_timing: false,
        }
    }
}

fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .with_context(|| format!("invalid time of day {:?}, expected HH:MM", value))
}

impl AutoTradeConfig {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.total_investment > Decimal::ZERO,
            "total_investment must be positive"
        );
        anyhow::ensure!(self.max_trades >= 1, "max_trades must be at least 1");
        anyhow::ensure!(
            (1..=125).contains(&self.leverage),
            "leverage must be between 1 and 125"
        );
        anyhow::ensure!(
            self.min_diff >= Decimal::ZERO && self.max_price_diff >= Decimal::ZERO,
            "min_diff and max_price_diff must be non-negative"
        );
        anyhow::ensure!(
            self.entry_before_seconds > 0,
            "entry_before_seconds must be positive"
        );
        parse_hhmm(&self.start_time)?;
        parse_hhmm(&self.end_time)?;
        Ok(())
    }

    /// Whether `time` falls inside the trading window.
    ///
    /// A window whose end is before its start wraps past midnight.
    pub fn in_trading_window(&self, time: NaiveTime) -> Result<bool> {
        if self.ignore_timing {
            return Ok(true);
        }
        let start = parse_hhmm(&self.start_time)?;
        let end = parse_hhmm(&self.end_time)?;
        Ok(if start <= end {
            time >= start && time <= end
        } else {
            time >= start || time <= end
        })
    }

    /// Capital per leg of each trade.
    pub fn per_leg_investment(&self) -> Decimal {
        self.total_investment / Decimal::from(self.max_trades.max(1)) / dec!(2)
    }
}

/// Entry sides per venue for an open auto-trade.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PositionSides {
    #[serde(default)]
    pub binance: String,
    #[serde(default)]
    pub bybit: String,
}

/// Open auto-trade position as reported by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivePosition {
    pub symbol: String,
    #[serde(default)]
    pub qty_binance: Decimal,
    #[serde(default)]
    pub qty_bybit: Decimal,
    #[serde(default)]
    pub entry_price_binance: Decimal,
    #[serde(default)]
    pub entry_price_bybit: Decimal,
    #[serde(default)]
    pub sides: PositionSides,
    /// Next funding time, epoch milliseconds
    #[serde(default)]
    pub nft: Option<i64>,
}

impl ActivePosition {
    fn direction(side: &str) -> Decimal {
        if side.eq_ignore_ascii_case("buy") {
            Decimal::ONE
        } else {
            Decimal::NEGATIVE_ONE
        }
    }

    /// Combined unrealized price PnL of both legs at the given marks.
    pub fn unrealized_pnl(&self, mark_binance: Decimal, mark_bybit: Decimal) -> Decimal {
        let binance = (mark_binance - self.entry_price_binance)
            * self.qty_binance
            * Self::direction(&self.sides.binance);
        let bybit = (mark_bybit - self.entry_price_bybit)
            * self.qty_bybit
            * Self::direction(&self.sides.bybit);
        binance + bybit
    }
}

/// Log line from the auto-trader.
#[derive(Debug, Clone, Deserialize)]
pub struct AutoTradeLog {
    /// Epoch seconds
    pub time: f64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

impl AutoTradeLog {
    pub fn text(&self) -> String {
        match (&self.msg, &self.symbol) {
            (Some(msg), _) => msg.clone(),
            (None, Some(symbol)) => format!("Action on {}", symbol),
            (None, None) => self.kind.clone(),
        }
    }
}

/// Body of `GET /api/auto-trade/status`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AutoTradeStatus {
    #[serde(default)]
    pub active_trades: u32,
    #[serde(default)]
    pub active_positions: Vec<ActivePosition>,
    #[serde(default)]
    pub logs: Vec<AutoTradeLog>,
    #[serde(default)]
    pub pending_opportunities: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schedule_request_wire_format() {
        let request = ScheduleTradeRequest {
            symbol: "BTC".to_string(),
            direction: TradeDirection::Sell,
            target_time: 1_700_000_000,
            leverage: 5,
            qty: dec!(0.01),
            platform: Platform::Both,
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["targetTime"], json!(1_700_000_000));
        assert_eq!(body["direction"], json!("Sell"));
        assert_eq!(body["platform"], json!("Both"));
        assert_eq!(body["qty"], json!(0.01));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_schedule_request_rejects_zero_qty() {
        let request = ScheduleTradeRequest {
            symbol: "BTC".to_string(),
            direction: TradeDirection::Auto,
            target_time: 0,
            leverage: 5,
            qty: Decimal::ZERO,
            platform: Platform::Bybit,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_schedule_request_for_view() {
        let mut view = ComputedView {
            symbol: "ETH".to_string(),
            rate_a: Some(dec!(0.0003)),
            rate_b: Some(dec!(0.0001)),
            pct_a: dec!(0.03),
            pct_b: dec!(0.01),
            diff: dec!(0.02),
            spread: dec!(0.02),
            apr: dec!(21.9),
            interval_a: 8,
            interval_b: 8,
            freq_per_day: dec!(3),
            mark_price: Some(dec!(3000)),
            next_funding_time: Some(1_700_000_000_999),
        };

        let request = ScheduleTradeRequest::for_view(&view, dec!(0.5)).unwrap();
        assert_eq!(request.symbol, "ETH");
        assert_eq!(request.target_time, 1_700_000_000);
        assert_eq!(request.direction, TradeDirection::Auto);
        assert_eq!(request.platform, Platform::Both);
        assert_eq!(request.leverage, 5);
        assert!(request.validate().is_ok());

        view.next_funding_time = None;
        assert!(ScheduleTradeRequest::for_view(&view, dec!(0.5)).is_none());
    }

    #[test]
    fn test_per_leg_investment() {
        let config = AutoTradeConfig {
            total_investment: dec!(100),
            max_trades: 2,
            ..Default::default()
        };
        assert_eq!(config.per_leg_investment(), dec!(25));

        let config = AutoTradeConfig {
            total_investment: dec!(100),
            max_trades: 0,
            ..Default::default()
        };
        assert_eq!(config.per_leg_investment(), dec!(50));
    }

    #[test]
    fn test_auto_trade_defaults_from_empty_body() {
        let config: AutoTradeConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config, AutoTradeConfig::default());
        assert_eq!(config.total_investment, dec!(100));
        assert_eq!(config.leverage, 10);
        assert!(config.auto_exit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_auto_trade_validation() {
        let config = AutoTradeConfig {
            start_time: "25:00".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AutoTradeConfig {
            max_trades: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trading_window_wraps_midnight() {
        let config = AutoTradeConfig {
            start_time: "22:00".to_string(),
            end_time: "02:00".to_string(),
            ..Default::default()
        };
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();

        assert!(config.in_trading_window(at(23, 30)).unwrap());
        assert!(config.in_trading_window(at(1, 0)).unwrap());
        assert!(!config.in_trading_window(at(12, 0)).unwrap());
    }

    #[test]
    fn test_status_parsing_and_pnl() {
        let status: AutoTradeStatus = serde_json::from_value(json!({
            "active_trades": 1,
            "active_positions": [{
                "symbol": "BTC",
                "qty_binance": 0.01,
                "qty_bybit": 0.01,
                "entry_price_binance": 50000,
                "entry_price_bybit": 50010,
                "sides": {"binance": "Buy", "bybit": "Sell"},
                "nft": 1700000000000_i64
            }],
            "logs": [{"time": 1700000000.5, "type": "ENTRY", "symbol": "BTC"}]
        }))
        .unwrap();

        assert_eq!(status.active_trades, 1);
        assert_eq!(status.logs[0].text(), "Action on BTC");
        assert!(status.pending_opportunities.is_empty());

        let position = &status.active_positions[0];
        // Long +1.00 on Binance, short -0.90 on Bybit
        assert_eq!(position.unrealized_pnl(dec!(50100), dec!(50100)), dec!(0.10));
    }

    #[test]
    fn test_scheduled_tasks_sorted() {
        let tasks: ScheduledTasks = serde_json::from_value(json!({
            "tasks": {
                "b": {"status": "QUEUED", "params": {}, "profit": 0, "created_at": 20.0},
                "a": {"status": "DONE", "params": {}, "profit": 1.25, "created_at": 10.0}
            },
            "profit_log": []
        }))
        .unwrap();

        let sorted = tasks.sorted();
        assert_eq!(sorted[0].0, "a");
        assert_eq!(tasks.total_profit(), dec!(1.25));
    }
}
