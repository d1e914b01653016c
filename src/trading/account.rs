//! Account views served by the backend: P&L, open positions, wallet
//! balances and the bot leaderboard.
//!
//! The backend forwards exchange payloads with little reshaping, so numbers
//! arrive as JSON floats, numeric strings or `null` depending on the venue.

use crate::exchange::FeedError;
use crate::utils::decimal::decimal_from_json;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;

fn lenient_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(decimal_from_json(&value).unwrap_or_default())
}

fn lenient_decimal_opt<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Decimal>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(decimal_from_json(&value))
}

/// Realized P&L totals.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PnlSummary {
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub total_pnl: Decimal,
    #[serde(default)]
    pub total_trades: u32,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub pnl_24h: Decimal,
}

/// Entry sides of a hedged trade.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TradeSides {
    #[serde(default)]
    pub binance: String,
    #[serde(default)]
    pub bybit: String,
}

/// Open trade listed in the P&L overview.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenTrade {
    pub symbol: String,
    /// Epoch seconds
    #[serde(default)]
    pub entry_time: f64,
    #[serde(default)]
    pub sides: TradeSides,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub qty: Decimal,
    /// Capital committed, quote currency
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub amount: Decimal,
    /// Next funding time, epoch milliseconds
    #[serde(default)]
    pub nft: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenTrades {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub list: Vec<OpenTrade>,
}

/// Body of `GET /api/pnl/overview`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PnlOverview {
    #[serde(default)]
    pub summary: PnlSummary,
    #[serde(default)]
    pub active_trades: OpenTrades,
}

/// One closed trade from `GET /api/pnl/history`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClosedTrade {
    #[serde(default)]
    pub id: Value,
    pub symbol: String,
    /// Epoch seconds
    #[serde(default)]
    pub exit_time: f64,
    #[serde(default)]
    pub side_binance: String,
    #[serde(default)]
    pub side_bybit: String,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub amount: Decimal,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub est_profit: Decimal,
    /// Absent until the backend has reconciled fills
    #[serde(default, deserialize_with = "lenient_decimal_opt")]
    pub realized_profit: Option<Decimal>,
    #[serde(default)]
    pub status: String,
}

/// Sum of realized profit across reconciled trades.
pub fn realized_total(history: &[ClosedTrade]) -> Decimal {
    history.iter().filter_map(|t| t.realized_profit).sum()
}

/// One venue's leg of a position.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegPosition {
    pub side: String,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub size: Decimal,
    #[serde(rename = "entryPrice", default, deserialize_with = "lenient_decimal")]
    pub entry_price: Decimal,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub pnl: Decimal,
}

/// Body of `GET /api/positions?symbol=`; a venue without a position is `null`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SymbolPositions {
    #[serde(default)]
    pub binance: Option<LegPosition>,
    #[serde(default)]
    pub bybit: Option<LegPosition>,
}

impl SymbolPositions {
    pub fn is_flat(&self) -> bool {
        self.binance.is_none() && self.bybit.is_none()
    }

    /// Combined unrealized P&L reported by both venues.
    pub fn total_pnl(&self) -> Decimal {
        [&self.binance, &self.bybit]
            .into_iter()
            .flatten()
            .map(|leg| leg.pnl)
            .sum()
    }
}

/// Body of `POST /api/close-all-positions`: one line per attempted close.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloseAllReport {
    #[serde(default)]
    pub binance: Vec<String>,
    #[serde(default)]
    pub bybit: Vec<String>,
}

/// Unified-account totals from Bybit's wallet endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletSummary {
    pub total_equity: Decimal,
    pub wallet_balance: Decimal,
    pub available_balance: Decimal,
}

/// Parse the Bybit v5 wallet body relayed by `/api/wallet-balance`.
pub fn parse_bybit_wallet(body: &Value) -> Result<WalletSummary, FeedError> {
    let code = body.get("retCode").and_then(Value::as_i64).unwrap_or(-1);
    if code != 0 {
        let message = body
            .get("retMsg")
            .and_then(Value::as_str)
            .unwrap_or("unexpected wallet response");
        return Err(FeedError::Api(format!("bybit wallet: {} ({})", message, code)));
    }

    let account = body
        .pointer("/result/list/0")
        .ok_or_else(|| FeedError::Api("bybit wallet: no unified account".to_string()))?;
    let field = |name: &str| {
        account
            .get(name)
            .and_then(decimal_from_json)
            .unwrap_or_default()
    };

    Ok(WalletSummary {
        total_equity: field("totalEquity"),
        wallet_balance: field("totalWalletBalance"),
        available_balance: field("totalAvailableBalance"),
    })
}

/// One asset row from Binance's futures balance endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub balance: Decimal,
    #[serde(rename = "availableBalance", default, deserialize_with = "lenient_decimal")]
    pub available_balance: Decimal,
    #[serde(rename = "crossUnPnl", default, deserialize_with = "lenient_decimal")]
    pub unrealized_pnl: Decimal,
}

/// Parse `/api/binance/wallet-balance`: an asset list, or `{"error": ...}`.
///
/// Zero-balance assets are dropped.
pub fn parse_binance_balances(body: &Value) -> Result<Vec<AssetBalance>, FeedError> {
    if let Some(error) = body.get("error") {
        let message = error
            .get("msg")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(FeedError::Api(format!("binance wallet: {}", message)));
    }

    let balances: Vec<AssetBalance> = serde_json::from_value(body.clone()).map_err(|e| {
        FeedError::Decode {
            url: "/api/binance/wallet-balance".to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(balances
        .into_iter()
        .filter(|b| !b.balance.is_zero())
        .collect())
}

/// A bot on the shared leaderboard.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stats: PnlSummary,
    /// Epoch seconds
    #[serde(default)]
    pub last_seen: f64,
}

/// Body of `GET /api/leaderboard`, keyed by bot id.
pub type Leaderboard = HashMap<String, LeaderboardEntry>;

/// Leaderboard rows ordered by total P&L, best first; ties by bot id.
pub fn rank_leaderboard(board: &Leaderboard) -> Vec<(&String, &LeaderboardEntry)> {
    let mut rows: Vec<_> = board.iter().collect();
    rows.sort_by(|a, b| {
        b.1.stats
            .total_pnl
            .cmp(&a.1.stats.total_pnl)
            .then_with(|| a.0.cmp(b.0))
    });
    rows
}
