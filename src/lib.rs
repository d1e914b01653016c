//! # Funding Arbitrage Scanner
//!
//! Compares perpetual funding rates across Binance, Bybit and CoinSwitch,
//! ranks cross-exchange spreads by annualized yield, and sends Telegram
//! alerts shortly before settlement when the difference is large.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `exchange`: Exchange feeds (REST + WebSocket) and the backend client
//! - `pipeline`: Normalize, merge, compute and rank (pure, no I/O)
//! - `alerts`: Funding-window alert trigger and delivery
//! - `monitor`: Refresh loop that owns market state
//! - `persistence`: SQLite alert history
//! - `trading`: Backend trade scheduling and auto-trade contract
//! - `utils`: Shared utilities and decimal arithmetic

pub mod alerts;
pub mod config;
pub mod exchange;
pub mod monitor;
pub mod persistence;
pub mod pipeline;
pub mod trading;
pub mod utils;

pub use config::Config;
