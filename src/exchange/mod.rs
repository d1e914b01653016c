//! Exchange and backend integrations.
//!
//! ## Direct feeds
//! Public funding endpoints polled without credentials:
//! - Binance USDⓈ-M `premiumIndex` (plus `fundingInfo` intervals and a
//!   mark-price WebSocket stream)
//! - Bybit v5 linear tickers (plus instrument funding intervals)
//! - CoinSwitch all-pairs ticker
//!
//! ## Backend
//! The companion service aggregates rates, serves interval metadata, and
//! fronts trade scheduling, auto-trading and Telegram relay.

mod backend;
mod bybit;
mod client;
mod coinswitch;
mod http;
pub mod mock;
mod traits;
mod types;
mod websocket;

pub use backend::{parse_metadata, BackendClient, StreamStatus};
pub use bybit::BybitClient;
pub use client::BinanceClient;
pub use coinswitch::{CoinSwitchClient, DEFAULT_TICKER_URL};
pub use mock::MockRateFeed;
pub use traits::{DirectSource, FeedError, RateFeed, RateSource};
pub use types::*;
pub use websocket::{parse_mark_price_frame, BinanceMarkPriceStream, StreamEvent};
