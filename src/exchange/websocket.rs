//! Binance mark-price stream.
//!
//! `!markPrice@arr@1s` pushes every perpetual's mark price, funding rate
//! and next funding time once per second. Frames are normalized into
//! partial Binance snapshots and forwarded over a channel.

use super::types::{ExchangeResponse, RateSnapshot};
use crate::pipeline::normalizer::normalize;
use anyhow::{Context, Result};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, trace, warn};

const FUTURES_WS_URL: &str = "wss://fstream.binance.com";
const FUTURES_TESTNET_WS_URL: &str = "wss://stream.binancefuture.com";

/// Stream events.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Normalized Binance records from one frame
    Rates(RateSnapshot),
    Connected,
    Disconnected,
}

/// Normalize one mark-price frame.
///
/// Frames are arrays of `{ s, p, r, T, ... }`; anything else yields `None`.
pub fn parse_mark_price_frame(text: &str) -> Option<RateSnapshot> {
    let value: Value = serde_json::from_str(text).ok()?;
    if !value.is_array() {
        return None;
    }
    let snapshot = normalize(&ExchangeResponse::from_value(value)?);
    (!snapshot.is_empty()).then_some(snapshot)
}

/// Binance futures mark-price stream client.
pub struct BinanceMarkPriceStream {
    base_url: String,
}

impl BinanceMarkPriceStream {
    pub fn new(testnet: bool) -> Self {
        let base_url = if testnet {
            FUTURES_TESTNET_WS_URL
        } else {
            FUTURES_WS_URL
        };
        Self::with_base_url(base_url)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Connect and spawn a reader that forwards events to `tx`.
    ///
    /// Returns once connected. The reader exits on close, error, or when
    /// the receiver is dropped; reconnecting is the caller's job.
    pub async fn subscribe(&self, tx: mpsc::Sender<StreamEvent>) -> Result<()> {
        let url = format!("{}/ws/!markPrice@arr@1s", self.base_url);
        info!("Connecting to WebSocket: {}", url);

        let (ws_stream, _) = connect_async(&url)
            .await
            .context("Failed to connect to WebSocket")?;

        let (_write, mut read) = ws_stream.split();

        let _ = tx.send(StreamEvent::Connected).await;

        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let Some(snapshot) = parse_mark_price_frame(&text) else {
                            trace!("Ignoring non mark-price frame");
                            continue;
                        };
                        if tx.send(StreamEvent::Rates(snapshot)).await.is_err() {
                            warn!("Stream receiver dropped");
                            return;
                        }
                    }
                    Ok(Message::Ping(_)) => {
                        debug!("Received ping");
                    }
                    Ok(Message::Close(_)) => {
                        info!("WebSocket closed by server");
                        let _ = tx.send(StreamEvent::Disconnected).await;
                        return;
                    }
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        let _ = tx.send(StreamEvent::Disconnected).await;
                        return;
                    }
                    _ => {}
                }
            }
            let _ = tx.send(StreamEvent::Disconnected).await;
        });

        Ok(())
    }
}
