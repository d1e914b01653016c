//! Client for the companion backend service.
//!
//! The backend aggregates exchange rates, serves interval metadata, runs the
//! trade scheduler and auto-trader, and relays Telegram messages. Requests
//! go to the primary URL first and fail over to the backup when the primary
//! is unreachable or answers with a server error.

use super::http::build_client;
use super::traits::{FeedError, RateSource};
use super::types::*;
use crate::alerts::AlertPayload;
use crate::config::{BackendConfig, CredentialsConfig};
use crate::pipeline::normalizer::{normalize_backend_rates, strip_quote_suffix};
use crate::trading::{
    parse_binance_balances, parse_bybit_wallet, AssetBalance, AutoTradeConfig, AutoTradeStatus,
    CloseAllReport, ClosedTrade, Leaderboard, PnlOverview, ScheduleTradeRequest,
    ScheduleTradeResponse, ScheduledTasks, SymbolPositions, WalletSummary,
};
use crate::utils::decimal::i64_from_json;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

/// `GET /api/ws/status` body.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamStatus {
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SymbolList {
    #[serde(default)]
    symbols: Vec<String>,
}

/// Backend REST client with primary/backup failover.
pub struct BackendClient {
    http: Client,
    base_urls: Vec<String>,
    is_live: bool,
    credentials: CredentialsConfig,
}

impl BackendClient {
    /// Create a backend client from configuration.
    pub fn new(config: &BackendConfig, credentials: CredentialsConfig) -> Result<Self> {
        let mut base_urls = vec![config.primary_url.trim_end_matches('/').to_string()];
        if let Some(backup) = config.backup_url.as_deref().filter(|u| !u.trim().is_empty()) {
            base_urls.push(backup.trim_end_matches('/').to_string());
        }

        Ok(Self {
            http: build_client(config.request_timeout_secs)?,
            base_urls,
            is_live: config.is_live,
            credentials,
        })
    }

    /// Base URL requests are sent to first.
    pub fn primary_url(&self) -> &str {
        &self.base_urls[0]
    }

    /// Send a request, failing over to the next base URL on transport
    /// errors and 5xx responses. Client errors are returned immediately.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, FeedError> {
        let mut last_error = None;

        for base in &self.base_urls {
            let url = format!("{}{}", base, path);
            let mut request = self.http.request(method.clone(), &url);
            for (name, value) in self.credentials.headers() {
                request = request.header(name, value);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(source) => {
                    warn!(%url, "Backend unreachable: {}", source);
                    last_error = Some(FeedError::Http { url, source });
                    continue;
                }
            };

            let status = response.status();
            if status.is_server_error() {
                warn!(%url, %status, "Backend server error");
                last_error = Some(FeedError::Status { url, status });
                continue;
            }
            if !status.is_success() {
                return Err(FeedError::Status { url, status });
            }

            return response.json::<T>().await.map_err(|e| FeedError::Decode {
                url,
                reason: e.to_string(),
            });
        }

        Err(last_error.unwrap_or_else(|| FeedError::Api("no backend URL configured".to_string())))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, FeedError> {
        self.request(Method::GET, path, None).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, FeedError> {
        let body = serde_json::to_value(body).map_err(|e| FeedError::Api(e.to_string()))?;
        self.request(Method::POST, path, Some(body)).await
    }

    /// Aggregated rates: `{ binance: {...}, bybit: {...}, source }`.
    #[instrument(skip(self), name = "backend_rates")]
    pub async fn get_rates(&self) -> Result<Value, FeedError> {
        self.get(&format!("/api/rates?is_live={}", self.is_live)).await
    }

    /// Funding intervals per symbol and exchange.
    #[instrument(skip(self), name = "backend_metadata")]
    pub async fn get_metadata(&self) -> Result<IntervalMetadata, FeedError> {
        let body: Value = self.get("/api/metadata").await?;
        Ok(parse_metadata(&body))
    }

    /// Symbols tradable on the Binance testnet, as canonical bases.
    #[instrument(skip(self), name = "backend_testnet_symbols")]
    pub async fn get_testnet_symbols(&self) -> Result<Vec<String>, FeedError> {
        let list: SymbolList = self.get("/api/binance/testnet-symbols").await?;
        Ok(list
            .symbols
            .iter()
            .map(|s| strip_quote_suffix(s).unwrap_or_else(|| s.trim().to_ascii_uppercase()))
            .filter(|s| !s.is_empty())
            .collect())
    }

    /// Queue a trade around the next funding settlement.
    #[instrument(skip(self, request), fields(symbol = %request.symbol))]
    pub async fn schedule_trade(
        &self,
        request: &ScheduleTradeRequest,
    ) -> Result<ScheduleTradeResponse, FeedError> {
        self.post("/api/schedule-trade", request).await
    }

    pub async fn get_scheduled_tasks(&self) -> Result<ScheduledTasks, FeedError> {
        self.get("/api/scheduled-tasks").await
    }

    pub async fn auto_trade_status(&self) -> Result<AutoTradeStatus, FeedError> {
        self.get("/api/auto-trade/status").await
    }

    #[instrument(skip(self, config), name = "backend_auto_trade_config")]
    pub async fn configure_auto_trade(&self, config: &AutoTradeConfig) -> Result<Value, FeedError> {
        self.post("/api/auto-trade/config", config).await
    }

    /// Drop an auto-trade, optionally closing its positions on the exchanges.
    #[instrument(skip(self), name = "backend_remove_trade")]
    pub async fn remove_auto_trade(
        &self,
        symbol: &str,
        close_on_exchange: bool,
    ) -> Result<Value, FeedError> {
        let path = format!(
            "/api/auto-trade/trade/{}?close_on_exchange={}",
            urlencoding::encode(symbol),
            close_on_exchange
        );
        self.request(Method::DELETE, &path, None).await
    }

    /// Start the backend's own Binance stream.
    pub async fn start_stream(&self) -> Result<Value, FeedError> {
        let path = format!("/api/ws/start?is_live={}", self.is_live);
        self.request(Method::POST, &path, None).await
    }

    pub async fn stop_stream(&self) -> Result<Value, FeedError> {
        self.request(Method::POST, "/api/ws/stop", None).await
    }

    pub async fn stream_status(&self) -> Result<StreamStatus, FeedError> {
        self.get("/api/ws/status").await
    }

    pub async fn pnl_overview(&self) -> Result<PnlOverview, FeedError> {
        self.get("/api/pnl/overview").await
    }

    /// Closed trades, as recorded by the auto-trader.
    pub async fn pnl_history(&self) -> Result<Vec<ClosedTrade>, FeedError> {
        self.get("/api/pnl/history").await
    }

    /// Ask the auto-trader to reconcile its book with exchange positions.
    #[instrument(skip(self), name = "backend_sync_positions")]
    pub async fn sync_positions(&self) -> Result<Value, FeedError> {
        let path = format!("/api/auto-trade/sync-positions?is_live={}", self.is_live);
        self.request(Method::POST, &path, None).await
    }

    /// Open legs for one symbol on both venues.
    #[instrument(skip(self), name = "backend_positions")]
    pub async fn positions(&self, symbol: &str) -> Result<SymbolPositions, FeedError> {
        let path = format!("/api/positions?symbol={}", urlencoding::encode(symbol));
        self.get(&path).await
    }

    /// Market-close every open position on both venues.
    #[instrument(skip(self), name = "backend_close_all")]
    pub async fn close_all_positions(&self) -> Result<CloseAllReport, FeedError> {
        self.request(Method::POST, "/api/close-all-positions", None).await
    }

    /// Bybit unified-account totals.
    pub async fn bybit_wallet(&self) -> Result<WalletSummary, FeedError> {
        let body: Value = self.get("/api/wallet-balance").await?;
        parse_bybit_wallet(&body)
    }

    /// Non-zero Binance futures balances; testnet unless running live.
    pub async fn binance_wallet(&self) -> Result<Vec<AssetBalance>, FeedError> {
        let path = format!("/api/binance/wallet-balance?is_testnet={}", !self.is_live);
        let body: Value = self.get(&path).await?;
        parse_binance_balances(&body)
    }

    pub async fn leaderboard(&self) -> Result<Leaderboard, FeedError> {
        self.get("/api/leaderboard").await
    }

    /// Relay a Telegram message through the backend.
    #[instrument(skip(self, payload), name = "backend_telegram")]
    pub async fn send_telegram(&self, payload: &AlertPayload) -> Result<Value, FeedError> {
        self.post("/api/telegram/send", payload).await
    }
}

/// Parse `/api/metadata`: `{ "<SYMBOL>": { "<exchange>": <hours> } }`.
///
/// Unknown exchanges and non-positive intervals are skipped.
pub fn parse_metadata(body: &Value) -> IntervalMetadata {
    let mut metadata = IntervalMetadata::new();
    let Some(symbols) = body.as_object() else {
        return metadata;
    };

    for (symbol, by_exchange) in symbols {
        let Some(by_exchange) = by_exchange.as_object() else {
            continue;
        };
        for (key, hours) in by_exchange {
            let (Ok(exchange), Some(hours)) = (key.parse::<ExchangeId>(), i64_from_json(hours))
            else {
                continue;
            };
            if let Ok(hours) = u32::try_from(hours) {
                if hours > 0 {
                    metadata
                        .entry(symbol.to_ascii_uppercase())
                        .or_default()
                        .insert(exchange, hours);
                }
            }
        }
    }

    metadata
}

#[async_trait]
impl RateSource for BackendClient {
    fn name(&self) -> &str {
        "backend"
    }

    async fn fetch_snapshots(&self) -> Result<Vec<(ExchangeId, RateSnapshot)>, FeedError> {
        let body = self.get_rates().await?;
        let snapshots = normalize_backend_rates(&body);
        debug!(
            exchanges = snapshots.len(),
            source = body.get("source").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
            "Backend rates normalized"
        );
        Ok(snapshots)
    }

    async fn fetch_intervals(&self) -> Result<IntervalMetadata, FeedError> {
        self.get_metadata().await
    }

    async fn fetch_tradable(&self) -> Result<HashSet<String>, FeedError> {
        Ok(self.get_testnet_symbols().await?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::{Platform, TradeDirection};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(primary: &str, backup: Option<&str>) -> BackendClient {
        let config = BackendConfig {
            primary_url: primary.to_string(),
            backup_url: backup.map(str::to_string),
            is_live: true,
            request_timeout_secs: 5,
        };
        BackendClient::new(&config, CredentialsConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_snapshots_from_rates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/rates"))
            .and(query_param("is_live", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "binance": {"BTC": {"rate": 0.0001, "markPrice": 50000.5, "nextFundingTime": 1700000000000_i64}},
                "bybit": {"BTC": {"rate": -0.0002}},
                "source": "websocket"
            })))
            .mount(&server)
            .await;

        let snapshots = client(&server.uri(), None).fetch_snapshots().await.unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[1].0, ExchangeId::Bybit);
        assert_eq!(snapshots[1].1["BTC"].rate, dec!(-0.0002));
    }

    #[tokio::test]
    async fn test_fails_over_to_backup() {
        let primary = MockServer::start().await;
        let backup = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/metadata"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&primary)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/metadata"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "BTC": {"binance": 8, "bybit": 4},
                "ETH": {"bybit": 0, "okx": 1}
            })))
            .expect(1)
            .mount(&backup)
            .await;

        let metadata = client(&primary.uri(), Some(&backup.uri()))
            .fetch_intervals()
            .await
            .unwrap();

        assert_eq!(metadata["BTC"][&ExchangeId::Binance], 8);
        assert_eq!(metadata["BTC"][&ExchangeId::Bybit], 4);
        assert!(!metadata.contains_key("ETH"));
    }

    #[tokio::test]
    async fn test_client_error_does_not_fail_over() {
        let primary = MockServer::start().await;
        let backup = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/auto-trade/status"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&primary)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&backup)
            .await;

        let result = client(&primary.uri(), Some(&backup.uri()))
            .auto_trade_status()
            .await;
        assert!(matches!(result, Err(FeedError::Status { .. })));
    }

    #[tokio::test]
    async fn test_schedule_trade_forwards_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/schedule-trade"))
            .and(header("X-User-Bybit-Key", "by-key"))
            .and(body_partial_json(json!({"symbol": "BTC", "targetTime": 1700000000, "platform": "Both"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "queued", "taskId": "abc-123"})),
            )
            .mount(&server)
            .await;

        let config = BackendConfig {
            primary_url: server.uri(),
            ..Default::default()
        };
        let credentials = CredentialsConfig {
            bybit_api_key: "by-key".to_string(),
            ..Default::default()
        };
        let backend = BackendClient::new(&config, credentials).unwrap();

        let response = backend
            .schedule_trade(&ScheduleTradeRequest {
                symbol: "BTC".to_string(),
                direction: TradeDirection::Auto,
                target_time: 1_700_000_000,
                leverage: 5,
                qty: dec!(0.01),
                platform: Platform::Both,
            })
            .await
            .unwrap();

        assert_eq!(response.task_id, "abc-123");
    }

    #[tokio::test]
    async fn test_remove_auto_trade_encodes_symbol() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/auto-trade/trade/1000PEPE"))
            .and(query_param("close_on_exchange", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "removed"})))
            .expect(1)
            .mount(&server)
            .await;

        let body = client(&server.uri(), None)
            .remove_auto_trade("1000PEPE", true)
            .await
            .unwrap();
        assert_eq!(body["status"], "removed");
    }

    #[tokio::test]
    async fn test_testnet_symbols_are_canonical() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/binance/testnet-symbols"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "symbols": ["BTCUSDT", "ethusdt", "SOL"]
            })))
            .mount(&server)
            .await;

        let tradable = client(&server.uri(), None).fetch_tradable().await.unwrap();
        assert_eq!(
            tradable,
            HashSet::from(["BTC".to_string(), "ETH".to_string(), "SOL".to_string()])
        );
    }

    #[test]
    fn test_parse_metadata_ignores_garbage() {
        assert!(parse_metadata(&json!(null)).is_empty());
        let metadata = parse_metadata(&json!({"btc": {"binance": "4"}, "X": 3}));
        assert_eq!(metadata["BTC"][&ExchangeId::Binance], 4);
    }

    #[tokio::test]
    async fn test_pnl_overview_and_history() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/pnl/overview"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "summary": {"total_pnl": 3.5, "total_trades": 2, "pnl_24h": 1.25},
                "active_trades": {"count": 0, "list": []}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/pnl/history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 7, "symbol": "ETH", "exit_time": 1700000000.0, "realized_profit": 0.4}
            ])))
            .mount(&server)
            .await;

        let backend = client(&server.uri(), None);
        let overview = backend.pnl_overview().await.unwrap();
        assert_eq!(overview.summary.total_trades, 2);
        assert_eq!(overview.summary.pnl_24h, dec!(1.25));

        let history = backend.pnl_history().await.unwrap();
        assert_eq!(history[0].symbol, "ETH");
        assert_eq!(history[0].realized_profit, Some(dec!(0.4)));
    }

    #[tokio::test]
    async fn test_sync_positions_sends_mode_and_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auto-trade/sync-positions"))
            .and(query_param("is_live", "true"))
            .and(header("X-User-Bybit-Key", "bk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "synced"})))
            .expect(1)
            .mount(&server)
            .await;

        let config = BackendConfig {
            primary_url: server.uri(),
            ..Default::default()
        };
        let credentials = CredentialsConfig {
            bybit_api_key: "bk".to_string(),
            ..Default::default()
        };
        let body = BackendClient::new(&config, credentials)
            .unwrap()
            .sync_positions()
            .await
            .unwrap();
        assert_eq!(body["status"], "synced");
    }

    #[tokio::test]
    async fn test_positions_and_close_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/positions"))
            .and(query_param("symbol", "BTC"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bybit": {"side": "Sell", "size": 0.01, "entryPrice": 65000.0, "pnl": -0.3},
                "binance": {"side": "Buy", "size": 0.01, "entryPrice": 64990.0, "pnl": 0.5}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/close-all-positions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bybit": ["Closed BTC Sell 0.01"],
                "binance": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = client(&server.uri(), None);
        let positions = backend.positions("BTC").await.unwrap();
        assert_eq!(positions.total_pnl(), dec!(0.2));

        let report = backend.close_all_positions().await.unwrap();
        assert_eq!(report.bybit.len(), 1);
        assert!(report.binance.is_empty());
    }

    #[tokio::test]
    async fn test_wallets_follow_mode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/wallet-balance"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "retCode": 0,
                "result": {"list": [{"totalEquity": "10", "totalWalletBalance": "9", "totalAvailableBalance": "8"}]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/binance/wallet-balance"))
            .and(query_param("is_testnet", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"asset": "USDT", "balance": "42", "availableBalance": "40"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let backend = client(&server.uri(), None);
        assert_eq!(backend.bybit_wallet().await.unwrap().available_balance, dec!(8));
        let balances = backend.binance_wallet().await.unwrap();
        assert_eq!(balances[0].asset, "USDT");
    }

    #[tokio::test]
    async fn test_leaderboard() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/leaderboard"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bot-1": {"name": "Alpha", "stats": {"total_pnl": 1.0, "total_trades": 4}, "last_seen": 1700000000.0}
            })))
            .mount(&server)
            .await;

        let board = client(&server.uri(), None).leaderboard().await.unwrap();
        assert_eq!(board["bot-1"].stats.total_trades, 4);
    }
}
