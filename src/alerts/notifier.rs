//! Alert delivery.
//!
//! Two notifiers are provided: direct calls to the Telegram Bot API, and a
//! relay through the backend's `/api/telegram/send`. Delivery is
//! best-effort and never retried.

use crate::exchange::{BackendClient, FeedError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Message handed to a notifier. Serialized in the backend relay's shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub token: String,
    pub chat_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button_url: Option<String>,
}

impl AlertPayload {
    pub fn new(token: &str, chat_id: &str, message: impl Into<String>) -> Self {
        Self {
            token: token.to_string(),
            chat_id: chat_id.to_string(),
            message: message.into(),
            image_url: None,
            button_text: None,
            button_url: None,
        }
    }

    pub fn with_image(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }

    /// Attach an inline link button.
    pub fn with_button(mut self, text: &str, url: String) -> Self {
        self.button_text = Some(text.to_string());
        self.button_url = Some(url);
        self
    }

    fn reply_markup(&self) -> Option<Value> {
        match (&self.button_text, &self.button_url) {
            (Some(text), Some(url)) => Some(json!({
                "inline_keyboard": [[{"text": text, "url": url}]]
            })),
            _ => None,
        }
    }
}

/// Delivery failure.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("telegram request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("telegram rejected message: {0}")]
    Rejected(String),
    #[error("backend relay failed: {0}")]
    Relay(#[from] FeedError),
}

/// Delivers alert payloads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, payload: &AlertPayload) -> Result<(), NotifyError>;
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Calls the Telegram Bot API directly.
pub struct TelegramNotifier {
    http: Client,
    api_url: String,
}

impl TelegramNotifier {
    pub fn new(timeout_secs: u64) -> Result<Self, NotifyError> {
        Self::with_api_url(TELEGRAM_API_URL, timeout_secs)
    }

    pub fn with_api_url(api_url: &str, timeout_secs: u64) -> Result<Self, NotifyError> {
        Ok(Self {
            http: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()?,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip(self, payload), name = "telegram_send")]
    async fn send(&self, payload: &AlertPayload) -> Result<(), NotifyError> {
        // Photos carry the text as a caption
        let (method, mut body) = match &payload.image_url {
            Some(image_url) => (
                "sendPhoto",
                json!({
                    "chat_id": payload.chat_id,
                    "photo": image_url,
                    "caption": payload.message,
                    "parse_mode": "Markdown",
                }),
            ),
            None => (
                "sendMessage",
                json!({
                    "chat_id": payload.chat_id,
                    "text": payload.message,
                    "parse_mode": "Markdown",
                }),
            ),
        };
        if let Some(markup) = payload.reply_markup() {
            body["reply_markup"] = markup;
        }

        // The URL embeds the bot token; strip it from any error
        let url = format!("{}/bot{}/{}", self.api_url, payload.token, method);
        let response: TelegramResponse = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.without_url()))?
            .json()
            .await
            .map_err(|e| NotifyError::Http(e.without_url()))?;

        if !response.ok {
            return Err(NotifyError::Rejected(
                response
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        debug!(method, "Telegram message delivered");
        Ok(())
    }
}

/// Relays payloads through the backend.
pub struct BackendRelayNotifier {
    backend: Arc<BackendClient>,
}

impl BackendRelayNotifier {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Notifier for BackendRelayNotifier {
    async fn send(&self, payload: &AlertPayload) -> Result<(), NotifyError> {
        let body = self.backend.send_telegram(payload).await?;

        // The relay answers 200 with {"status": "error"} when Telegram refuses
        match body.get("status").and_then(Value::as_str) {
            Some("error") => Err(NotifyError::Rejected(
                body.get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            )),
            _ => Ok(()),
        }
    }
}
