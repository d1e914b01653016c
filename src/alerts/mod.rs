//! Funding-window alerts: trigger evaluation and delivery.

pub mod notifier;
pub mod trigger;

pub use notifier::{AlertPayload, BackendRelayNotifier, Notifier, NotifyError, TelegramNotifier};
pub use trigger::{AlertLedger, AlertSettings, AlertTrigger, FundingAlert};

use crate::config::AlertsConfig;
use crate::exchange::ExchangeId;
use std::sync::Arc;
use tracing::{error, info};

/// Turns fired alerts into payloads and hands them to a notifier.
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    token: String,
    chat_id: String,
    image_url: Option<String>,
    button_exchange: ExchangeId,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, config: &AlertsConfig, button_exchange: ExchangeId) -> Self {
        Self {
            notifier,
            token: config.telegram_token.clone(),
            chat_id: config.telegram_chat_id.clone(),
            image_url: config.image_url.clone(),
            button_exchange,
        }
    }

    /// Payload for one alert, with a trade link button.
    pub fn payload_for(&self, alert: &FundingAlert) -> AlertPayload {
        AlertPayload::new(&self.token, &self.chat_id, alert.message.clone())
            .with_image(self.image_url.clone())
            .with_button(
                &format!("Open on {}", self.button_exchange),
                self.button_exchange.trade_url(&alert.symbol),
            )
    }

    /// Deliver each alert once. Returns whether each delivery succeeded.
    ///
    /// Failures are logged; the caller's ledger is left as is.
    pub async fn dispatch(&self, alerts: Vec<FundingAlert>) -> Vec<(FundingAlert, bool)> {
        let mut results = Vec::with_capacity(alerts.len());

        for alert in alerts {
            let payload = self.payload_for(&alert);
            let delivered = match self.notifier.send(&payload).await {
                Ok(()) => {
                    info!(symbol = %alert.symbol, "Alert delivered");
                    true
                }
                Err(e) => {
                    error!(symbol = %alert.symbol, "Alert delivery failed: {}", e);
                    false
                }
            };
            results.push((alert, delivered));
        }

        results
    }
}
