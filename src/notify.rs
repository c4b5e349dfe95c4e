use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::DeliveryError;

pub const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    #[default]
    Plain,
    RichText,
}

/// What happened to a message that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    NotConfigured,
}

pub trait Notifier {
    async fn send(&self, text: &str, mode: ParseMode) -> Result<Delivery, DeliveryError>;
}

/// Telegram Bot API `sendMessage`. Without both credentials every send is a
/// logged no-op.
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    credentials: Option<(String, String)>,
}

impl TelegramNotifier {
    pub fn new(
        api_base: impl Into<String>,
        token: Option<String>,
        chat_id: Option<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let nonblank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let credentials = nonblank(token).zip(nonblank(chat_id));
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str, mode: ParseMode) -> Result<Delivery, DeliveryError> {
        let Some((token, chat_id)) = &self.credentials else {
            warn!("Telegram not configured (missing TG_TOKEN or TG_CHAT_ID); message not sent");
            return Ok(Delivery::NotConfigured);
        };

        let payload = match mode {
            ParseMode::Plain => json!({ "chat_id": chat_id, "text": text }),
            ParseMode::RichText => json!({
                "chat_id": chat_id,
                "text": escape_html(text),
                "parse_mode": "HTML",
            }),
        };

        let url = format!("{}/bot{}/sendMessage", self.api_base, token);
        // The token is part of the URL; keep it out of error messages.
        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Http(e.without_url()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            return Err(DeliveryError::Rejected(format!("HTTP {}: {}", status, body)));
        }

        info!(chars = text.chars().count(), "Notification sent");
        Ok(Delivery::Sent)
    }
}

/// Telegram's HTML mode rejects bare `&`, `<` and `>`.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
