// src/notify/telegram.rs
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

use super::{DeliveryError, Notifier};
use crate::format::{MessageChunk, TextFormat};

const API_BASE: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramNotifier {
    token: String,
    api_base: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

impl TelegramNotifier {
    pub fn new(token: String) -> Self {
        Self {
            token,
            api_base: API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }

    /// Reads `TELEGRAM_BOT_TOKEN`.
    pub fn from_env() -> anyhow::Result<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("TELEGRAM_BOT_TOKEN is not set"))?;
        Ok(Self::new(token))
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn retryable(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, target: &str, chunk: &MessageChunk) -> Result<(), DeliveryError> {
        if target.trim().is_empty() {
            return Err(DeliveryError::NotConfigured("TELEGRAM_CHAT_ID is empty".into()));
        }
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let payload = SendMessage {
            chat_id: target,
            text: &chunk.text,
            disable_web_page_preview: true,
            parse_mode: match chunk.format {
                TextFormat::Html => Some("HTML"),
                TextFormat::Plain => None,
            },
        };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let backoff = Duration::from_millis(500u64 << (attempt - 1));
            let res = self
                .client
                .post(&url)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) if rsp.status().is_success() => {
                    tracing::debug!(target: "notify", chars = chunk.char_len(), "telegram message sent");
                    return Ok(());
                }
                Ok(rsp) => {
                    let status = rsp.status();
                    if Self::retryable(status) && attempt < self.max_retries {
                        tracing::debug!(target: "notify", %status, attempt, "telegram retry");
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    let body = rsp.text().await.unwrap_or_default();
                    return Err(DeliveryError::Rejected {
                        status: status.as_u16(),
                        body: body.chars().take(300).collect(),
                    });
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    // reqwest errors carry the URL, which contains the token
                    return Err(DeliveryError::Transport(e.without_url().to_string()));
                }
            }
        }
    }
}
