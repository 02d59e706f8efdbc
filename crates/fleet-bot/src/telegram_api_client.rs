//! Telegram Bot API transport: update polling, text and location messages.

use std::time::Duration;

use async_trait::async_trait;
use fleet_core::{sleep_retry_backoff, truncate_body};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSender {
    pub id: i64,
    pub handle: Option<String>,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One inbound update. Non-text updates carry an empty `text` so the cursor can
/// still advance past them.
pub struct InboundMessage {
    pub update_id: i64,
    pub chat_id: i64,
    pub sender: MessageSender,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Markdown,
}

#[derive(Debug, Error)]
pub enum TelegramApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("telegram api returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("telegram api {method} failed: {description}")]
    Api {
        method: &'static str,
        description: String,
    },
    #[error("invalid telegram response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
/// Send/receive primitives the command bot needs from a messaging service.
pub trait MessagingTransport: Send + Sync {
    /// Updates with ids strictly greater than `after_update_id`, oldest first.
    async fn fetch_updates(
        &self,
        after_update_id: Option<i64>,
    ) -> Result<Vec<InboundMessage>, TelegramApiError>;
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        format: TextFormat,
    ) -> Result<(), TelegramApiError>;
    async fn send_location(&self, chat_id: i64, lat: f64, lon: f64)
        -> Result<(), TelegramApiError>;
}

#[derive(Debug, Clone)]
pub struct TelegramApiClientConfig {
    pub api_base: String,
    pub bot_token: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct TelegramEnvelope<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    chat: TelegramChat,
    #[serde(default)]
    from: Option<TelegramUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: Option<String>,
}

impl TelegramUpdate {
    fn into_inbound(self) -> InboundMessage {
        let Some(message) = self.message else {
            return InboundMessage {
                update_id: self.update_id,
                chat_id: 0,
                sender: MessageSender {
                    id: 0,
                    handle: None,
                    display_name: String::new(),
                },
                text: String::new(),
            };
        };
        let sender = match message.from {
            Some(user) => MessageSender {
                id: user.id,
                handle: user.username.filter(|name| !name.trim().is_empty()),
                display_name: match user.last_name.filter(|name| !name.trim().is_empty()) {
                    Some(last_name) => format!("{} {last_name}", user.first_name),
                    None => user.first_name,
                },
            },
            None => MessageSender {
                id: message.chat.id,
                handle: None,
                display_name: String::new(),
            },
        };
        InboundMessage {
            update_id: self.update_id,
            chat_id: message.chat.id,
            sender,
            text: message.text.unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct TelegramApiClient {
    http: reqwest::Client,
    config: TelegramApiClientConfig,
}

impl TelegramApiClient {
    pub fn new(config: TelegramApiClientConfig) -> Result<Self, TelegramApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;
        Ok(Self {
            http,
            config: TelegramApiClientConfig {
                api_base: config.api_base.trim().trim_end_matches('/').to_string(),
                bot_token: config.bot_token.trim().to_string(),
                retry_max_attempts: config.retry_max_attempts.max(1),
                ..config
            },
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.config.api_base, self.config.bot_token
        )
    }

    async fn call<T, F>(&self, method: &'static str, build_request: F) -> Result<T, TelegramApiError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let max_attempts = self.config.retry_max_attempts;
        let mut attempt = 0usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = match build_request().send().await {
                Ok(response) => response,
                Err(error) => {
                    if attempt < max_attempts {
                        sleep_retry_backoff(self.config.retry_base_delay_ms, attempt).await;
                        continue;
                    }
                    return Err(TelegramApiError::Http(error));
                }
            };

            let status = response.status();
            if status.is_success() {
                let envelope = response.json::<TelegramEnvelope<T>>().await?;
                if !envelope.ok {
                    return Err(TelegramApiError::Api {
                        method,
                        description: envelope
                            .description
                            .unwrap_or_else(|| "unknown error".to_string()),
                    });
                }
                return envelope.result.ok_or_else(|| {
                    TelegramApiError::InvalidResponse(format!("{method} response missing result"))
                });
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < max_attempts {
                sleep_retry_backoff(self.config.retry_base_delay_ms, attempt).await;
                continue;
            }
            let body = response.text().await.unwrap_or_default();
            return Err(TelegramApiError::HttpStatus {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }
    }
}

#[async_trait]
impl MessagingTransport for TelegramApiClient {
    async fn fetch_updates(
        &self,
        after_update_id: Option<i64>,
    ) -> Result<Vec<InboundMessage>, TelegramApiError> {
        let url = self.method_url("getUpdates");
        let offset = after_update_id.map(|id| id.saturating_add(1));
        let updates: Vec<TelegramUpdate> = self
            .call("getUpdates", || {
                let request = self.http.get(url.as_str()).query(&[("timeout", "0")]);
                match offset {
                    Some(offset) => request.query(&[("offset", offset.to_string())]),
                    None => request,
                }
            })
            .await?;
        let mut messages = updates
            .into_iter()
            .map(TelegramUpdate::into_inbound)
            .collect::<Vec<_>>();
        messages.sort_by_key(|message| message.update_id);
        Ok(messages)
    }

    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        format: TextFormat,
    ) -> Result<(), TelegramApiError> {
        let url = self.method_url("sendMessage");
        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        if format == TextFormat::Markdown {
            payload["parse_mode"] = Value::String("Markdown".to_string());
        }
        let sent: Result<Value, _> = self
            .call("sendMessage", || self.http.post(url.as_str()).json(&payload))
            .await;
        match sent {
            Ok(_) => Ok(()),
            // Telegram rejects unbalanced Markdown entities with 400; resend as plain text.
            Err(TelegramApiError::HttpStatus { status: 400, body })
                if format == TextFormat::Markdown =>
            {
                tracing::debug!(chat_id, body = %body, "markdown rejected, resending as plain text");
                self.send_text(chat_id, text, TextFormat::Plain).await
            }
            Err(error) => Err(error),
        }
    }

    async fn send_location(
        &self,
        chat_id: i64,
        lat: f64,
        lon: f64,
    ) -> Result<(), TelegramApiError> {
        let url = self.method_url("sendLocation");
        let payload = json!({
            "chat_id": chat_id,
            "latitude": lat,
            "longitude": lon,
        });
        let _: Value = self
            .call("sendLocation", || self.http.post(url.as_str()).json(&payload))
            .await?;
        Ok(())
    }
}
