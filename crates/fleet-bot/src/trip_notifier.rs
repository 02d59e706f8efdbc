use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use fleet_telemetry::TripNotifier;

use crate::telegram_api_client::{MessagingTransport, TextFormat};

/// Delivers trip summaries from the telemetry loop to a fixed chat.
pub struct TransportTripNotifier {
    transport: Arc<dyn MessagingTransport>,
    chat_id: i64,
}

impl TransportTripNotifier {
    pub fn new(transport: Arc<dyn MessagingTransport>, chat_id: i64) -> Self {
        Self { transport, chat_id }
    }
}

#[async_trait]
impl TripNotifier for TransportTripNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        self.transport
            .send_text(self.chat_id, text, TextFormat::Plain)
            .await
            .with_context(|| format!("failed to send trip summary to chat {}", self.chat_id))
    }
}
