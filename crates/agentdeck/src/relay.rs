//! The chat-bot relay: an external channel agents answer messages on.

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod poller;
pub mod telegram;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::errors::RelayError;

pub use poller::{RelaySupervisor, RelayWorker};
pub use telegram::{TelegramRelay, TelegramRelayFactory, TELEGRAM_API_BASE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotIdentity {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sender {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Sender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl IncomingMessage {
    /// Display name of the sender for the conversation log.
    pub fn sender_name(&self) -> String {
        match &self.from {
            Some(Sender {
                username: Some(username),
                ..
            }) => username.clone(),
            Some(sender) if !sender.first_name.is_empty() => sender.first_name.clone(),
            Some(sender) => sender.id.to_string(),
            None => self.chat.id.to_string(),
        }
    }
}

/// One inbound event. Only text messages are answered; every other kind
/// just advances the cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<IncomingMessage>,
}

impl Update {
    pub fn text_message(&self) -> Option<(&IncomingMessage, &str)> {
        let message = self.message.as_ref()?;
        let text = message.text.as_deref()?;
        Some((message, text))
    }
}

/// A bot account on the relay, addressed by its token.
#[async_trait]
pub trait RelayChannel: Send + Sync {
    async fn get_me(&self) -> Result<BotIdentity, RelayError>;

    /// Updates with id >= `offset`, oldest first.
    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, RelayError>;

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), RelayError>;
}

/// Builds a channel for a bot token.
pub trait RelayChannelFactory: Send + Sync {
    fn channel(&self, token: &str) -> Arc<dyn RelayChannel>;
}

/// Check that a token belongs to a live bot.
pub async fn verify_token(channel: &dyn RelayChannel) -> Result<BotIdentity, RelayError> {
    channel.get_me().await.map_err(|e| {
        warn!("relay token verification failed: {}", e);
        RelayError::InvalidToken
    })
}
