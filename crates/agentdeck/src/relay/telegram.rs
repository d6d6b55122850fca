use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{BotIdentity, RelayChannel, RelayChannelFactory, Update};
use crate::errors::RelayError;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Telegram Bot API over plain short polling.
pub struct TelegramRelay {
    client: Client,
    api_base: String,
    token: String,
}

impl TelegramRelay {
    pub fn new(client: Client, api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            token: token.into(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base.trim_end_matches('/'),
            self.token,
            method
        )
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RelayError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::NOT_FOUND {
            return Err(RelayError::InvalidToken);
        }

        let envelope: Envelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(RelayError::InvalidResponse(e.to_string())),
            Err(_) => {
                return Err(RelayError::UpstreamRejected {
                    status: status.as_u16(),
                    description: body,
                })
            }
        };

        if !envelope.ok {
            return Err(RelayError::UpstreamRejected {
                status: status.as_u16(),
                description: envelope.description.unwrap_or_default(),
            });
        }

        envelope
            .result
            .ok_or_else(|| RelayError::InvalidResponse("envelope without result".to_string()))
    }
}

#[async_trait]
impl RelayChannel for TelegramRelay {
    async fn get_me(&self) -> Result<BotIdentity, RelayError> {
        self.call(self.client.get(self.url("getMe"))).await
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, RelayError> {
        let request = self
            .client
            .get(self.url("getUpdates"))
            .query(&[("offset", offset)]);
        self.call(request).await
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), RelayError> {
        let request = self.client.post(self.url("sendMessage")).json(&json!({
            "chat_id": chat_id,
            "text": text
        }));
        // The sent message is echoed back; only success matters
        self.call::<serde_json::Value>(request).await.map(|_| ())
    }
}

#[derive(Clone)]
pub struct TelegramRelayFactory {
    client: Client,
    api_base: String,
}

impl TelegramRelayFactory {
    pub fn new(client: Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
        }
    }
}

impl RelayChannelFactory for TelegramRelayFactory {
    fn channel(&self, token: &str) -> Arc<dyn RelayChannel> {
        Arc::new(TelegramRelay::new(
            self.client.clone(),
            self.api_base.clone(),
            token,
        ))
    }
}
