use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::{BotIdentity, Chat, IncomingMessage, RelayChannel, RelayChannelFactory, Update};
use crate::errors::RelayError;

#[derive(Default)]
struct State {
    updates: Vec<Update>,
    offsets: Vec<i64>,
    sent: Vec<(i64, String)>,
    fail_sends: bool,
    fail_polls: bool,
}

/// An in-memory relay channel for testing. Serves queued updates the way
/// the real API does (everything at or after the offset) and records what
/// it was asked to send.
#[derive(Clone, Default)]
pub struct MockRelayChannel {
    state: Arc<Mutex<State>>,
    valid: bool,
}

impl MockRelayChannel {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            valid: true,
        }
    }

    /// A channel whose token the relay rejects.
    pub fn invalid() -> Self {
        Self {
            state: Arc::default(),
            valid: false,
        }
    }

    pub fn push_text(&self, update_id: i64, chat_id: i64, text: &str) {
        self.push(Update {
            update_id,
            message: Some(IncomingMessage {
                message_id: update_id,
                chat: Chat { id: chat_id },
                from: None,
                text: Some(text.to_string()),
            }),
        });
    }

    pub fn push(&self, update: Update) {
        self.state.lock().updates.push(update);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.state.lock().fail_sends = fail;
    }

    pub fn fail_polls(&self, fail: bool) {
        self.state.lock().fail_polls = fail;
    }

    /// Offsets of every `get_updates` call so far.
    pub fn offsets(&self) -> Vec<i64> {
        self.state.lock().offsets.clone()
    }

    pub fn poll_count(&self) -> usize {
        self.state.lock().offsets.len()
    }

    /// Every attempted delivery, including failed ones.
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.state.lock().sent.clone()
    }
}

#[async_trait]
impl RelayChannel for MockRelayChannel {
    async fn get_me(&self) -> Result<BotIdentity, RelayError> {
        if !self.valid {
            return Err(RelayError::InvalidToken);
        }
        Ok(BotIdentity {
            id: 1,
            first_name: "Mock".to_string(),
            username: Some("mock_bot".to_string()),
        })
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, RelayError> {
        let mut state = self.state.lock();
        state.offsets.push(offset);
        if state.fail_polls {
            return Err(RelayError::Unreachable("mock poll failure".to_string()));
        }
        Ok(state
            .updates
            .iter()
            .filter(|update| update.update_id >= offset)
            .cloned()
            .collect())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), RelayError> {
        let mut state = self.state.lock();
        state.sent.push((chat_id, text.to_string()));
        if state.fail_sends {
            return Err(RelayError::UpstreamRejected {
                status: 400,
                description: "mock send failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Hands out one `MockRelayChannel` per token, the same one on every call.
#[derive(Clone, Default)]
pub struct MockRelayFactory {
    channels: Arc<Mutex<HashMap<String, MockRelayChannel>>>,
}

impl MockRelayFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the channel served for `token`.
    pub fn insert(&self, token: &str, channel: MockRelayChannel) {
        self.channels.lock().insert(token.to_string(), channel);
    }

    pub fn get(&self, token: &str) -> MockRelayChannel {
        self.channels
            .lock()
            .entry(token.to_string())
            .or_insert_with(MockRelayChannel::new)
            .clone()
    }
}

impl RelayChannelFactory for MockRelayFactory {
    fn channel(&self, token: &str) -> Arc<dyn RelayChannel> {
        Arc::new(self.get(token))
    }
}
