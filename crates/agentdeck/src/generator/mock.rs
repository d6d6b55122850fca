use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use super::ReplyGenerator;
use crate::errors::GenerationResult;
use crate::models::agent::{AgentConfig, AgentId};

/// A generator that returns pre-configured results for testing, recording
/// every call it receives.
#[derive(Clone, Default)]
pub struct MockGenerator {
    replies: Arc<Mutex<VecDeque<GenerationResult<String>>>>,
    calls: Arc<Mutex<Vec<(AgentId, String)>>>,
}

impl MockGenerator {
    /// Create a mock with a sequence of results. Once they run out every
    /// call echoes the message back.
    pub fn new(replies: Vec<GenerationResult<String>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            calls: Arc::default(),
        }
    }

    pub fn echo() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(AgentId, String)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ReplyGenerator for MockGenerator {
    async fn generate(&self, message: &str, agent: &AgentConfig) -> GenerationResult<String> {
        self.calls.lock().push((agent.id, message.to_string()));
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("echo: {}", message)))
    }
}
