use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::GenerationResult;

/// A single-turn, non-streaming completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub message: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(
        model: impl Into<String>,
        system: impl Into<String>,
        message: impl Into<String>,
        temperature: f64,
        max_tokens: u32,
    ) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            message: message.into(),
            temperature,
            max_tokens,
        }
    }
}

/// Base trait for generation backends (Ollama, OpenAI-compatible, Anthropic)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human readable backend name used in errors
    fn name(&self) -> &str;

    /// Generate the full reply text for the request
    async fn complete(&self, request: &CompletionRequest) -> GenerationResult<String>;
}
