use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::base::{CompletionRequest, Provider};
use super::configs::OllamaProviderConfig;
use super::utils::{compose_prompt, ollama_response_text, send_json};
use crate::errors::{GenerationError, GenerationResult};

pub const OLLAMA_HOST: &str = "http://localhost:11434";

const BACKEND: &str = "Ollama";

pub struct OllamaProvider {
    client: Client,
    config: OllamaProviderConfig,
}

impl OllamaProvider {
    pub fn new(client: Client, config: OllamaProviderConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.host.trim_end_matches('/'), path)
    }

    /// Download a model into the runtime. Blocks until the pull finishes.
    pub async fn pull_model(&self, name: &str) -> GenerationResult<()> {
        let payload = json!({ "name": name, "stream": false });
        send_json(BACKEND, self.client.post(self.url("/api/pull")).json(&payload)).await?;
        Ok(())
    }

    /// Remove a model from the runtime.
    pub async fn delete_model(&self, name: &str) -> GenerationResult<()> {
        let request = self
            .client
            .delete(self.url("/api/delete"))
            .json(&json!({ "name": name }));
        let response = request
            .send()
            .await
            .map_err(|e| GenerationError::Unreachable {
                backend: BACKEND.to_string(),
                reason: e.to_string(),
            })?;
        // Ollama answers a successful delete with an empty body
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(GenerationError::UpstreamRejected {
                backend: BACKEND.to_string(),
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn complete(&self, request: &CompletionRequest) -> GenerationResult<String> {
        let payload = json!({
            "model": request.model,
            "prompt": compose_prompt(&request.system, &request.message),
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens
            }
        });

        let response = send_json(
            BACKEND,
            self.client.post(self.url("/api/generate")).json(&payload),
        )
        .await?;

        ollama_response_text(BACKEND, &response)
    }
}
