use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::base::{CompletionRequest, Provider};
use super::configs::AnthropicProviderConfig;
use super::utils::{anthropic_response_text, send_json};
use crate::errors::GenerationResult;

pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const BACKEND: &str = "Anthropic";

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(client: Client, config: AnthropicProviderConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn complete(&self, request: &CompletionRequest) -> GenerationResult<String> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let mut payload = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [
                {"role": "user", "content": request.message}
            ]
        });
        if !request.system.is_empty() {
            payload["system"] = json!(request.system);
        }

        let builder = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload);

        let response = send_json(BACKEND, builder).await?;
        anthropic_response_text(BACKEND, &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_complete_basic() -> anyhow::Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test_key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_123",
                "type": "message",
                "role": "assistant",
                "content": [{"type": "text", "text": "Bonjour"}],
                "stop_reason": "end_turn"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = AnthropicProvider::new(
            Client::new(),
            AnthropicProviderConfig {
                host: mock_server.uri(),
                api_key: "test_key".to_string(),
            },
        );

        let request = CompletionRequest::new("claude-3-haiku-20240307", "Answer in French.", "Hello", 0.2, 256);
        assert_eq!(provider.complete(&request).await?, "Bonjour");

        let received = mock_server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&received[0].body)?;
        assert_eq!(body["system"], "Answer in French.");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["max_tokens"], 256);

        Ok(())
    }
}
