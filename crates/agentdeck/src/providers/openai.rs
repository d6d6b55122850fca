use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::base::{CompletionRequest, Provider};
use super::configs::OpenAiProviderConfig;
use super::utils::{openai_response_text, send_json};
use crate::errors::GenerationResult;

pub const OPENAI_HOST: &str = "https://api.openai.com";

/// Chat completions against OpenAI or any runtime that speaks its API
/// (LM Studio, LocalAI). The bearer header is only sent when a key is set.
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(client: Client, config: OpenAiProviderConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.config.label
    }

    async fn complete(&self, request: &CompletionRequest) -> GenerationResult<String> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let payload = json!({
            "model": request.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.message}
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens
        });

        let mut builder = self.client.post(&url).json(&payload);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = send_json(&self.config.label, builder).await?;

        // Some compatible servers report failures inside a 200 body
        if let Some(error) = response.get("error") {
            return Err(crate::errors::GenerationError::UpstreamRejected {
                backend: self.config.label.clone(),
                status: 200,
                body: error.to_string(),
            });
        }

        openai_response_text(&self.config.label, &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GenerationError;
    use serde_json::Value;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn _setup_mock_server(
        response_body: Value,
        api_key: Option<&str>,
    ) -> (MockServer, OpenAiProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let config = OpenAiProviderConfig {
            host: mock_server.uri(),
            api_key: api_key.map(str::to_string),
            label: "OpenAI".to_string(),
        };

        (mock_server, OpenAiProvider::new(Client::new(), config))
    }

    #[tokio::test]
    async fn test_complete_basic() -> anyhow::Result<()> {
        let response_body = json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Hello! How can I assist you today?"
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 12,
                "completion_tokens": 15,
                "total_tokens": 27
            }
        });

        let (mock_server, provider) = _setup_mock_server(response_body, Some("test_api_key")).await;

        let request = CompletionRequest::new("gpt-4", "You are a helpful assistant.", "Hello?", 0.5, 300);
        let text = provider.complete(&request).await?;
        assert_eq!(text, "Hello! How can I assist you today?");

        let received = mock_server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(
            received[0].headers.get("authorization").unwrap(),
            "Bearer test_api_key"
        );
        let body: Value = serde_json::from_slice(&received[0].body)?;
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Hello?");
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["max_tokens"], 300);

        Ok(())
    }

    #[tokio::test]
    async fn test_local_runtime_sends_no_auth_header() -> anyhow::Result<()> {
        let response_body = json!({
            "choices": [{"message": {"role": "assistant", "content": "local"}}]
        });
        let (mock_server, provider) = _setup_mock_server(response_body, None).await;

        let request = CompletionRequest::new("phi-3", "sys", "hi", 0.7, 1000);
        assert_eq!(provider.complete(&request).await?, "local");

        let received = mock_server.received_requests().await.unwrap();
        assert!(received[0].headers.get("authorization").is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_unauthorized_is_upstream_rejection() -> anyhow::Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer bad"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Incorrect API key provided"}
            })))
            .mount(&mock_server)
            .await;

        let provider = OpenAiProvider::new(
            Client::new(),
            OpenAiProviderConfig {
                host: mock_server.uri(),
                api_key: Some("bad".to_string()),
                label: "OpenAI".to_string(),
            },
        );
        let request = CompletionRequest::new("gpt-4", "", "hi", 0.7, 1000);
        let err = provider.complete(&request).await.unwrap_err();

        assert!(matches!(err, GenerationError::UpstreamRejected { status: 401, .. }));
        assert!(err.to_string().contains("Incorrect API key"));

        Ok(())
    }
}
