//! Turns `(message, agent)` into reply text by picking a backend from the
//! agent's model route.

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

use crate::credentials::{CredentialStore, ANTHROPIC_API_KEY, OPENAI_API_KEY};
use crate::errors::{GenerationError, GenerationResult};
use crate::models::agent::AgentConfig;
use crate::models::model::BackendKind;
use crate::providers::anthropic::{AnthropicProvider, ANTHROPIC_HOST};
use crate::providers::base::{CompletionRequest, Provider};
use crate::providers::configs::{
    AnthropicProviderConfig, OllamaProviderConfig, OpenAiProviderConfig,
};
use crate::providers::ollama::{OllamaProvider, OLLAMA_HOST};
use crate::providers::openai::{OpenAiProvider, OPENAI_HOST};

pub const LMSTUDIO_HOST: &str = "http://localhost:1234";
pub const LOCALAI_HOST: &str = "http://localhost:8080";

/// Where a model route sends its request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Ollama { model: String },
    /// LM Studio or LocalAI through their OpenAI-compatible chat endpoint
    LocalChat { backend: BackendKind, model: String },
    OpenAi { model: String },
    Anthropic { model: String },
}

impl Route {
    /// Resolve a model route. Rules are tried in order and the first match
    /// wins: local prefixes, then hosted model families.
    pub fn parse(model_route: &str) -> GenerationResult<Route> {
        let route = model_route.trim();
        let no_route = || GenerationError::NoRoute(model_route.to_string());

        if let Some((prefix, model)) = route.split_once(':') {
            if let Some(backend) = BackendKind::from_prefix(prefix) {
                if model.is_empty() {
                    return Err(no_route());
                }
                let model = model.to_string();
                return Ok(match backend {
                    BackendKind::Ollama => Route::Ollama { model },
                    _ => Route::LocalChat { backend, model },
                });
            }
        }

        if route.starts_with("gpt-") || route.starts_with("o1") || route.starts_with("o3") {
            return Ok(Route::OpenAi {
                model: route.to_string(),
            });
        }

        if route.starts_with("claude-") {
            return Ok(Route::Anthropic {
                model: route.to_string(),
            });
        }

        Err(no_route())
    }

    pub fn model(&self) -> &str {
        match self {
            Route::Ollama { model }
            | Route::LocalChat { model, .. }
            | Route::OpenAi { model }
            | Route::Anthropic { model } => model,
        }
    }

    /// The local backend this route depends on, if any.
    pub fn local_backend(&self) -> Option<BackendKind> {
        match self {
            Route::Ollama { .. } => Some(BackendKind::Ollama),
            Route::LocalChat { backend, .. } => Some(*backend),
            _ => None,
        }
    }

    /// The credential a hosted route needs before any request is made.
    pub fn credential(&self) -> Option<&'static str> {
        match self {
            Route::OpenAi { .. } => Some(OPENAI_API_KEY),
            Route::Anthropic { .. } => Some(ANTHROPIC_API_KEY),
            _ => None,
        }
    }
}

/// Base URLs of every backend the dashboard talks to.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    pub ollama: String,
    pub lmstudio: String,
    pub localai: String,
    pub openai: String,
    pub anthropic: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            ollama: OLLAMA_HOST.to_string(),
            lmstudio: LMSTUDIO_HOST.to_string(),
            localai: LOCALAI_HOST.to_string(),
            openai: OPENAI_HOST.to_string(),
            anthropic: ANTHROPIC_HOST.to_string(),
        }
    }
}

impl Endpoints {
    pub fn local(&self, backend: BackendKind) -> &str {
        match backend {
            BackendKind::Ollama => &self.ollama,
            BackendKind::LmStudio => &self.lmstudio,
            BackendKind::LocalAi => &self.localai,
        }
    }
}

/// Anything that can answer a message on behalf of an agent.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, message: &str, agent: &AgentConfig) -> GenerationResult<String>;
}

/// The production generator: routes by model route and calls the backend
/// over HTTP. Holds no mutable state.
#[derive(Clone)]
pub struct ResponseGenerator {
    client: Client,
    endpoints: Endpoints,
    credentials: Arc<dyn CredentialStore>,
}

impl ResponseGenerator {
    pub fn new(client: Client, endpoints: Endpoints, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            client,
            endpoints,
            credentials,
        }
    }

    fn credential(&self, name: &str, provider: &str) -> GenerationResult<String> {
        self.credentials
            .get(name)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| GenerationError::MissingCredential {
                provider: provider.to_string(),
            })
    }

    fn provider_for(&self, route: &Route) -> GenerationResult<Box<dyn Provider>> {
        let client = self.client.clone();
        let provider: Box<dyn Provider> = match route {
            Route::Ollama { .. } => Box::new(OllamaProvider::new(
                client,
                OllamaProviderConfig {
                    host: self.endpoints.ollama.clone(),
                },
            )),
            Route::LocalChat { backend, .. } => Box::new(OpenAiProvider::new(
                client,
                OpenAiProviderConfig {
                    host: self.endpoints.local(*backend).to_string(),
                    api_key: None,
                    label: backend.to_string(),
                },
            )),
            Route::OpenAi { .. } => Box::new(OpenAiProvider::new(
                client,
                OpenAiProviderConfig {
                    host: self.endpoints.openai.clone(),
                    api_key: Some(self.credential(OPENAI_API_KEY, "OpenAI")?),
                    label: "OpenAI".to_string(),
                },
            )),
            Route::Anthropic { .. } => Box::new(AnthropicProvider::new(
                client,
                AnthropicProviderConfig {
                    host: self.endpoints.anthropic.clone(),
                    api_key: self.credential(ANTHROPIC_API_KEY, "Anthropic")?,
                },
            )),
        };
        Ok(provider)
    }
}

#[async_trait]
impl ReplyGenerator for ResponseGenerator {
    async fn generate(&self, message: &str, agent: &AgentConfig) -> GenerationResult<String> {
        let route = Route::parse(&agent.model_route)?;
        let provider = self.provider_for(&route)?;

        debug!(
            "agent {} routed '{}' to {}",
            agent.id,
            agent.model_route,
            provider.name()
        );

        let request = CompletionRequest::new(
            route.model(),
            agent.system_prompt.clone(),
            message,
            agent.temperature_or_default(),
            agent.max_tokens_or_default(),
        );
        provider.complete(&request).await
    }
}
