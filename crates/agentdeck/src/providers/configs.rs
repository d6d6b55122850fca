// Connection settings for each generation backend. Credentials are resolved
// per request by the generator, so hosted configs carry the key they were
// built with rather than looking it up themselves.

#[derive(Debug, Clone)]
pub struct OllamaProviderConfig {
    pub host: String,
}

/// Any OpenAI-compatible chat completions endpoint: the hosted API and the
/// local runtimes that mimic it.
#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: Option<String>,
    /// Name used in logs and error messages
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
}
