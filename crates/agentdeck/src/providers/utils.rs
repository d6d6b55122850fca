use reqwest::RequestBuilder;
use serde_json::Value;
use tracing::debug;

use crate::errors::{GenerationError, GenerationResult};

/// Upstream bodies are echoed into error messages; keep them readable.
const MAX_ERROR_BODY: usize = 512;

/// The prompt shape used by raw-completion runtimes: the system prompt,
/// a blank line, then a role-tagged user turn left open for the assistant.
pub fn compose_prompt(system: &str, message: &str) -> String {
    format!("{}\n\nUser: {}\nAssistant:", system, message)
}

/// Send a prepared request and decode a JSON body, mapping every failure
/// onto a `GenerationError` for `backend`.
pub async fn send_json(backend: &str, request: RequestBuilder) -> GenerationResult<Value> {
    let response = request
        .send()
        .await
        .map_err(|e| GenerationError::Unreachable {
            backend: backend.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        debug!("{} returned {}: {}", backend, status, body);
        return Err(GenerationError::UpstreamRejected {
            backend: backend.to_string(),
            status: status.as_u16(),
            body: truncate(&body, MAX_ERROR_BODY),
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| GenerationError::InvalidResponse {
            backend: backend.to_string(),
            reason: e.to_string(),
        })
}

/// Extract `choices[0].message.content` from an OpenAI-style response.
pub fn openai_response_text(backend: &str, response: &Value) -> GenerationResult<String> {
    response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .map(str::to_string)
        .ok_or_else(|| invalid(backend, "missing choices[0].message.content"))
}

/// Extract the first text block from an Anthropic messages response.
pub fn anthropic_response_text(backend: &str, response: &Value) -> GenerationResult<String> {
    response
        .get("content")
        .and_then(|content| content.as_array())
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|block| block.get("type").and_then(|t| t.as_str()).unwrap_or("text") == "text")
        })
        .and_then(|block| block.get("text"))
        .and_then(|text| text.as_str())
        .map(str::to_string)
        .ok_or_else(|| invalid(backend, "missing content[0].text"))
}

/// Extract the `response` field of an Ollama generate response, verbatim.
pub fn ollama_response_text(backend: &str, response: &Value) -> GenerationResult<String> {
    response
        .get("response")
        .and_then(|text| text.as_str())
        .map(str::to_string)
        .ok_or_else(|| invalid(backend, "missing response field"))
}

fn invalid(backend: &str, reason: &str) -> GenerationError {
    GenerationError::InvalidResponse {
        backend: backend.to_string(),
        reason: reason.to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compose_prompt() {
        assert_eq!(
            compose_prompt("You are terse.", "explain recursion"),
            "You are terse.\n\nUser: explain recursion\nAssistant:"
        );
    }

    #[test]
    fn test_openai_response_text() {
        let response = json!({
            "choices": [{"message": {"role": "assistant", "content": " Hi! "}}]
        });
        assert_eq!(openai_response_text("OpenAI", &response).unwrap(), " Hi! ");

        let err = openai_response_text("OpenAI", &json!({"choices": []})).unwrap_err();
        assert!(matches!(err, GenerationError::InvalidResponse { .. }));
    }

    #[test]
    fn test_anthropic_response_text_skips_non_text_blocks() {
        let response = json!({
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "Answer"}
            ]
        });
        assert_eq!(anthropic_response_text("Anthropic", &response).unwrap(), "Answer");
    }

    #[test]
    fn test_ollama_response_text() {
        let response = json!({"model": "mistral", "response": "  padded  ", "done": true});
        assert_eq!(ollama_response_text("Ollama", &response).unwrap(), "  padded  ");
        assert!(ollama_response_text("Ollama", &json!({"done": true})).is_err());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "ñ".repeat(10);
        let cut = truncate(&text, 5);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate("short", 10), "short");
    }
}
