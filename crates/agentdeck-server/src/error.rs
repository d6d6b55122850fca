use agentdeck::dashboard::DashboardError;
use agentdeck::errors::ErrorKind;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Invalid configuration: {0}")]
    Other(#[from] config::ConfigError),
}

/// The environment variable that sets a dotted config key.
pub fn to_env_var(field_path: &str) -> String {
    format!("AGENTDECK_{}", field_path.replace('.', "__").to_uppercase())
}

/// Error body returned by every handler: the message and its kind.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: status_for(kind),
            kind,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::InvalidRelayToken | ErrorKind::NoRoute => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::ModelUnavailable => StatusCode::CONFLICT,
        ErrorKind::MissingCredential => StatusCode::FAILED_DEPENDENCY,
        ErrorKind::Unreachable | ErrorKind::UpstreamRejected | ErrorKind::InvalidResponse => {
            StatusCode::BAD_GATEWAY
        }
    }
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!("request failed: {}", self.message);
        }
        let body = Json(json!({
            "error": self.message,
            "kind": self.kind,
        }));
        (self.status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use agentdeck::errors::GenerationError;
    use http_body_util::BodyExt;

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("server.port"), "AGENTDECK_SERVER__PORT");
        assert_eq!(to_env_var("backends.ollama"), "AGENTDECK_BACKENDS__OLLAMA");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::NoRoute), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::InvalidRelayToken), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::ModelUnavailable), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::MissingCredential), StatusCode::FAILED_DEPENDENCY);
        assert_eq!(status_for(ErrorKind::Unreachable), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_error_body() {
        let err: ApiError = DashboardError::from(GenerationError::MissingCredential {
            provider: "OpenAI".to_string(),
        })
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FAILED_DEPENDENCY);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["kind"], "missingCredential");
        assert_eq!(body["error"], "OpenAI API key is not configured");
    }
}
