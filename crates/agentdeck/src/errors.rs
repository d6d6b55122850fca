use serde::{Deserialize, Serialize};
use strum_macros::Display;
use thiserror::Error;

/// Coarse classification shared by every error the core surfaces.
///
/// The HTTP layer maps these onto status codes and the dashboard shows them
/// next to the human readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ErrorKind {
    Unreachable,
    MissingCredential,
    InvalidRelayToken,
    UpstreamRejected,
    NoRoute,
    InvalidResponse,
    NotFound,
    Validation,
    ModelUnavailable,
}

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("No backend route for model '{0}'")]
    NoRoute(String),

    #[error("{provider} API key is not configured")]
    MissingCredential { provider: String },

    #[error("{backend} is unreachable: {reason}")]
    Unreachable { backend: String, reason: String },

    #[error("{backend} rejected the request ({status}): {body}")]
    UpstreamRejected {
        backend: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected response from {backend}: {reason}")]
    InvalidResponse { backend: String, reason: String },
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerationError::NoRoute(_) => ErrorKind::NoRoute,
            GenerationError::MissingCredential { .. } => ErrorKind::MissingCredential,
            GenerationError::Unreachable { .. } => ErrorKind::Unreachable,
            GenerationError::UpstreamRejected { .. } => ErrorKind::UpstreamRejected,
            GenerationError::InvalidResponse { .. } => ErrorKind::InvalidResponse,
        }
    }

    /// The text shown to a human in place of a reply, e.g. in a room or a
    /// relay chat. Callers decide success vs failure from the `Result`, this
    /// is presentation only.
    pub fn reply_text(&self) -> String {
        format!("Error: {}", self)
    }
}

pub type GenerationResult<T> = Result<T, GenerationError>;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelayError {
    #[error("Relay token was rejected")]
    InvalidToken,

    #[error("Relay is unreachable: {0}")]
    Unreachable(String),

    #[error("Relay rejected the request ({status}): {description}")]
    UpstreamRejected { status: u16, description: String },

    #[error("Unexpected relay response: {0}")]
    InvalidResponse(String),
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::InvalidToken => ErrorKind::InvalidRelayToken,
            RelayError::Unreachable(_) => ErrorKind::Unreachable,
            RelayError::UpstreamRejected { .. } => ErrorKind::UpstreamRejected,
            RelayError::InvalidResponse(_) => ErrorKind::InvalidResponse,
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        // Relay URLs embed the bot token
        let err = err.without_url();
        if err.is_decode() {
            RelayError::InvalidResponse(err.to_string())
        } else {
            RelayError::Unreachable(err.to_string())
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("Search backend is unreachable: {0}")]
    SearchUnavailable(String),

    #[error("File type not allowed: {0}")]
    FileTypeNotAllowed(String),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("File storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollaboratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CollaboratorError::SearchUnavailable(_) => ErrorKind::Unreachable,
            CollaboratorError::FileTypeNotAllowed(_) | CollaboratorError::InvalidFileName(_) => {
                ErrorKind::Validation
            }
            CollaboratorError::Io(_) => ErrorKind::InvalidResponse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_text_keeps_legacy_prefix() {
        let err = GenerationError::MissingCredential {
            provider: "OpenAI".to_string(),
        };
        assert_eq!(err.reply_text(), "Error: OpenAI API key is not configured");
        assert_eq!(err.kind(), ErrorKind::MissingCredential);
    }

    #[test]
    fn test_error_kind_serializes_camel_case() {
        let json = serde_json::to_string(&ErrorKind::InvalidRelayToken).unwrap();
        assert_eq!(json, "\"invalidRelayToken\"");
        assert_eq!(ErrorKind::NoRoute.to_string(), "noRoute");
    }
}
