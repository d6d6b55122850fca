use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

/// The local inference runtimes the dashboard can discover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Display, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[strum(serialize = "Ollama")]
    Ollama,
    #[strum(serialize = "LM Studio")]
    LmStudio,
    #[strum(serialize = "LocalAI")]
    LocalAi,
}

impl BackendKind {
    /// Prefix used in an agent's model route, without the colon.
    pub fn prefix(&self) -> &'static str {
        match self {
            BackendKind::Ollama => "ollama",
            BackendKind::LmStudio => "lmstudio",
            BackendKind::LocalAi => "localai",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "ollama" => Some(BackendKind::Ollama),
            "lmstudio" => Some(BackendKind::LmStudio),
            "localai" => Some(BackendKind::LocalAi),
            _ => None,
        }
    }
}

/// Identifies a model across probe cycles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub backend: BackendKind,
    pub name: String,
}

impl ModelKey {
    pub fn new(backend: BackendKind, name: impl Into<String>) -> Self {
        Self {
            backend,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub name: String,
    pub backend: BackendKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    pub active: bool,
}

impl ModelDescriptor {
    pub fn new(backend: BackendKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend,
            size_bytes: None,
            last_modified: None,
            active: false,
        }
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    pub fn with_last_modified(mut self, last_modified: impl Into<String>) -> Self {
        self.last_modified = Some(last_modified.into());
        self
    }

    /// The model route an agent would use to target this model.
    pub fn route(&self) -> String {
        format!("{}:{}", self.backend.prefix(), self.name)
    }

    pub fn key(&self) -> ModelKey {
        ModelKey::new(self.backend, self.name.clone())
    }
}
