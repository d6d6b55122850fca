use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::CollaboratorError;
use crate::models::agent::AgentId;

pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "txt", "pdf", "png", "jpg", "jpeg", "gif", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "csv",
    "json", "xml", "md",
];

/// Files whose bytes are handed to agents as text.
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv", "json", "xml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    #[default]
    General,
    /// Shared documents every agent with cabinet access can read
    Cabinet,
    Agent,
}

impl Destination {
    fn dir_name(&self) -> &'static str {
        match self {
            Destination::General => "general",
            Destination::Cabinet => "cabinet",
            Destination::Agent => "agent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub id: String,
    pub original_name: String,
    pub stored_name: String,
    pub destination: Destination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// A stored file as an agent reads it. `content` is absent for binary
/// formats.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    pub file: FileDescriptor,
    pub content: Option<String>,
    pub length: usize,
}

/// Reduce an uploaded name to a safe single path component.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Uploaded files on local disk, indexed in memory.
pub struct FileStore {
    root: PathBuf,
    files: RwLock<Vec<FileDescriptor>>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: RwLock::new(Vec::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, file: &FileDescriptor) -> PathBuf {
        self.root
            .join(file.destination.dir_name())
            .join(&file.stored_name)
    }

    pub async fn upload(
        &self,
        name: &str,
        bytes: &[u8],
        destination: Destination,
        agent_id: Option<AgentId>,
    ) -> Result<FileDescriptor, CollaboratorError> {
        let original_name =
            sanitize_file_name(name).ok_or_else(|| CollaboratorError::InvalidFileName(name.to_string()))?;
        let extension = extension_of(&original_name)
            .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| CollaboratorError::FileTypeNotAllowed(original_name.clone()))?;

        let id: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        let stem = Path::new(&original_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("file");
        let stored_name = format!("{}_{}.{}", stem, id, extension);

        let file = FileDescriptor {
            id,
            original_name,
            stored_name,
            destination,
            agent_id,
            size_bytes: bytes.len() as u64,
            mime_type: mime_guess::from_ext(&extension)
                .first()
                .map(|mime| mime.to_string()),
            uploaded_at: Utc::now(),
        };

        let path = self.path_of(&file);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        info!("stored upload {} as {}", file.original_name, path.display());

        self.files.write().push(file.clone());
        Ok(file)
    }

    /// Files in upload order, optionally narrowed to one destination and
    /// one agent.
    pub fn list(&self, destination: Option<Destination>, agent_id: Option<AgentId>) -> Vec<FileDescriptor> {
        self.files
            .read()
            .iter()
            .filter(|file| destination.map_or(true, |d| file.destination == d))
            .filter(|file| agent_id.map_or(true, |id| file.agent_id == Some(id)))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<FileDescriptor> {
        self.files.read().iter().find(|file| file.id == id).cloned()
    }

    /// The stored bytes. `None` when the id is unknown or the file has
    /// vanished from disk.
    pub async fn read(&self, id: &str) -> Result<Option<(FileDescriptor, Vec<u8>)>, CollaboratorError> {
        let Some(file) = self.get(id) else {
            return Ok(None);
        };
        match tokio::fs::read(self.path_of(&file)).await {
            Ok(bytes) => Ok(Some((file, bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("file {} is indexed but missing from disk", file.stored_name);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn content(&self, id: &str) -> Result<Option<FileContent>, CollaboratorError> {
        let Some((file, bytes)) = self.read(id).await? else {
            return Ok(None);
        };
        let content = extension_of(&file.stored_name)
            .filter(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()))
            .map(|_| String::from_utf8_lossy(&bytes).into_owned());
        let length = content.as_ref().map_or(0, |text| text.chars().count());
        Ok(Some(FileContent {
            file,
            content,
            length,
        }))
    }

    /// Returns false when no file has this id.
    pub async fn delete(&self, id: &str) -> Result<bool, CollaboratorError> {
        let removed = {
            let mut files = self.files.write();
            match files.iter().position(|file| file.id == id) {
                Some(index) => files.remove(index),
                None => return Ok(false),
            }
        };

        match tokio::fs::remove_file(self.path_of(&removed)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("file {} was already gone from disk", removed.stored_name);
            }
            Err(e) => return Err(e.into()),
        }
        Ok(true)
    }
}
