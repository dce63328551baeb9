//! UI-agnostic chat state types
//!
//! These are shared between the session core and whatever front-end renders
//! it, and don't depend on any presentation framework.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }
}

/// Who a transcript entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A file handed to the session for extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: &std::path::Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::new(name, mime_type, bytes))
    }
}

/// A file whose text was extracted but not yet sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub source: SourceFile,
    pub extracted_text: String,
}

impl Attachment {
    pub fn file_name(&self) -> &str {
        &self.source.name
    }

    pub fn mime_type(&self) -> &str {
        &self.source.mime_type
    }
}

/// Snapshot of the transient send/extraction flags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingState {
    pub is_loading: bool,
    pub is_processing_file: bool,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::system("hi")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"hi"}"#);
    }

    #[tokio::test]
    async fn test_source_file_from_path_guesses_mime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contract.pdf");
        tokio::fs::write(&path, b"%PDF-1.5").await.unwrap();

        let file = SourceFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "contract.pdf");
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(&file.bytes[..], b"%PDF-1.5");
    }

    #[tokio::test]
    async fn test_source_file_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.zzzunknown");
        tokio::fs::write(&path, b"x").await.unwrap();

        let file = SourceFile::from_path(&path).await.unwrap();
        assert_eq!(file.mime_type, "application/octet-stream");
    }
}
