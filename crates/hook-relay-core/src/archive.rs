//! # Payload Archive
//!
//! Persists the decoded payload of each accepted delivery so it can be
//! inspected or replayed. Only the most recent payload is kept.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Errors while writing the archived payload
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Failed to serialize payload: {message}")]
    Serialization { message: String },

    #[error("Failed to write archive at {path}: {message}")]
    Io { path: String, message: String },
}

impl ArchiveError {
    fn io(path: &Path, error: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        }
    }
}

/// Storage for the most recent accepted payload.
#[async_trait]
pub trait PayloadArchive: Send + Sync {
    /// Replace the archived payload with `payload`.
    async fn store(&self, payload: &Value) -> Result<(), ArchiveError>;
}

/// Archive that writes compact JSON to a single file.
///
/// Each write goes to a uniquely named sibling temp file that is then renamed
/// over the target, so readers never observe a partial file and concurrent
/// writers resolve to last-writer-wins.
#[derive(Debug, Clone)]
pub struct FilesystemPayloadArchive {
    path: PathBuf,
}

impl FilesystemPayloadArchive {
    /// Create an archive writing to `path`. Nothing is touched until the
    /// first store.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "payload".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()))
    }
}

#[async_trait]
impl PayloadArchive for FilesystemPayloadArchive {
    async fn store(&self, payload: &Value) -> Result<(), ArchiveError> {
        let json = serde_json::to_vec(payload).map_err(|e| ArchiveError::Serialization {
            message: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ArchiveError::io(parent, e))?;
        }

        let temp_path = self.temp_path();
        let result = write_then_rename(&temp_path, &self.path, &json).await;
        if result.is_err() {
            let _ = fs::remove_file(&temp_path).await;
        }
        result?;

        debug!(path = %self.path.display(), bytes = json.len(), "Archived payload");
        Ok(())
    }
}

async fn write_then_rename(temp_path: &Path, target: &Path, data: &[u8]) -> Result<(), ArchiveError> {
    let mut file = fs::File::create(temp_path)
        .await
        .map_err(|e| ArchiveError::io(temp_path, e))?;

    file.write_all(data)
        .await
        .map_err(|e| ArchiveError::io(temp_path, e))?;

    file.flush()
        .await
        .map_err(|e| ArchiveError::io(temp_path, e))?;
    drop(file);

    fs::rename(temp_path, target)
        .await
        .map_err(|e| ArchiveError::io(target, e))
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
