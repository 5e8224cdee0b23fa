use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use helpdesk_core::error::{HelpdeskError, Result};

/// Byte storage addressed by relative paths such as
/// `ticket_attachments/12/3f2c….pdf`.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<()>;

    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// Remove one file. Missing files are not an error.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Remove a directory and everything under it. Missing is not an error.
    async fn delete_dir(&self, path: &str) -> Result<()>;
}

/// Local filesystem storage under a private root.
#[derive(Debug, Clone)]
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a relative path under the root; anything that could escape it is
    /// rejected.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(HelpdeskError::Storage(format!(
                "Refusing storage path outside root: {}",
                path
            )));
        }
        Ok(self.root.join(relative))
    }
}

fn storage_err(op: &str, path: &str, e: std::io::Error) -> HelpdeskError {
    HelpdeskError::Storage(format!("Failed to {} {}: {}", op, path, e))
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_err("create directory for", path, e))?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .map_err(|e| storage_err("write", path, e))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full)
            .await
            .map_err(|e| storage_err("read", path, e))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        tokio::fs::try_exists(&full)
            .await
            .map_err(|e| storage_err("stat", path, e))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err("delete", path, e)),
        }
    }

    async fn delete_dir(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_dir_all(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err("delete directory", path, e)),
        }
    }
}
