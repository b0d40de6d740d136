//! Local filesystem storage driver

use crate::context::Context;
use crate::error::{GcError, Result};
use crate::storage::driver::{FileInfo, StorageDriver, join, validate_path};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Stores every path under a root directory on the local disk
#[derive(Debug, Clone)]
pub struct FilesystemDriver {
    root: PathBuf,
}

impl FilesystemDriver {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        validate_path(path)?;
        Ok(self.root.join(path.trim_start_matches('/')))
    }
}

fn map_io(path: &str, err: std::io::Error) -> GcError {
    if err.kind() == ErrorKind::NotFound {
        GcError::PathNotFound(path.to_string())
    } else {
        GcError::Storage {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl StorageDriver for FilesystemDriver {
    async fn get_content(&self, ctx: &Context, path: &str) -> Result<Vec<u8>> {
        ctx.check()?;
        let full = self.full_path(path)?;
        let metadata = tokio::fs::metadata(&full).await.map_err(|e| map_io(path, e))?;
        if metadata.is_dir() {
            return Err(GcError::PathNotFound(path.to_string()));
        }
        tokio::fs::read(&full).await.map_err(|e| map_io(path, e))
    }

    async fn put_content(&self, ctx: &Context, path: &str, content: &[u8]) -> Result<()> {
        ctx.check()?;
        let full = self.full_path(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io(path, e))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| map_io(path, e))
    }

    async fn list(&self, ctx: &Context, path: &str) -> Result<Vec<String>> {
        ctx.check()?;
        let full = self.full_path(path)?;
        let metadata = tokio::fs::metadata(&full).await.map_err(|e| map_io(path, e))?;
        if !metadata.is_dir() {
            return Err(GcError::PathNotFound(path.to_string()));
        }

        let mut entries = tokio::fs::read_dir(&full).await.map_err(|e| map_io(path, e))?;
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| map_io(path, e))? {
            children.push(join(path, &entry.file_name().to_string_lossy()));
        }
        children.sort();
        Ok(children)
    }

    async fn stat(&self, ctx: &Context, path: &str) -> Result<FileInfo> {
        ctx.check()?;
        let full = self.full_path(path)?;
        let metadata = tokio::fs::metadata(&full).await.map_err(|e| map_io(path, e))?;
        Ok(FileInfo {
            path: path.to_string(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            is_dir: metadata.is_dir(),
        })
    }

    async fn delete(&self, ctx: &Context, path: &str) -> Result<()> {
        ctx.check()?;
        let full = self.full_path(path)?;
        let metadata = tokio::fs::metadata(&full).await.map_err(|e| map_io(path, e))?;
        let removed = if metadata.is_dir() {
            tokio::fs::remove_dir_all(&full).await
        } else {
            tokio::fs::remove_file(&full).await
        };
        removed.map_err(|e| map_io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_on_disk() {
        let dir = TempDir::new().unwrap();
        let ctx = Context::new();
        let driver = FilesystemDriver::new(dir.path());

        driver.put_content(&ctx, "/a/b/data", b"payload").await.unwrap();
        driver.put_content(&ctx, "/a/c", b"x").await.unwrap();

        assert_eq!(driver.get_content(&ctx, "/a/b/data").await.unwrap(), b"payload");
        assert_eq!(
            driver.list(&ctx, "/a").await.unwrap(),
            vec!["/a/b".to_string(), "/a/c".to_string()]
        );
        assert!(dir.path().join("a/b/data").is_file());

        let info = driver.stat(&ctx, "/a/b/data").await.unwrap();
        assert_eq!(info.size, 7);
        assert!(!info.is_dir);
    }

    #[tokio::test]
    async fn test_missing_paths_and_recursive_delete() {
        let dir = TempDir::new().unwrap();
        let ctx = Context::new();
        let driver = FilesystemDriver::new(dir.path());

        assert!(matches!(
            driver.list(&ctx, "/missing").await,
            Err(GcError::PathNotFound(_))
        ));

        driver.put_content(&ctx, "/blobs/sha256/ab/abc/data", b"x").await.unwrap();
        driver.delete(&ctx, "/blobs/sha256/ab/abc").await.unwrap();
        assert!(!dir.path().join("blobs/sha256/ab/abc").exists());
        assert!(matches!(
            driver.delete(&ctx, "/blobs/sha256/ab/abc").await,
            Err(GcError::PathNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let ctx = Context::new();
        let driver = FilesystemDriver::new(dir.path());
        assert!(matches!(
            driver.put_content(&ctx, "/../outside", b"x").await,
            Err(GcError::InvalidPath(_))
        ));
    }
}
