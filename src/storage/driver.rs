//! Byte-level storage driver interface

use crate::context::Context;
use crate::error::{GcError, Result};
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
}

/// Hierarchical key/value store addressed by absolute `/`-separated paths.
///
/// Directories are implicit: a path is a directory when something is stored
/// below it. Missing paths fail with [`GcError::PathNotFound`].
#[async_trait]
pub trait StorageDriver: Send + Sync {
    async fn get_content(&self, ctx: &Context, path: &str) -> Result<Vec<u8>>;

    async fn put_content(&self, ctx: &Context, path: &str, content: &[u8]) -> Result<()>;

    /// Direct children of `path` as full paths, sorted
    async fn list(&self, ctx: &Context, path: &str) -> Result<Vec<String>>;

    async fn stat(&self, ctx: &Context, path: &str) -> Result<FileInfo>;

    /// Recursively delete `path`
    async fn delete(&self, ctx: &Context, path: &str) -> Result<()>;
}

/// Reject relative paths, empty or dot segments and trailing slashes
pub fn validate_path(path: &str) -> Result<()> {
    if path == "/" {
        return Ok(());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(GcError::InvalidPath(path.to_string()));
    };
    if rest.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err(GcError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Last segment of a storage path
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Join a child name onto a storage path
pub fn join(parent: &str, child: &str) -> String {
    if parent == "/" {
        format!("/{}", child)
    } else {
        format!("{}/{}", parent, child)
    }
}
