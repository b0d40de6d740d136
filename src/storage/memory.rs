//! In-memory storage driver with operation recording
//!
//! Used by tests to seed a registry, inject failures and assert on exactly
//! which paths a collection run read or deleted.

use crate::context::Context;
use crate::error::{GcError, Result};
use crate::storage::driver::{FileInfo, StorageDriver, join, validate_path};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Record of a storage operation for test assertions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Get { path: String },
    Put { path: String, size: usize },
    List { path: String },
    Stat { path: String },
    Delete { path: String },
}

impl StorageOp {
    pub fn is_mutation(&self) -> bool {
        matches!(self, StorageOp::Put { .. } | StorageOp::Delete { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryDriver {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    operations: Arc<Mutex<Vec<StorageOp>>>,
    failing_reads: Arc<Mutex<Vec<String>>>,
    failing_deletes: Arc<Mutex<Vec<String>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn dir_prefix(path: &str) -> String {
    if path == "/" {
        "/".to_string()
    } else {
        format!("{}/", path)
    }
}

impl InMemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make reads (`get_content`, `stat`) under `prefix` fail with a storage error
    pub fn fail_reads_under(&self, prefix: impl Into<String>) {
        lock(&self.failing_reads).push(prefix.into());
    }

    /// Make deletes under `prefix` fail with a storage error
    pub fn fail_deletes_under(&self, prefix: impl Into<String>) {
        lock(&self.failing_deletes).push(prefix.into());
    }

    pub fn operations(&self) -> Vec<StorageOp> {
        lock(&self.operations).clone()
    }

    pub fn clear_operations(&self) {
        lock(&self.operations).clear();
    }

    pub fn deleted_paths(&self) -> Vec<String> {
        lock(&self.operations)
            .iter()
            .filter_map(|op| match op {
                StorageOp::Delete { path } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    /// True if a file is stored at `path` or anywhere below it
    pub fn exists(&self, path: &str) -> bool {
        let files = lock(&self.files);
        let prefix = dir_prefix(path);
        files.contains_key(path) || files.keys().any(|key| key.starts_with(&prefix))
    }

    fn record(&self, op: StorageOp) {
        lock(&self.operations).push(op);
    }

    fn check_failure(&self, failing: &Mutex<Vec<String>>, path: &str) -> Result<()> {
        if lock(failing).iter().any(|prefix| path.starts_with(prefix.as_str())) {
            return Err(GcError::Storage {
                path: path.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StorageDriver for InMemoryDriver {
    async fn get_content(&self, ctx: &Context, path: &str) -> Result<Vec<u8>> {
        ctx.check()?;
        validate_path(path)?;
        self.record(StorageOp::Get {
            path: path.to_string(),
        });
        self.check_failure(&self.failing_reads, path)?;

        lock(&self.files)
            .get(path)
            .cloned()
            .ok_or_else(|| GcError::PathNotFound(path.to_string()))
    }

    async fn put_content(&self, ctx: &Context, path: &str, content: &[u8]) -> Result<()> {
        ctx.check()?;
        validate_path(path)?;
        self.record(StorageOp::Put {
            path: path.to_string(),
            size: content.len(),
        });

        let mut files = lock(&self.files);
        let prefix = dir_prefix(path);
        if files.keys().any(|key| key.starts_with(&prefix)) {
            return Err(GcError::Storage {
                path: path.to_string(),
                message: "path is a directory".to_string(),
            });
        }
        files.insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn list(&self, ctx: &Context, path: &str) -> Result<Vec<String>> {
        ctx.check()?;
        validate_path(path)?;
        self.record(StorageOp::List {
            path: path.to_string(),
        });

        let files = lock(&self.files);
        let prefix = dir_prefix(path);
        let children: BTreeSet<String> = files
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(key, _)| key[prefix.len()..].split('/').next())
            .map(|child| join(path, child))
            .collect();

        if children.is_empty() {
            return Err(GcError::PathNotFound(path.to_string()));
        }
        Ok(children.into_iter().collect())
    }

    async fn stat(&self, ctx: &Context, path: &str) -> Result<FileInfo> {
        ctx.check()?;
        validate_path(path)?;
        self.record(StorageOp::Stat {
            path: path.to_string(),
        });
        self.check_failure(&self.failing_reads, path)?;

        let files = lock(&self.files);
        if let Some(content) = files.get(path) {
            return Ok(FileInfo {
                path: path.to_string(),
                size: content.len() as u64,
                is_dir: false,
            });
        }
        let prefix = dir_prefix(path);
        if files.keys().any(|key| key.starts_with(&prefix)) {
            return Ok(FileInfo {
                path: path.to_string(),
                size: 0,
                is_dir: true,
            });
        }
        Err(GcError::PathNotFound(path.to_string()))
    }

    async fn delete(&self, ctx: &Context, path: &str) -> Result<()> {
        ctx.check()?;
        validate_path(path)?;
        self.record(StorageOp::Delete {
            path: path.to_string(),
        });
        self.check_failure(&self.failing_deletes, path)?;

        let mut files = lock(&self.files);
        let prefix = dir_prefix(path);
        let before = files.len();
        files.retain(|key, _| key != path && !key.starts_with(&prefix));
        if files.len() == before {
            return Err(GcError::PathNotFound(path.to_string()));
        }
        Ok(())
    }
}
