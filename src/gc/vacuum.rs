//! Sweep executor
//!
//! Deletes manifest revisions and blobs straight from storage. There is no
//! rollback: whatever was deleted before a failure stays deleted.

use crate::context::Context;
use crate::digest::Digest;
use crate::error::{GcError, Result};
use crate::reference::{RepositoryName, validate_tag};
use crate::storage::{LayoutPaths, StorageDriver};
use async_trait::async_trait;
use std::sync::Arc;

/// Removes content selected by the mark phase
#[async_trait]
pub trait Sweeper: Send + Sync {
    /// Unlink a manifest revision and drop it from the index of every tag in `tags`
    async fn remove_manifest(&self, name: &RepositoryName, digest: &Digest, tags: &[String]) -> Result<()>;

    async fn remove_blob(&self, digest: &Digest) -> Result<()>;
}

pub struct Vacuum {
    ctx: Context,
    driver: Arc<dyn StorageDriver>,
}

impl Vacuum {
    pub fn new(ctx: Context, driver: Arc<dyn StorageDriver>) -> Self {
        Self { ctx, driver }
    }
}

#[async_trait]
impl Sweeper for Vacuum {
    async fn remove_manifest(&self, name: &RepositoryName, digest: &Digest, tags: &[String]) -> Result<()> {
        for tag in tags {
            validate_tag(tag)?;
            let entry = LayoutPaths::manifest_tag_index_entry(name, tag, digest);
            match self.driver.stat(&self.ctx, &entry).await {
                Ok(_) => {}
                Err(GcError::PathNotFound(_)) => continue,
                Err(err) => return Err(err),
            }
            tracing::info!(path = %entry, "deleting manifest tag reference");
            self.driver.delete(&self.ctx, &entry).await?;
        }

        let revision = LayoutPaths::manifest_revision(name, digest);
        tracing::info!(path = %revision, "deleting manifest");
        self.driver.delete(&self.ctx, &revision).await
    }

    async fn remove_blob(&self, digest: &Digest) -> Result<()> {
        let blob = LayoutPaths::blob(digest);
        tracing::info!(path = %blob, "deleting blob");
        self.driver.delete(&self.ctx, &blob).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryFixture;
    use crate::storage::InMemoryDriver;

    #[tokio::test]
    async fn test_remove_manifest_cleans_tag_index() {
        let driver = Arc::new(InMemoryDriver::new());
        let ctx = Context::new();
        let fixture = RegistryFixture::new(ctx.clone(), driver.clone());
        let name = RepositoryName::parse("app").unwrap();

        let old = fixture.push_image(&name, b"c1", &[b"l1"]).await.unwrap();
        let new = fixture.push_image(&name, b"c2", &[b"l2"]).await.unwrap();
        fixture.tag(&name, "v1", &old.manifest.digest).await.unwrap();
        fixture.tag(&name, "v1", &new.manifest.digest).await.unwrap();

        let vacuum = Vacuum::new(ctx, driver.clone());
        let tags = vec!["v1".to_string(), "never-existed".to_string()];
        vacuum.remove_manifest(&name, &old.manifest.digest, &tags).await.unwrap();

        assert!(!driver.exists(&LayoutPaths::manifest_tag_index_entry(&name, "v1", &old.manifest.digest)));
        assert!(driver.exists(&LayoutPaths::manifest_tag_index_entry(&name, "v1", &new.manifest.digest)));
        assert!(!driver.exists(&LayoutPaths::manifest_revision(&name, &old.manifest.digest)));
        assert!(driver.exists(&LayoutPaths::manifest_revision(&name, &new.manifest.digest)));
        // Only links are touched; the manifest blob stays for the blob sweep
        assert!(driver.exists(&LayoutPaths::blob_data(&old.manifest.digest)));
    }

    #[tokio::test]
    async fn test_remove_blob_and_missing_blob() {
        let driver = Arc::new(InMemoryDriver::new());
        let ctx = Context::new();
        let fixture = RegistryFixture::new(ctx.clone(), driver.clone());
        let digest = fixture.put_blob(b"orphan").await.unwrap();

        let vacuum = Vacuum::new(ctx, driver.clone());
        vacuum.remove_blob(&digest).await.unwrap();
        assert!(!driver.exists(&LayoutPaths::blob(&digest)));

        let err = vacuum.remove_blob(&digest).await.unwrap_err();
        assert!(err.is_path_not_found());
    }

    #[tokio::test]
    async fn test_rejects_invalid_tag() {
        let driver = Arc::new(InMemoryDriver::new());
        let vacuum = Vacuum::new(Context::new(), driver);
        let name = RepositoryName::parse("app").unwrap();
        let digest = Digest::from_bytes(b"m");
        let err = vacuum
            .remove_manifest(&name, &digest, &["../escape".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, GcError::InvalidName { .. }));
    }
}
