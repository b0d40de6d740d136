//! Namespace backed by the distribution storage layout
//!
//! Implements every capability the collector consumes by reading the
//! directory structure described in [`crate::storage::paths`] through a
//! [`StorageDriver`]. Manifests are decoded from the blob store on every
//! `get`; nothing is cached between calls.

use crate::context::Context;
use crate::digest::{Algorithm, Digest};
use crate::error::{GcError, Result};
use crate::image::Manifest;
use crate::reference::RepositoryName;
use crate::registry::traits::{
    BlobEnumerator, DigestVisitor, ManifestEnumerator, ManifestService, Namespace, Repository,
    RepositoryEnumerator, RepositoryVisitor, TagService,
};
use crate::storage::driver::base_name;
use crate::storage::paths::MANIFESTS_DIR;
use crate::storage::{LayoutPaths, StorageDriver};
use async_trait::async_trait;
use std::sync::Arc;

/// Read a link file and parse the digest it holds
async fn read_link(driver: &dyn StorageDriver, ctx: &Context, path: &str) -> Result<Digest> {
    let content = driver.get_content(ctx, path).await?;
    let text = String::from_utf8_lossy(&content);
    Digest::parse(text.trim())
}

pub struct LayoutNamespace {
    driver: Arc<dyn StorageDriver>,
    repositories: LayoutRepositoryEnumerator,
    blobs: LayoutBlobEnumerator,
}

impl LayoutNamespace {
    pub fn new(driver: Arc<dyn StorageDriver>) -> Self {
        Self {
            repositories: LayoutRepositoryEnumerator {
                driver: Arc::clone(&driver),
            },
            blobs: LayoutBlobEnumerator {
                driver: Arc::clone(&driver),
            },
            driver,
        }
    }
}

#[async_trait]
impl Namespace for LayoutNamespace {
    fn repository_enumerator(&self) -> Option<&dyn RepositoryEnumerator> {
        Some(&self.repositories)
    }

    async fn repository(&self, _ctx: &Context, name: &RepositoryName) -> Result<Box<dyn Repository>> {
        Ok(Box::new(LayoutRepository {
            manifests: LayoutManifestService {
                driver: Arc::clone(&self.driver),
                name: name.clone(),
            },
            tags: LayoutTagService {
                driver: Arc::clone(&self.driver),
                name: name.clone(),
            },
        }))
    }

    fn blobs(&self) -> &dyn BlobEnumerator {
        &self.blobs
    }
}

/// Walks `repositories/` depth-first in sorted order.
///
/// A directory counts as a repository when it holds a `_manifests` child, so
/// a repository with tags but no revisions is still visited.
pub struct LayoutRepositoryEnumerator {
    driver: Arc<dyn StorageDriver>,
}

#[async_trait]
impl RepositoryEnumerator for LayoutRepositoryEnumerator {
    async fn enumerate(&self, ctx: &Context, visitor: &mut dyn RepositoryVisitor) -> Result<()> {
        let root = LayoutPaths::repositories_root();
        let top = match self.driver.list(ctx, &root).await {
            Ok(children) => children,
            // Fresh registry without any repository yet
            Err(GcError::PathNotFound(_)) => return Ok(()),
            Err(err) => return Err(err),
        };

        let prefix = format!("{}/", root);
        let mut stack: Vec<String> = top.into_iter().rev().collect();
        while let Some(dir) = stack.pop() {
            let entries = match self.driver.list(ctx, &dir).await {
                Ok(entries) => entries,
                // Plain file, or removed since the parent was listed
                Err(GcError::PathNotFound(_)) => continue,
                Err(err) => return Err(err),
            };

            if entries.iter().any(|entry| base_name(entry) == MANIFESTS_DIR) {
                let name = dir.strip_prefix(&prefix).unwrap_or(&dir);
                tracing::debug!(repository = name, "found repository");
                visitor.visit_repository(ctx, name).await?;
            }

            for entry in entries.into_iter().rev() {
                if !base_name(&entry).starts_with('_') {
                    stack.push(entry);
                }
            }
        }
        Ok(())
    }
}

pub struct LayoutRepository {
    manifests: LayoutManifestService,
    tags: LayoutTagService,
}

impl Repository for LayoutRepository {
    fn manifests(&self) -> &dyn ManifestService {
        &self.manifests
    }

    fn tags(&self) -> &dyn TagService {
        &self.tags
    }
}

pub struct LayoutManifestService {
    driver: Arc<dyn StorageDriver>,
    name: RepositoryName,
}

impl LayoutManifestService {
    fn unknown_revision(&self, digest: &Digest) -> GcError {
        GcError::ManifestUnknownRevision {
            repository: self.name.to_string(),
            digest: digest.to_string(),
        }
    }
}

#[async_trait]
impl ManifestService for LayoutManifestService {
    async fn get(&self, ctx: &Context, digest: &Digest) -> Result<Manifest> {
        let link = LayoutPaths::manifest_revision_link(&self.name, digest);
        let linked = match read_link(self.driver.as_ref(), ctx, &link).await {
            Ok(linked) => linked,
            Err(GcError::PathNotFound(_)) => return Err(self.unknown_revision(digest)),
            Err(err) => return Err(err),
        };
        if &linked != digest {
            return Err(GcError::Storage {
                path: link,
                message: format!("revision link points at {}", linked),
            });
        }

        let data = match self.driver.get_content(ctx, &LayoutPaths::blob_data(digest)).await {
            Ok(data) => data,
            Err(GcError::PathNotFound(_)) => return Err(self.unknown_revision(digest)),
            Err(err) => return Err(err),
        };
        digest.verify(&data)?;
        Manifest::from_slice(&data)
    }

    fn enumerator(&self) -> Option<&dyn ManifestEnumerator> {
        Some(self)
    }
}

#[async_trait]
impl ManifestEnumerator for LayoutManifestService {
    /// Fails with `PathNotFound` when the repository has no revisions directory
    async fn enumerate(&self, ctx: &Context, visitor: &mut dyn DigestVisitor) -> Result<()> {
        let root = LayoutPaths::manifest_revisions_root(&self.name);
        for algorithm_dir in self.driver.list(ctx, &root).await? {
            let algorithm = base_name(&algorithm_dir);
            if Algorithm::from_name(algorithm).is_none() {
                tracing::warn!(path = %algorithm_dir, "skipping unknown digest algorithm");
                continue;
            }
            for revision in self.driver.list(ctx, &algorithm_dir).await? {
                let value = format!("{}:{}", algorithm, base_name(&revision));
                match Digest::parse(&value) {
                    Ok(digest) => visitor.visit_digest(ctx, &digest).await?,
                    Err(err) => tracing::warn!(path = %revision, error = %err, "skipping invalid revision"),
                }
            }
        }
        Ok(())
    }
}

pub struct LayoutTagService {
    driver: Arc<dyn StorageDriver>,
    name: RepositoryName,
}

#[async_trait]
impl TagService for LayoutTagService {
    async fn lookup(&self, ctx: &Context, digest: &Digest) -> Result<Vec<String>> {
        let tags = match self.all(ctx).await {
            Ok(tags) => tags,
            Err(GcError::RepositoryUnknown(_)) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let mut matching = Vec::new();
        for tag in tags {
            let link = LayoutPaths::manifest_tag_current_link(&self.name, &tag);
            match read_link(self.driver.as_ref(), ctx, &link).await {
                Ok(current) if &current == digest => matching.push(tag),
                Ok(_) => {}
                Err(GcError::PathNotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(matching)
    }

    async fn all(&self, ctx: &Context) -> Result<Vec<String>> {
        let root = LayoutPaths::manifest_tags_root(&self.name);
        match self.driver.list(ctx, &root).await {
            Ok(entries) => Ok(entries
                .iter()
                .map(|entry| base_name(entry).to_string())
                .collect()),
            Err(GcError::PathNotFound(_)) => Err(GcError::RepositoryUnknown(self.name.to_string())),
            Err(err) => Err(err),
        }
    }
}

/// Walks `blobs/{alg}/{shard}/{hex}`
pub struct LayoutBlobEnumerator {
    driver: Arc<dyn StorageDriver>,
}

#[async_trait]
impl BlobEnumerator for LayoutBlobEnumerator {
    async fn enumerate(&self, ctx: &Context, visitor: &mut dyn DigestVisitor) -> Result<()> {
        let algorithm_dirs = match self.driver.list(ctx, &LayoutPaths::blobs_root()).await {
            Ok(dirs) => dirs,
            Err(GcError::PathNotFound(_)) => return Ok(()),
            Err(err) => return Err(err),
        };

        for algorithm_dir in algorithm_dirs {
            let algorithm = base_name(&algorithm_dir);
            if Algorithm::from_name(algorithm).is_none() {
                tracing::warn!(path = %algorithm_dir, "skipping unknown digest algorithm");
                continue;
            }
            for shard in self.driver.list(ctx, &algorithm_dir).await? {
                for blob in self.driver.list(ctx, &shard).await? {
                    let value = format!("{}:{}", algorithm, base_name(&blob));
                    match Digest::parse(&value) {
                        Ok(digest) => visitor.visit_digest(ctx, &digest).await?,
                        Err(err) => tracing::warn!(path = %blob, error = %err, "skipping invalid blob entry"),
                    }
                }
            }
        }
        Ok(())
    }
}
