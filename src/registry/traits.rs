//! Capability interfaces the collector consumes
//!
//! Enumeration is visitor driven: an enumerator awaits the visitor for one
//! item before producing the next and stops at the first visitor error,
//! returning it unchanged. Optional capabilities are probed with methods
//! returning `Option<&dyn _>` rather than by downcasting.

use crate::context::Context;
use crate::digest::Digest;
use crate::error::Result;
use crate::image::Manifest;
use crate::reference::RepositoryName;
use async_trait::async_trait;

#[async_trait]
pub trait RepositoryVisitor: Send {
    async fn visit_repository(&mut self, ctx: &Context, name: &str) -> Result<()>;
}

#[async_trait]
pub trait DigestVisitor: Send {
    async fn visit_digest(&mut self, ctx: &Context, digest: &Digest) -> Result<()>;
}

/// Adapts a synchronous closure into a visitor
pub struct FnVisitor<F>(pub F);

#[async_trait]
impl<F> DigestVisitor for FnVisitor<F>
where
    F: FnMut(&Digest) -> Result<()> + Send,
{
    async fn visit_digest(&mut self, _ctx: &Context, digest: &Digest) -> Result<()> {
        (self.0)(digest)
    }
}

#[async_trait]
impl<F> RepositoryVisitor for FnVisitor<F>
where
    F: FnMut(&str) -> Result<()> + Send,
{
    async fn visit_repository(&mut self, _ctx: &Context, name: &str) -> Result<()> {
        (self.0)(name)
    }
}

#[async_trait]
pub trait RepositoryEnumerator: Send + Sync {
    async fn enumerate(&self, ctx: &Context, visitor: &mut dyn RepositoryVisitor) -> Result<()>;
}

/// Enumerates the manifest revisions of one repository
#[async_trait]
pub trait ManifestEnumerator: Send + Sync {
    async fn enumerate(&self, ctx: &Context, visitor: &mut dyn DigestVisitor) -> Result<()>;
}

/// Enumerates every blob in the shared blob store
#[async_trait]
pub trait BlobEnumerator: Send + Sync {
    async fn enumerate(&self, ctx: &Context, visitor: &mut dyn DigestVisitor) -> Result<()>;
}

#[async_trait]
pub trait ManifestService: Send + Sync {
    /// Fetch a decoded manifest. A revision that is no longer linked fails with
    /// [`GcError::ManifestUnknownRevision`](crate::error::GcError::ManifestUnknownRevision).
    async fn get(&self, ctx: &Context, digest: &Digest) -> Result<Manifest>;

    fn enumerator(&self) -> Option<&dyn ManifestEnumerator>;
}

#[async_trait]
pub trait TagService: Send + Sync {
    /// Tags whose current link points at `digest`
    async fn lookup(&self, ctx: &Context, digest: &Digest) -> Result<Vec<String>>;

    /// Every tag in the repository
    async fn all(&self, ctx: &Context) -> Result<Vec<String>>;
}

pub trait Repository: Send + Sync {
    fn manifests(&self) -> &dyn ManifestService;

    fn tags(&self) -> &dyn TagService;
}

#[async_trait]
pub trait Namespace: Send + Sync {
    fn repository_enumerator(&self) -> Option<&dyn RepositoryEnumerator>;

    async fn repository(&self, ctx: &Context, name: &RepositoryName) -> Result<Box<dyn Repository>>;

    fn blobs(&self) -> &dyn BlobEnumerator;
}
