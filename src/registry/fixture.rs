//! Writes registry content in the storage layout
//!
//! Populates a driver the same way a registry push would: blobs first, then
//! the repository links that reference them.

use crate::context::Context;
use crate::digest::Digest;
use crate::error::Result;
use crate::image::manifest::{MEDIA_TYPE_DOCKER_CONFIG, MEDIA_TYPE_DOCKER_LAYER};
use crate::image::{Descriptor, Manifest};
use crate::reference::{RepositoryName, validate_tag};
use crate::storage::{LayoutPaths, StorageDriver};
use std::sync::Arc;

/// Digests written by [`RegistryFixture::push_image`]
#[derive(Debug, Clone)]
pub struct PushedImage {
    pub manifest: Descriptor,
    pub config: Digest,
    pub layers: Vec<Digest>,
}

pub struct RegistryFixture {
    ctx: Context,
    driver: Arc<dyn StorageDriver>,
}

impl RegistryFixture {
    pub fn new(ctx: Context, driver: Arc<dyn StorageDriver>) -> Self {
        Self { ctx, driver }
    }

    /// Store `data` in the blob store and return its digest
    pub async fn put_blob(&self, data: &[u8]) -> Result<Digest> {
        let digest = Digest::from_bytes(data);
        self.driver
            .put_content(&self.ctx, &LayoutPaths::blob_data(&digest), data)
            .await?;
        Ok(digest)
    }

    pub async fn link_layer(&self, name: &RepositoryName, digest: &Digest) -> Result<()> {
        self.driver
            .put_content(
                &self.ctx,
                &LayoutPaths::layer_link(name, digest),
                digest.as_str().as_bytes(),
            )
            .await
    }

    /// Store the manifest blob and link it as a revision of `name`
    pub async fn put_manifest(&self, name: &RepositoryName, manifest: &Manifest) -> Result<Descriptor> {
        let payload = manifest.to_vec()?;
        let digest = self.put_blob(&payload).await?;
        self.driver
            .put_content(
                &self.ctx,
                &LayoutPaths::manifest_revision_link(name, &digest),
                digest.as_str().as_bytes(),
            )
            .await?;
        Ok(Descriptor::new(
            manifest.media_type(),
            digest,
            payload.len() as u64,
        ))
    }

    /// Push a config blob, layer blobs and the image manifest tying them together
    pub async fn push_image(
        &self,
        name: &RepositoryName,
        config: &[u8],
        layers: &[&[u8]],
    ) -> Result<PushedImage> {
        let config_digest = self.put_blob(config).await?;
        self.link_layer(name, &config_digest).await?;

        let mut layer_digests = Vec::with_capacity(layers.len());
        let mut layer_descriptors = Vec::with_capacity(layers.len());
        for layer in layers {
            let digest = self.put_blob(layer).await?;
            self.link_layer(name, &digest).await?;
            layer_descriptors.push(Descriptor::new(
                MEDIA_TYPE_DOCKER_LAYER,
                digest.clone(),
                layer.len() as u64,
            ));
            layer_digests.push(digest);
        }

        let manifest = Manifest::image(
            Descriptor::new(MEDIA_TYPE_DOCKER_CONFIG, config_digest.clone(), config.len() as u64),
            layer_descriptors,
        );
        let descriptor = self.put_manifest(name, &manifest).await?;

        Ok(PushedImage {
            manifest: descriptor,
            config: config_digest,
            layers: layer_digests,
        })
    }

    pub async fn push_list(&self, name: &RepositoryName, children: &[Descriptor]) -> Result<Descriptor> {
        let manifest = Manifest::list(children.to_vec());
        self.put_manifest(name, &manifest).await
    }

    /// Point `tag` at `digest`, recording it in the tag's index
    pub async fn tag(&self, name: &RepositoryName, tag: &str, digest: &Digest) -> Result<()> {
        validate_tag(tag)?;
        let value = digest.as_str().as_bytes();
        self.driver
            .put_content(&self.ctx, &LayoutPaths::manifest_tag_current_link(name, tag), value)
            .await?;
        self.driver
            .put_content(
                &self.ctx,
                &LayoutPaths::manifest_tag_index_entry_link(name, tag, digest),
                value,
            )
            .await
    }
}
