//! Registry storage layout
//!
//! ```text
//! /docker/registry/v2/
//!   repositories/{name}/
//!     _manifests/revisions/{alg}/{hex}/link
//!     _manifests/tags/{tag}/current/link
//!     _manifests/tags/{tag}/index/{alg}/{hex}/link
//!     _layers/{alg}/{hex}/link
//!   blobs/{alg}/{hex[0..2]}/{hex}/data
//! ```

use crate::digest::Digest;
use crate::reference::RepositoryName;

pub const STORAGE_ROOT: &str = "/docker/registry/v2";
pub const MANIFESTS_DIR: &str = "_manifests";
pub const LAYERS_DIR: &str = "_layers";

/// Path builders for every location the collector reads or deletes
pub struct LayoutPaths;

impl LayoutPaths {
    pub fn repositories_root() -> String {
        format!("{}/repositories", STORAGE_ROOT)
    }

    pub fn repository_root(name: &RepositoryName) -> String {
        format!("{}/{}", Self::repositories_root(), name)
    }

    pub fn manifests_root(name: &RepositoryName) -> String {
        format!("{}/{}", Self::repository_root(name), MANIFESTS_DIR)
    }

    pub fn manifest_revisions_root(name: &RepositoryName) -> String {
        format!("{}/revisions", Self::manifests_root(name))
    }

    /// Directory holding one manifest revision; deleting it unlinks the manifest
    pub fn manifest_revision(name: &RepositoryName, digest: &Digest) -> String {
        format!(
            "{}/{}/{}",
            Self::manifest_revisions_root(name),
            digest.algorithm().name(),
            digest.hex()
        )
    }

    pub fn manifest_revision_link(name: &RepositoryName, digest: &Digest) -> String {
        format!("{}/link", Self::manifest_revision(name, digest))
    }

    pub fn manifest_tags_root(name: &RepositoryName) -> String {
        format!("{}/tags", Self::manifests_root(name))
    }

    pub fn manifest_tag(name: &RepositoryName, tag: &str) -> String {
        format!("{}/{}", Self::manifest_tags_root(name), tag)
    }

    pub fn manifest_tag_current_link(name: &RepositoryName, tag: &str) -> String {
        format!("{}/current/link", Self::manifest_tag(name, tag))
    }

    /// History entry recording that `tag` once pointed at `digest`
    pub fn manifest_tag_index_entry(name: &RepositoryName, tag: &str, digest: &Digest) -> String {
        format!(
            "{}/index/{}/{}",
            Self::manifest_tag(name, tag),
            digest.algorithm().name(),
            digest.hex()
        )
    }

    pub fn manifest_tag_index_entry_link(
        name: &RepositoryName,
        tag: &str,
        digest: &Digest,
    ) -> String {
        format!("{}/link", Self::manifest_tag_index_entry(name, tag, digest))
    }

    pub fn layer_link(name: &RepositoryName, digest: &Digest) -> String {
        format!(
            "{}/{}/{}/{}/link",
            Self::repository_root(name),
            LAYERS_DIR,
            digest.algorithm().name(),
            digest.hex()
        )
    }

    pub fn blobs_root() -> String {
        format!("{}/blobs", STORAGE_ROOT)
    }

    /// Blob directory, sharded by the first two hex characters
    pub fn blob(digest: &Digest) -> String {
        let hex = digest.hex();
        format!(
            "{}/{}/{}/{}",
            Self::blobs_root(),
            digest.algorithm().name(),
            &hex[..2],
            hex
        )
    }

    pub fn blob_data(digest: &Digest) -> String {
        format!("{}/data", Self::blob(digest))
    }
}
