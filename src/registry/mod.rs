//! Registry metadata access
//!
//! [`traits`] defines the capabilities the collector needs from a registry;
//! [`layout`] implements them over a [`StorageDriver`](crate::storage::StorageDriver).

pub mod fixture;
pub mod layout;
pub mod traits;

pub use fixture::{PushedImage, RegistryFixture};
pub use layout::LayoutNamespace;
pub use traits::{
    BlobEnumerator, DigestVisitor, FnVisitor, ManifestEnumerator, ManifestService, Namespace,
    Repository, RepositoryEnumerator, RepositoryVisitor, TagService,
};
