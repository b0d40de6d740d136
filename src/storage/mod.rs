//! Storage drivers and the on-disk registry layout
//!
//! The collector never touches bytes directly: the [`Vacuum`](crate::gc::Vacuum)
//! and the [`LayoutNamespace`](crate::registry::LayoutNamespace) go through a
//! [`StorageDriver`], addressing content with [`LayoutPaths`].

pub mod driver;
pub mod filesystem;
pub mod memory;
pub mod paths;

pub use driver::{FileInfo, StorageDriver};
pub use filesystem::FilesystemDriver;
pub use memory::{InMemoryDriver, StorageOp};
pub use paths::LayoutPaths;
