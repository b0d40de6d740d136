//! Image manifest handling
//!
//! Provides the decoded manifest model the garbage collector walks. A
//! [`Manifest`] is either a single-platform image (config plus layers) or a
//! multi-platform manifest list whose references are child manifests.

pub mod manifest;

pub use manifest::{Descriptor, ImageManifest, Manifest, ManifestList, ManifestType, Platform};
