//! Registry Garbage Collector Library
//!
//! This file serves as the library root for the registry-gc crate. The
//! collector itself lives in [`gc`]; it reads registry metadata through the
//! [`registry`] traits and deletes content through a [`storage`] driver.

pub mod cli;
pub mod context;
pub mod digest;
pub mod error;
pub mod gc;
pub mod image;
pub mod logging;
pub mod reference;
pub mod registry;
pub mod storage;

pub use context::Context;
pub use digest::Digest;
pub use error::{GcError, Result};
pub use gc::{GarbageCollector, GcOptions, GcReport, mark_and_sweep};
pub use reference::RepositoryName;
