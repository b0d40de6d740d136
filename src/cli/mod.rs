//! Command line interface module
//!
//! This module provides the entry point for parsing command-line arguments,
//! resolving configuration and running a collection.

pub mod args;
pub mod config;
pub mod runner;

pub use args::Args;
pub use config::{GcConfig, StorageConfig};
pub use runner::Runner;
