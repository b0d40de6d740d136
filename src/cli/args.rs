//! Command-line argument parsing

use crate::cli::config::GcConfig;
use crate::error::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "registry-gc")]
#[command(about = "Mark and sweep garbage collection for registry storage")]
#[command(version, author)]
pub struct Args {
    /// Configuration file path
    #[arg(long = "config", short = 'c', help = "Path to a JSON configuration file")]
    pub config: Option<PathBuf>,

    /// Storage root directory
    #[arg(
        long = "root",
        short = 'r',
        help = "Root directory of the filesystem storage driver"
    )]
    pub root: Option<PathBuf>,

    /// Dry run mode
    #[arg(
        long = "dry-run",
        short = 'n',
        help = "Report eligible manifests and blobs without deleting anything"
    )]
    pub dry_run: bool,

    #[arg(
        long = "delete-untagged",
        short = 'm',
        help = "Delete manifests that are not currently referenced by a tag"
    )]
    pub delete_untagged: bool,

    /// Verbose output
    #[arg(long = "verbose", short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long = "quiet",
        short = 'q',
        conflicts_with = "verbose",
        help = "Only print errors"
    )]
    pub quiet: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Resolve the effective configuration: file, then environment, then flags
    pub fn into_config(self) -> Result<GcConfig> {
        let base = match &self.config {
            Some(path) => GcConfig::from_file(path)?,
            None => GcConfig::default(),
        };
        let config = self.apply(base.apply_env()?);
        config.validate()?;
        Ok(config)
    }

    /// Layer the flags given on the command line over `config`
    pub fn apply(&self, mut config: GcConfig) -> GcConfig {
        if let Some(root) = &self.root {
            config.storage.root_directory = root.clone();
        }
        config.dry_run |= self.dry_run;
        config.remove_untagged |= self.delete_untagged;
        if self.quiet {
            config.quiet = true;
            config.verbose = false;
        }
        config.verbose |= self.verbose;
        config
    }
}
