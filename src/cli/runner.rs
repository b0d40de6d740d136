//! Runs a collection against the configured filesystem storage

use crate::cli::config::GcConfig;
use crate::context::Context;
use crate::error::{GcError, Result};
use crate::gc::{ConsoleObserver, GcReport, mark_and_sweep};
use crate::logging::Logger;
use crate::registry::LayoutNamespace;
use crate::storage::{FilesystemDriver, StorageDriver};
use std::sync::Arc;

pub struct Runner {
    config: GcConfig,
    logger: Logger,
}

impl Runner {
    pub fn new(config: GcConfig) -> Self {
        let logger = if config.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(config.verbose)
        };
        Self { config, logger }
    }

    pub async fn run(&self) -> Result<GcReport> {
        let root = &self.config.storage.root_directory;
        if !root.is_dir() {
            return Err(GcError::Configuration(format!(
                "Storage root {} is not a directory",
                root.display()
            )));
        }

        self.logger.section("Registry Garbage Collection");
        self.logger.info(&format!("Storage root: {}", root.display()));
        if self.config.dry_run {
            self.logger.info("Dry run mode - nothing will be deleted");
        }

        let ctx = Context::new();
        let cancel = ctx.cancel_handle();
        let signal = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping after the current operation");
                cancel.cancel();
            }
        });

        let driver: Arc<dyn StorageDriver> = Arc::new(FilesystemDriver::new(root));
        let namespace = LayoutNamespace::new(Arc::clone(&driver));
        let observer = ConsoleObserver::new(self.logger.clone());
        let result = mark_and_sweep(&ctx, driver, &namespace, self.config.options(), &observer).await;
        signal.abort();

        let report = result?;
        self.print_summary(&report);
        Ok(report)
    }

    fn print_summary(&self, report: &GcReport) {
        self.logger.summary_kv(
            "Summary",
            &[
                ("Blobs marked", report.marked.to_string()),
                ("Blobs eligible", report.blobs_eligible.to_string()),
                ("Manifests eligible", report.manifests_eligible.to_string()),
                ("Manifests deleted", report.manifests_deleted.to_string()),
                ("Blobs deleted", report.blobs_deleted.to_string()),
            ],
        );
        self.logger.success(&format!(
            "Garbage collection completed in {}",
            self.logger.format_duration(self.logger.elapsed())
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::config::StorageConfig;

    #[tokio::test]
    async fn test_missing_root_is_configuration_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = GcConfig {
            storage: StorageConfig {
                root_directory: dir.path().join("absent"),
            },
            quiet: true,
            ..GcConfig::default()
        };
        let err = Runner::new(config).run().await.unwrap_err();
        assert!(matches!(err, GcError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_empty_root_collects_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = GcConfig {
            storage: StorageConfig {
                root_directory: dir.path().to_path_buf(),
            },
            quiet: true,
            ..GcConfig::default()
        };
        let report = Runner::new(config).run().await.unwrap();
        assert_eq!(report, GcReport::default());
    }
}
