//! Collection runs against registry content on the local disk

use registry_gc::cli::{GcConfig, Runner, StorageConfig};
use registry_gc::context::Context;
use registry_gc::gc::{GcOptions, RecordingObserver, mark_and_sweep};
use registry_gc::reference::RepositoryName;
use registry_gc::registry::{LayoutNamespace, RegistryFixture};
use registry_gc::storage::{FilesystemDriver, LayoutPaths, StorageDriver};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn on_disk(root: &Path, path: &str) -> bool {
    root.join(path.trim_start_matches('/')).exists()
}

#[tokio::test]
async fn test_sweeps_untagged_image_on_disk() {
    let dir = TempDir::new().unwrap();
    let ctx = Context::new();
    let driver: Arc<dyn StorageDriver> = Arc::new(FilesystemDriver::new(dir.path()));
    let fixture = RegistryFixture::new(ctx.clone(), Arc::clone(&driver));
    let name = RepositoryName::parse("library/nginx").unwrap();

    let old = fixture.push_image(&name, b"old-config", &[b"old-layer"]).await.unwrap();
    fixture.tag(&name, "latest", &old.manifest.digest).await.unwrap();
    let new = fixture.push_image(&name, b"new-config", &[b"new-layer"]).await.unwrap();
    fixture.tag(&name, "latest", &new.manifest.digest).await.unwrap();

    let namespace = LayoutNamespace::new(Arc::clone(&driver));
    let options = GcOptions {
        dry_run: false,
        remove_untagged: true,
    };
    let report = mark_and_sweep(&ctx, driver, &namespace, options, &RecordingObserver::new())
        .await
        .unwrap();

    assert_eq!(report.manifests_deleted, 1);
    assert_eq!(report.blobs_deleted, 3);

    let root = dir.path();
    assert!(!on_disk(root, &LayoutPaths::manifest_revision(&name, &old.manifest.digest)));
    assert!(!on_disk(root, &LayoutPaths::manifest_tag_index_entry(&name, "latest", &old.manifest.digest)));
    assert!(!on_disk(root, &LayoutPaths::blob(&old.layers[0])));
    assert!(on_disk(root, &LayoutPaths::blob_data(&new.layers[0])));
    assert!(on_disk(root, &LayoutPaths::manifest_tag_current_link(&name, "latest")));
}

#[tokio::test]
async fn test_runner_dry_run_leaves_disk_untouched() {
    let dir = TempDir::new().unwrap();
    let ctx = Context::new();
    let driver: Arc<dyn StorageDriver> = Arc::new(FilesystemDriver::new(dir.path()));
    let fixture = RegistryFixture::new(ctx, driver);
    let orphan = fixture.put_blob(b"orphan").await.unwrap();

    let config = GcConfig {
        storage: StorageConfig {
            root_directory: dir.path().to_path_buf(),
        },
        dry_run: true,
        quiet: true,
        ..GcConfig::default()
    };
    let report = Runner::new(config).run().await.unwrap();

    assert_eq!(report.blobs_eligible, 1);
    assert_eq!(report.blobs_deleted, 0);
    assert!(on_disk(dir.path(), &LayoutPaths::blob_data(&orphan)));
}
