//! Mark phase
//!
//! Walks every repository, records which manifests are reachable from a tag
//! and collects the digest of every manifest and blob they reference. Untagged
//! manifests become [`DeletionCandidate`]s when `remove_untagged` is set.

use crate::context::Context;
use crate::digest::Digest;
use crate::error::{GcError, Result, ResultExt};
use crate::gc::observer::{GcEvent, GcObserver};
use crate::gc::{GcOptions, GcPhase};
use crate::reference::RepositoryName;
use crate::registry::traits::{
    DigestVisitor, ManifestService, Namespace, RepositoryVisitor, TagService,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

/// Digests that must survive the sweep
pub type MarkSet = BTreeSet<Digest>;

/// Manifest revision scheduled for removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionCandidate {
    pub repository: RepositoryName,
    pub digest: Digest,
    /// Tags whose index may still mention the digest. Empty on dry runs.
    pub tags: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MarkOutcome {
    pub mark_set: MarkSet,
    pub candidates: Vec<DeletionCandidate>,
}

/// Run the mark phase over every repository of `namespace`
pub async fn mark(
    ctx: &Context,
    namespace: &dyn Namespace,
    options: &GcOptions,
    observer: &dyn GcObserver,
) -> Result<MarkOutcome> {
    let enumerator = namespace
        .repository_enumerator()
        .ok_or_else(|| {
            GcError::Configuration("namespace does not support repository enumeration".to_string())
        })
        .phase_context(GcPhase::Mark, || "failed to mark")?;
    ctx.check().phase_context(GcPhase::Mark, || "cancelled")?;

    let mut walker = MarkWalker {
        namespace,
        options,
        observer,
        outcome: MarkOutcome::default(),
    };
    enumerator
        .enumerate(ctx, &mut walker)
        .await
        .phase_context(GcPhase::Mark, || "failed to mark")?;

    tracing::debug!(
        marked = walker.outcome.mark_set.len(),
        candidates = walker.outcome.candidates.len(),
        "mark phase complete"
    );
    Ok(walker.outcome)
}

struct MarkWalker<'a> {
    namespace: &'a dyn Namespace,
    options: &'a GcOptions,
    observer: &'a dyn GcObserver,
    outcome: MarkOutcome,
}

#[async_trait]
impl<'a> RepositoryVisitor for MarkWalker<'a> {
    async fn visit_repository(&mut self, ctx: &Context, repo_name: &str) -> Result<()> {
        ctx.check()?;
        self.observer.on_event(GcEvent::RepositoryVisited {
            repository: repo_name.to_string(),
        });

        let name = RepositoryName::parse(repo_name)
            .phase_context(GcPhase::Mark, || format!("failed to parse repo name {}", repo_name))?;
        let repository = self
            .namespace
            .repository(ctx, &name)
            .await
            .phase_context(GcPhase::Mark, || format!("failed to construct repository {}", name))?;

        let manifests = repository.manifests();
        let enumerator = manifests.enumerator().ok_or_else(|| {
            GcError::Configuration(format!(
                "manifest service of {} does not support enumeration",
                name
            ))
        })?;

        let mut collector = ManifestCollector {
            manifests,
            tags: repository.tags(),
            remove_untagged: self.options.remove_untagged,
            parents: BTreeMap::new(),
            untagged: BTreeSet::new(),
        };
        match enumerator.enumerate(ctx, &mut collector).await {
            Ok(()) => {}
            // Unfinished uploads or a manually removed _manifests folder
            Err(GcError::PathNotFound(path)) => {
                tracing::debug!(repository = %name, %path, "manifest walk ended at missing path");
                self.observer.on_event(GcEvent::WalkInterrupted {
                    repository: name.to_string(),
                    path,
                });
            }
            Err(err) => {
                return Err(err.wrap(GcPhase::Mark, format!("failed to walk repository {}", name)));
            }
        }

        let mut candidates = Vec::new();
        for (digest, parents) in &collector.parents {
            if collector.is_candidate(digest, parents) {
                self.observer.on_event(GcEvent::CandidateFound {
                    repository: name.to_string(),
                    digest: digest.clone(),
                });
                candidates.push(DeletionCandidate {
                    repository: name.clone(),
                    digest: digest.clone(),
                    tags: Vec::new(),
                });
                continue;
            }

            self.observer.on_event(GcEvent::ManifestMarked {
                repository: name.to_string(),
                digest: digest.clone(),
            });
            self.outcome.mark_set.insert(digest.clone());

            ctx.check()?;
            let manifest = match manifests.get(ctx, digest).await {
                Ok(manifest) => manifest,
                Err(err) if err.is_unknown_revision() => {
                    self.observer.on_event(GcEvent::ManifestSkipped {
                        repository: name.to_string(),
                        digest: digest.clone(),
                    });
                    continue;
                }
                Err(err) => {
                    return Err(err.wrap(
                        GcPhase::Mark,
                        format!("mark failed to retrieve manifest for digest {}", digest),
                    ));
                }
            };
            for descriptor in manifest.references() {
                self.outcome.mark_set.insert(descriptor.digest.clone());
                self.observer.on_event(GcEvent::BlobMarked {
                    digest: descriptor.digest.clone(),
                });
            }
        }

        if !self.options.dry_run && !candidates.is_empty() {
            ctx.check()?;
            // Every tag may carry one of the candidates in its index history
            let all_tags = match repository.tags().all(ctx).await {
                Ok(tags) => tags,
                Err(err) if err.is_repository_unknown() => Vec::new(),
                Err(err) => {
                    return Err(err.wrap(GcPhase::Mark, format!("failed to retrieve tags of {}", name)));
                }
            };
            for candidate in &mut candidates {
                candidate.tags = all_tags.clone();
            }
        }

        self.outcome.candidates.extend(candidates);
        Ok(())
    }
}

/// Per-repository state built while enumerating manifest revisions
struct ManifestCollector<'r> {
    manifests: &'r dyn ManifestService,
    tags: &'r dyn TagService,
    remove_untagged: bool,
    /// Manifest lists referencing each digest; empty when it has none
    parents: BTreeMap<Digest, BTreeSet<Digest>>,
    untagged: BTreeSet<Digest>,
}

impl ManifestCollector<'_> {
    /// Untagged, and not reachable through a tagged manifest list
    fn is_candidate(&self, digest: &Digest, parents: &BTreeSet<Digest>) -> bool {
        self.untagged.contains(digest) && parents.iter().all(|parent| self.untagged.contains(parent))
    }

    async fn record_if_untagged(&mut self, ctx: &Context, digest: &Digest) -> Result<()> {
        ctx.check()?;
        let tags = self.tags.lookup(ctx, digest).await.phase_context(GcPhase::Mark, || {
            format!("failed to retrieve tags for digest {}", digest)
        })?;
        if tags.is_empty() {
            self.untagged.insert(digest.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl<'r> DigestVisitor for ManifestCollector<'r> {
    async fn visit_digest(&mut self, ctx: &Context, digest: &Digest) -> Result<()> {
        ctx.check()?;
        let manifest = self.manifests.get(ctx, digest).await.phase_context(GcPhase::Mark, || {
            format!("failed to retrieve manifest for digest {}", digest)
        })?;

        let mut lookups = Vec::new();
        if let Some(list) = manifest.as_list() {
            for child in &list.manifests {
                self.parents
                    .entry(child.digest.clone())
                    .or_default()
                    .insert(digest.clone());
                lookups.push(child.digest.clone());
            }
        }
        self.parents.entry(digest.clone()).or_default();
        if !self.untagged.contains(digest) {
            lookups.push(digest.clone());
        }

        if self.remove_untagged {
            for reference in &lookups {
                self.record_if_untagged(ctx, reference).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::observer::{NOOP, RecordingObserver};
    use crate::registry::{LayoutNamespace, RegistryFixture};
    use crate::storage::InMemoryDriver;
    use std::sync::Arc;

    fn options(remove_untagged: bool) -> GcOptions {
        GcOptions {
            dry_run: false,
            remove_untagged,
        }
    }

    #[tokio::test]
    async fn test_marks_transitively_from_tagged_list() {
        let driver = Arc::new(InMemoryDriver::new());
        let ctx = Context::new();
        let fixture = RegistryFixture::new(ctx.clone(), driver.clone());
        let repo = RepositoryName::parse("multi").unwrap();

        let amd64 = fixture.push_image(&repo, b"amd64-config", &[b"amd64-layer"]).await.unwrap();
        let arm64 = fixture.push_image(&repo, b"arm64-config", &[b"arm64-layer"]).await.unwrap();
        let list = fixture
            .push_list(&repo, &[amd64.manifest.clone(), arm64.manifest.clone()])
            .await
            .unwrap();
        fixture.tag(&repo, "latest", &list.digest).await.unwrap();

        let namespace = LayoutNamespace::new(driver);
        let outcome = mark(&ctx, &namespace, &options(true), &NOOP).await.unwrap();

        assert!(outcome.candidates.is_empty());
        for image in [&amd64, &arm64] {
            assert!(outcome.mark_set.contains(&image.manifest.digest));
            assert!(outcome.mark_set.contains(&image.config));
            assert!(outcome.mark_set.contains(&image.layers[0]));
        }
        assert!(outcome.mark_set.contains(&list.digest));
    }

    #[tokio::test]
    async fn test_untagged_manifest_is_candidate_with_tag_snapshot() {
        let driver = Arc::new(InMemoryDriver::new());
        let ctx = Context::new();
        let fixture = RegistryFixture::new(ctx.clone(), driver.clone());
        let repo = RepositoryName::parse("app").unwrap();

        let old = fixture.push_image(&repo, b"c1", &[b"l1"]).await.unwrap();
        let new = fixture.push_image(&repo, b"c2", &[b"l2"]).await.unwrap();
        fixture.tag(&repo, "latest", &old.manifest.digest).await.unwrap();
        fixture.tag(&repo, "latest", &new.manifest.digest).await.unwrap();

        let namespace = LayoutNamespace::new(driver);
        let observer = RecordingObserver::new();
        let outcome = mark(&ctx, &namespace, &options(true), &observer).await.unwrap();

        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].digest, old.manifest.digest);
        assert_eq!(outcome.candidates[0].tags, vec!["latest"]);
        assert!(!outcome.mark_set.contains(&old.manifest.digest));
        assert!(!outcome.mark_set.contains(&old.layers[0]));
        assert!(outcome.mark_set.contains(&new.layers[0]));
        assert!(observer.events().contains(&GcEvent::CandidateFound {
            repository: "app".to_string(),
            digest: old.manifest.digest.clone(),
        }));
    }

    #[tokio::test]
    async fn test_dry_run_leaves_candidate_tags_empty() {
        let driver = Arc::new(InMemoryDriver::new());
        let ctx = Context::new();
        let fixture = RegistryFixture::new(ctx.clone(), driver.clone());
        let repo = RepositoryName::parse("app").unwrap();
        let old = fixture.push_image(&repo, b"c1", &[b"l1"]).await.unwrap();
        fixture.tag(&repo, "v1", &old.manifest.digest).await.unwrap();
        let new = fixture.push_image(&repo, b"c2", &[b"l2"]).await.unwrap();
        fixture.tag(&repo, "v1", &new.manifest.digest).await.unwrap();

        let namespace = LayoutNamespace::new(driver);
        let opts = GcOptions {
            dry_run: true,
            remove_untagged: true,
        };
        let outcome = mark(&ctx, &namespace, &opts, &NOOP).await.unwrap();
        assert_eq!(outcome.candidates.len(), 1);
        assert!(outcome.candidates[0].tags.is_empty());
    }

    #[tokio::test]
    async fn test_child_shared_by_tagged_and_untagged_lists_is_kept() {
        let driver = Arc::new(InMemoryDriver::new());
        let ctx = Context::new();
        let fixture = RegistryFixture::new(ctx.clone(), driver.clone());
        let repo = RepositoryName::parse("multi").unwrap();

        let shared = fixture.push_image(&repo, b"shared", &[b"shared-layer"]).await.unwrap();
        let other = fixture.push_image(&repo, b"other", &[b"other-layer"]).await.unwrap();
        let tagged = fixture.push_list(&repo, &[shared.manifest.clone()]).await.unwrap();
        let untagged = fixture
            .push_list(&repo, &[shared.manifest.clone(), other.manifest.clone()])
            .await
            .unwrap();
        fixture.tag(&repo, "latest", &tagged.digest).await.unwrap();

        let namespace = LayoutNamespace::new(driver);
        let outcome = mark(&ctx, &namespace, &options(true), &NOOP).await.unwrap();
        let candidates: BTreeSet<_> = outcome.candidates.iter().map(|c| c.digest.clone()).collect();

        assert!(outcome.mark_set.contains(&shared.manifest.digest));
        assert!(candidates.contains(&untagged.digest));
        assert!(candidates.contains(&other.manifest.digest));
        assert!(!candidates.contains(&shared.manifest.digest));
    }

    struct NoEnumeration;

    #[async_trait]
    impl Namespace for NoEnumeration {
        fn repository_enumerator(&self) -> Option<&dyn crate::registry::RepositoryEnumerator> {
            None
        }

        async fn repository(
            &self,
            _ctx: &Context,
            name: &RepositoryName,
        ) -> Result<Box<dyn crate::registry::Repository>> {
            Err(GcError::RepositoryUnknown(name.to_string()))
        }

        fn blobs(&self) -> &dyn crate::registry::BlobEnumerator {
            unreachable!("mark never enumerates blobs")
        }
    }

    #[tokio::test]
    async fn test_missing_repository_enumeration_is_configuration_error() {
        let err = mark(&Context::new(), &NoEnumeration, &options(true), &NOOP)
            .await
            .unwrap_err();
        assert!(matches!(err.root(), GcError::Configuration(_)));
        assert_eq!(err.phase(), Some(GcPhase::Mark));
    }
}
