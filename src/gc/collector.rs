//! Mark and sweep driver

use crate::context::Context;
use crate::digest::Digest;
use crate::error::{Result, ResultExt};
use crate::gc::mark::{DeletionCandidate, MarkSet, mark};
use crate::gc::observer::{GcEvent, GcObserver, NOOP};
use crate::gc::vacuum::{Sweeper, Vacuum};
use crate::registry::traits::{FnVisitor, Namespace};
use crate::storage::StorageDriver;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Stage of a collection run. Runs move strictly forward through the variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GcPhase {
    Mark,
    Report,
    SweepManifests,
    SweepBlobs,
    Done,
}

impl fmt::Display for GcPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GcPhase::Mark => "mark",
            GcPhase::Report => "report",
            GcPhase::SweepManifests => "sweep manifests",
            GcPhase::SweepBlobs => "sweep blobs",
            GcPhase::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcOptions {
    /// Report what would be deleted without deleting anything
    pub dry_run: bool,
    /// Treat manifests without a tag as garbage
    pub remove_untagged: bool,
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GcReport {
    pub marked: usize,
    pub blobs_eligible: usize,
    pub manifests_eligible: usize,
    pub manifests_deleted: usize,
    pub blobs_deleted: usize,
    pub dry_run: bool,
}

/// State owned by a single run
#[derive(Debug, Default)]
struct RunState {
    mark_set: MarkSet,
    candidates: Vec<DeletionCandidate>,
    delete_set: BTreeSet<Digest>,
}

pub struct GarbageCollector<'a> {
    namespace: &'a dyn Namespace,
    sweeper: &'a dyn Sweeper,
    observer: &'a dyn GcObserver,
    options: GcOptions,
}

impl<'a> GarbageCollector<'a> {
    pub fn new(namespace: &'a dyn Namespace, sweeper: &'a dyn Sweeper) -> Self {
        Self {
            namespace,
            sweeper,
            observer: &NOOP,
            options: GcOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GcOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn GcObserver) -> Self {
        self.observer = observer;
        self
    }

    fn enter(&self, phase: GcPhase) {
        tracing::debug!(%phase, "entering phase");
        self.observer.on_event(GcEvent::PhaseStarted(phase));
    }

    pub async fn run(&self, ctx: &Context) -> Result<GcReport> {
        checkpoint(ctx, GcPhase::Mark)?;
        tracing::info!(run_id = %ctx.run_id(), dry_run = self.options.dry_run, "starting garbage collection");

        self.enter(GcPhase::Mark);
        let outcome = mark(ctx, self.namespace, &self.options, self.observer).await?;
        let mut state = RunState {
            mark_set: outcome.mark_set,
            candidates: outcome.candidates,
            delete_set: BTreeSet::new(),
        };

        self.enter(GcPhase::Report);
        checkpoint(ctx, GcPhase::Report)?;
        {
            let mark_set = &state.mark_set;
            let delete_set = &mut state.delete_set;
            let mut diff = FnVisitor(|digest: &Digest| -> Result<()> {
                if !mark_set.contains(digest) {
                    delete_set.insert(digest.clone());
                }
                Ok(())
            });
            self.namespace
                .blobs()
                .enumerate(ctx, &mut diff)
                .await
                .phase_context(GcPhase::Report, || "error enumerating blobs")?;
        }

        let mut report = GcReport {
            marked: state.mark_set.len(),
            blobs_eligible: state.delete_set.len(),
            manifests_eligible: state.candidates.len(),
            dry_run: self.options.dry_run,
            ..GcReport::default()
        };
        self.observer.on_event(GcEvent::Summary {
            marked: report.marked,
            blobs_eligible: report.blobs_eligible,
            manifests_eligible: report.manifests_eligible,
        });
        for digest in &state.delete_set {
            self.observer.on_event(GcEvent::BlobEligible {
                digest: digest.clone(),
            });
        }

        if self.options.dry_run {
            self.enter(GcPhase::Done);
            return Ok(report);
        }

        self.enter(GcPhase::SweepManifests);
        checkpoint(ctx, GcPhase::SweepManifests)?;
        for candidate in &state.candidates {
            checkpoint(ctx, GcPhase::SweepManifests)?;
            self.sweeper
                .remove_manifest(&candidate.repository, &candidate.digest, &candidate.tags)
                .await
                .phase_context(GcPhase::SweepManifests, || {
                    format!("failed to delete manifest {}", candidate.digest)
                })?;
            report.manifests_deleted += 1;
            self.observer.on_event(GcEvent::ManifestDeleted {
                repository: candidate.repository.to_string(),
                digest: candidate.digest.clone(),
            });
        }

        self.enter(GcPhase::SweepBlobs);
        for digest in &state.delete_set {
            checkpoint(ctx, GcPhase::SweepBlobs)?;
            self.sweeper
                .remove_blob(digest)
                .await
                .phase_context(GcPhase::SweepBlobs, || format!("failed to delete blob {}", digest))?;
            report.blobs_deleted += 1;
            self.observer.on_event(GcEvent::BlobDeleted {
                digest: digest.clone(),
            });
        }

        self.enter(GcPhase::Done);
        tracing::info!(
            manifests_deleted = report.manifests_deleted,
            blobs_deleted = report.blobs_deleted,
            "garbage collection complete"
        );
        Ok(report)
    }
}

fn checkpoint(ctx: &Context, phase: GcPhase) -> Result<()> {
    ctx.check().phase_context(phase, || "cancelled")
}

/// Mark and sweep `namespace`, deleting through a [`Vacuum`] over `driver`
pub async fn mark_and_sweep(
    ctx: &Context,
    driver: Arc<dyn StorageDriver>,
    namespace: &dyn Namespace,
    options: GcOptions,
    observer: &dyn GcObserver,
) -> Result<GcReport> {
    let vacuum = Vacuum::new(ctx.clone(), driver);
    GarbageCollector::new(namespace, &vacuum)
        .with_options(options)
        .with_observer(observer)
        .run(ctx)
        .await
}
