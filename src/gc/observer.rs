//! Run diagnostics
//!
//! The collector reports progress as typed [`GcEvent`]s. Rendering is up to
//! the observer: [`ConsoleObserver`] writes through the [`Logger`], and
//! [`RecordingObserver`] keeps the events so tests can assert on them.

use crate::digest::Digest;
use crate::gc::GcPhase;
use crate::logging::Logger;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GcEvent {
    PhaseStarted(GcPhase),
    RepositoryVisited { repository: String },
    ManifestMarked { repository: String, digest: Digest },
    BlobMarked { digest: Digest },
    CandidateFound { repository: String, digest: Digest },
    /// Manifest enumeration hit a missing path; the repository walk ended early
    WalkInterrupted { repository: String, path: String },
    /// Manifest revision vanished between enumeration and fetch
    ManifestSkipped { repository: String, digest: Digest },
    Summary {
        marked: usize,
        blobs_eligible: usize,
        manifests_eligible: usize,
    },
    BlobEligible { digest: Digest },
    ManifestDeleted { repository: String, digest: Digest },
    BlobDeleted { digest: Digest },
}

pub trait GcObserver: Send + Sync {
    fn on_event(&self, event: GcEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

pub static NOOP: NoopObserver = NoopObserver;

impl GcObserver for NoopObserver {
    fn on_event(&self, _event: GcEvent) {}
}

/// Keeps every event in arrival order
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<GcEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GcEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn phases(&self) -> Vec<GcPhase> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                GcEvent::PhaseStarted(phase) => Some(phase),
                _ => None,
            })
            .collect()
    }
}

impl GcObserver for RecordingObserver {
    fn on_event(&self, event: GcEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Renders events as human readable lines
#[derive(Debug, Clone)]
pub struct ConsoleObserver {
    logger: Logger,
}

impl ConsoleObserver {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl GcObserver for ConsoleObserver {
    fn on_event(&self, event: GcEvent) {
        match event {
            GcEvent::PhaseStarted(phase) => self.logger.subsection(&phase.to_string()),
            GcEvent::RepositoryVisited { repository } => self.logger.step(&repository),
            GcEvent::ManifestMarked { repository, digest } => self
                .logger
                .verbose(&format!("{}: marking manifest {}", repository, digest)),
            GcEvent::BlobMarked { digest } => {
                self.logger.detail(&format!("marking blob {}", digest))
            }
            GcEvent::CandidateFound { repository, digest } => self.logger.info(&format!(
                "manifest eligible for deletion: {}@{}",
                repository, digest
            )),
            GcEvent::WalkInterrupted { repository, path } => self.logger.verbose(&format!(
                "{}: stopped walking at missing path {}",
                repository, path
            )),
            GcEvent::ManifestSkipped { repository, digest } => self.logger.warning(&format!(
                "{}: manifest {} is no longer linked, skipping",
                repository, digest
            )),
            GcEvent::Summary {
                marked,
                blobs_eligible,
                manifests_eligible,
            } => self.logger.info(&format!(
                "{} blobs marked, {} blobs and {} manifests eligible for deletion",
                marked, blobs_eligible, manifests_eligible
            )),
            GcEvent::BlobEligible { digest } => {
                self.logger.verbose(&format!("blob eligible for deletion: {}", digest))
            }
            GcEvent::ManifestDeleted { repository, digest } => self
                .logger
                .detail(&format!("deleted manifest {}@{}", repository, digest.short())),
            GcEvent::BlobDeleted { digest } => {
                self.logger.detail(&format!("deleted blob {}", digest.short()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_keeps_order() {
        let observer = RecordingObserver::new();
        observer.on_event(GcEvent::PhaseStarted(GcPhase::Mark));
        observer.on_event(GcEvent::RepositoryVisited {
            repository: "app".to_string(),
        });
        observer.on_event(GcEvent::PhaseStarted(GcPhase::Report));

        assert_eq!(observer.events().len(), 3);
        assert_eq!(observer.phases(), vec![GcPhase::Mark, GcPhase::Report]);
    }
}
