//! Mark and sweep garbage collection
//!
//! A run has three stages. [`mark`] walks every repository and collects the
//! digests reachable from tagged manifests. The report stage diffs that set
//! against the blob store. The sweep stages remove untagged manifest
//! revisions and then unreferenced blobs through a [`Sweeper`].

pub mod collector;
pub mod mark;
pub mod observer;
pub mod vacuum;

pub use collector::{GarbageCollector, GcOptions, GcPhase, GcReport, mark_and_sweep};
pub use mark::{DeletionCandidate, MarkOutcome, MarkSet, mark};
pub use observer::{ConsoleObserver, GcEvent, GcObserver, NoopObserver, RecordingObserver};
pub use vacuum::{Sweeper, Vacuum};
