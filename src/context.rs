//! Run context threaded through every storage and registry call

use crate::error::{GcError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// Run-scoped handle carrying the run id and the cooperative cancellation flag.
///
/// Clones share the same flag, so a [`Vacuum`](crate::gc::Vacuum) built from a
/// clone observes cancellation of the original.
#[derive(Debug, Clone)]
pub struct Context {
    run_id: Uuid,
    cancelled: Arc<AtomicBool>,
}

/// Cancels the [`Context`] it was taken from, e.g. from a signal handler task.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with [`GcError::Cancelled`] once the run has been cancelled
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(GcError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
