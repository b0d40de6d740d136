//! Error types for garbage collection runs
//!
//! Every fallible operation in the crate returns [`GcError`]. Storage and
//! registry collaborators surface a few distinguished conditions
//! ([`GcError::PathNotFound`], [`GcError::ManifestUnknownRevision`],
//! [`GcError::RepositoryUnknown`]) which the mark engine treats as benign or
//! tolerated. Everything else is fatal and gets wrapped with the phase and the
//! identifier it failed on via [`GcError::wrap`].

use crate::gc::GcPhase;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GcError>;

#[derive(Error, Debug)]
pub enum GcError {
    /// Missing capability or invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Repository name or tag that does not follow the reference grammar
    #[error("Invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Invalid digest {digest:?}: {reason}")]
    InvalidDigest { digest: String, reason: String },

    /// Storage path rejected by a driver before touching the backend
    #[error("Invalid storage path {0:?}")]
    InvalidPath(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Unknown manifest revision {digest} in repository {repository}")]
    ManifestUnknownRevision { repository: String, digest: String },

    #[error("Repository unknown: {0}")]
    RepositoryUnknown(String),

    #[error("Manifest parsing error: {0}")]
    ManifestParsing(String),

    #[error("Storage error at {path}: {message}")]
    Storage { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation cancelled")]
    Cancelled,

    /// Failure annotated with the run phase and the identifier involved
    #[error("{context}: {source}")]
    Phase {
        phase: GcPhase,
        context: String,
        #[source]
        source: Box<GcError>,
    },
}

impl GcError {
    /// Wrap this error with the phase it happened in and a message naming
    /// the repository, digest or path involved.
    pub fn wrap(self, phase: GcPhase, context: impl Into<String>) -> Self {
        GcError::Phase {
            phase,
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost cause, looking through any number of [`GcError::Phase`] layers.
    pub fn root(&self) -> &GcError {
        match self {
            GcError::Phase { source, .. } => source.root(),
            other => other,
        }
    }

    /// Phase of the outermost wrapping layer, if any.
    pub fn phase(&self) -> Option<GcPhase> {
        match self {
            GcError::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    pub fn is_path_not_found(&self) -> bool {
        matches!(self.root(), GcError::PathNotFound(_))
    }

    pub fn is_unknown_revision(&self) -> bool {
        matches!(self.root(), GcError::ManifestUnknownRevision { .. })
    }

    pub fn is_repository_unknown(&self) -> bool {
        matches!(self.root(), GcError::RepositoryUnknown(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), GcError::Cancelled)
    }
}

/// Attach phase context to a [`Result`] without spelling out `map_err`.
pub trait ResultExt<T> {
    fn phase_context<F, S>(self, phase: GcPhase, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn phase_context<F, S>(self, phase: GcPhase, context: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|err| err.wrap(phase, context()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_looks_through_wrapping() {
        let err = GcError::PathNotFound("/docker/registry/v2/repositories".to_string())
            .wrap(GcPhase::Mark, "failed to enumerate manifests")
            .wrap(GcPhase::Mark, "failed to mark");

        assert!(err.is_path_not_found());
        assert!(!err.is_cancelled());
        assert_eq!(err.phase(), Some(GcPhase::Mark));
        assert!(matches!(err.root(), GcError::PathNotFound(_)));
    }

    #[test]
    fn test_wrapped_message_keeps_chain() {
        let err = GcError::Cancelled.wrap(GcPhase::SweepBlobs, "failed to delete blob sha256:abc");
        assert_eq!(
            err.to_string(),
            "failed to delete blob sha256:abc: Operation cancelled"
        );
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_phase_context_only_wraps_errors() {
        let ok: Result<u32> = Ok(7);
        assert_eq!(ok.phase_context(GcPhase::Report, || "unused").unwrap(), 7);

        let failed: Result<u32> = Err(GcError::RepositoryUnknown("app".to_string()));
        let err = failed
            .phase_context(GcPhase::Mark, || format!("failed to retrieve tags for {}", "app"))
            .unwrap_err();
        assert!(err.is_repository_unknown());
        assert_eq!(err.phase(), Some(GcPhase::Mark));
    }
}
