//! Error types for the diff crate.

use arbor_types::Path;

/// Errors that can occur while configuring the engine or applying a diff.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// An op addresses a location that is missing from, or incompatible
    /// with, the value it is applied to.
    #[error("malformed diff at '{path}': {reason}")]
    MalformedDiff { path: Path, reason: String },

    /// A configuration value is outside its domain.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DiffError {
    pub(crate) fn malformed(path: &Path, reason: impl Into<String>) -> Self {
        Self::MalformedDiff {
            path: path.clone(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
