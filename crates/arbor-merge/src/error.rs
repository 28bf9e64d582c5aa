//! Error types for the merge crate.

use arbor_diff::DiffError;
use arbor_types::Path;

/// Errors that can occur while materializing a resolved merge.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// A conflict has not been resolved yet.
    #[error("unresolved conflict at '{path}'")]
    UnresolvedConflict {
        /// Location of the first unresolved conflict, in pre-order.
        path: Path,
    },

    /// Re-applying the resolved diff to the base failed.
    #[error(transparent)]
    Diff(#[from] DiffError),
}

/// Convenience alias for resolution results.
pub type ResolveResult<T> = Result<T, MergeError>;
