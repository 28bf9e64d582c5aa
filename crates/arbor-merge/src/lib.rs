//! Merge engine for Arbor.
//!
//! Reconciles two diffs computed against a common ancestor. Edits to
//! different addresses combine automatically; disagreements are reported as
//! [`Conflict`]s while the merged document keeps the base value there.
//! Callers decide each conflict, one by one or with a bulk [`Strategy`], and
//! materialize the result with [`apply_resolutions`].
//!
//! # Key Types
//!
//! - [`merge`] / [`merge_values`] -- Three-way merge of diffs or documents
//! - [`MergeResult`] -- Merged document, conflicts, and the auto-merged diff
//! - [`Conflict`] / [`ConflictState`] -- A disagreement and its decision
//! - [`apply_resolutions`] -- Final document once every conflict is decided

pub mod conflict;
pub mod error;
pub mod merge;
pub mod resolve;

pub use conflict::{Conflict, ConflictState, MergeResult, Strategy};
pub use error::{MergeError, ResolveResult};
pub use merge::{merge, merge_values};
pub use resolve::apply_resolutions;
