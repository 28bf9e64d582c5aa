//! Structural diff engine for Arbor.
//!
//! Computes recursive diffs between two [`Value`](arbor_types::Value)s and
//! applies them back. Sequences are aligned with a Myers edit script over a
//! similarity predicate, so modified elements are patched in place instead of
//! being removed and re-added. Multi-line strings are diffed line by line.
//!
//! # Key Types
//!
//! - [`Differ`] / [`DiffConfig`] -- Diff computation under tunable thresholds
//! - [`Diff`] / [`DiffOp`] / [`Key`] -- The recursive diff model
//! - [`apply`] -- Patch application
//! - [`align`] / [`align_equal`] / [`Edit`] -- Generic sequence alignment

pub mod align;
pub mod config;
pub mod engine;
pub mod error;
pub mod lines;
pub mod ops;
pub mod patch;
pub mod similarity;

pub use align::{align, align_equal, Edit};
pub use config::{DiffConfig, KeyFilter};
pub use engine::{diff, Differ};
pub use error::{DiffError, DiffResult};
pub use ops::{Diff, DiffOp, DiffSummary, Key, OpKind};
pub use patch::apply;
pub use similarity::similarity;
