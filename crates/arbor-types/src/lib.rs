//! Foundation types for Arbor.
//!
//! This crate provides the document tree model every other Arbor crate
//! operates on, plus the addressing scheme shared by diffs and conflicts.
//!
//! # Key Types
//!
//! - [`Value`] -- Closed tagged variant for schema-free documents
//! - [`Mapping`] -- Ordered, unique-key map with order-insensitive equality
//! - [`Path`] / [`PathStep`] -- Location of a node inside a [`Value`]

pub mod error;
pub mod mapping;
pub mod path;
pub mod value;

pub use error::TypeError;
pub use mapping::Mapping;
pub use path::{Path, PathStep};
pub use value::{Value, ValueKind};

/// Numbers are carried in their parsed JSON representation.
pub use serde_json::Number;
