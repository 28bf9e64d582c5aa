//! Addressing inside a document tree.
//!
//! A [`Path`] is a list of [`PathStep`]s walked from the root of a
//! [`Value`](crate::Value). Paths are shared by diffs (where an op lives) and
//! conflicts (where two edits disagree).
//!
//! Paths are totally ordered: step by step, indices sort numerically and
//! before keys, keys sort lexicographically, and a path sorts before any of
//! its extensions. Sorting by this order yields a pre-order walk.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// One step of a [`Path`]: a mapping key or a sequence index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathStep {
    Index(usize),
    Key(String),
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Index(i) => write!(f, "{i}"),
            PathStep::Key(k) if is_index_like(k) => write!(f, "~2{k}"),
            PathStep::Key(k) => f.write_str(&k.replace('~', "~0").replace('/', "~1")),
        }
    }
}

impl From<usize> for PathStep {
    fn from(i: usize) -> Self {
        PathStep::Index(i)
    }
}

impl From<&str> for PathStep {
    fn from(k: &str) -> Self {
        PathStep::Key(k.to_string())
    }
}

impl From<String> for PathStep {
    fn from(k: String) -> Self {
        PathStep::Key(k)
    }
}

/// A location inside a document, starting at its root.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Path(Vec<PathStep>);

impl Path {
    /// The empty path, addressing the document root.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(steps: Vec<PathStep>) -> Self {
        Self(steps)
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// A new path with `step` appended.
    pub fn child(&self, step: impl Into<PathStep>) -> Self {
        let mut steps = self.0.clone();
        steps.push(step.into());
        Self(steps)
    }

    pub fn push(&mut self, step: impl Into<PathStep>) {
        self.0.push(step.into());
    }

    /// The path without its last step, or `None` at the root.
    pub fn parent(&self) -> Option<Path> {
        self.0
            .split_last()
            .map(|(_, rest)| Path(rest.to_vec()))
    }

    pub fn last(&self) -> Option<&PathStep> {
        self.0.last()
    }

    /// Returns `true` if `self` is `other` or lies beneath it.
    pub fn starts_with(&self, other: &Path) -> bool {
        self.0.starts_with(&other.0)
    }
}

impl fmt::Display for Path {
    /// Formats as a JSON-pointer-like string: `""` for the root, `/a/0/b` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.0 {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = TypeError;

    /// Parse a pointer string.
    ///
    /// All-digit segments become indices. A segment starting with `~2` is
    /// an all-digit key, which is how such keys are displayed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Path::root());
        }
        let rest = s.strip_prefix('/').ok_or_else(|| TypeError::InvalidPath {
            path: s.to_string(),
            reason: "must be empty or start with '/'".into(),
        })?;

        let mut steps = Vec::new();
        for segment in rest.split('/') {
            if let Some(key) = segment.strip_prefix("~2") {
                if !is_index_like(key) {
                    return Err(TypeError::InvalidPath {
                        path: s.to_string(),
                        reason: format!("'~2' must prefix an all-digit key: {segment}"),
                    });
                }
                steps.push(PathStep::Key(key.to_string()));
            } else if is_index_like(segment) {
                let index = segment.parse().map_err(|_| TypeError::InvalidPath {
                    path: s.to_string(),
                    reason: format!("index out of range: {segment}"),
                })?;
                steps.push(PathStep::Index(index));
            } else {
                steps.push(PathStep::Key(unescape(segment, s)?));
            }
        }
        Ok(Path(steps))
    }
}

fn is_index_like(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn unescape(segment: &str, whole: &str) -> Result<String, TypeError> {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => {
                return Err(TypeError::InvalidPath {
                    path: whole.to_string(),
                    reason: "'~' must be followed by '0' or '1'".into(),
                })
            }
        }
    }
    Ok(out)
}

impl From<Vec<PathStep>> for Path {
    fn from(steps: Vec<PathStep>) -> Self {
        Self(steps)
    }
}

impl FromIterator<PathStep> for Path {
    fn from_iter<I: IntoIterator<Item = PathStep>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
