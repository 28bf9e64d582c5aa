//! The diff model: addressed operations composed into recursive diffs.
//!
//! A [`Diff`] is scoped to one container and lists [`DiffOp`]s against its
//! entries. `Patch` ops nest a further `Diff` for a child that survives
//! structurally.
//!
//! # Sequence addressing
//!
//! `Remove`, `Replace` and `Patch` name an element by its index in the
//! *original* sequence; at most one of them names any index, and they are
//! listed in increasing index order. `Add { key: Index(i) }` inserts before
//! original element `i` (`i == len` appends). Several adds may share a gap
//! and are applied in the order listed; at equal index, adds come before
//! the element op.
//!
//! # Serialized form
//!
//! Ops serialize as objects tagged by `"op"`:
//!
//! ```json
//! [{"op": "add", "key": "c", "value": 2},
//!  {"op": "patch", "key": "b", "diff": [{"op": "add", "key": 3, "value": 4}]}]
//! ```

use std::fmt;

use arbor_types::{PathStep, Value};
use serde::{Deserialize, Serialize};

use crate::error::{DiffError, DiffResult};

/// The address of one op inside its container.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    /// An element index of a sequence (or a line of a multi-line string).
    Index(usize),
    /// A mapping key.
    Field(String),
    /// The whole document. Only used by a single root `Replace`.
    Root,
}

impl Key {
    /// The path step this key contributes, or `None` for [`Key::Root`].
    pub fn to_step(&self) -> Option<PathStep> {
        match self {
            Key::Index(i) => Some(PathStep::Index(*i)),
            Key::Field(k) => Some(PathStep::Key(k.clone())),
            Key::Root => None,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<PathStep> for Key {
    fn from(step: PathStep) -> Self {
        match step {
            PathStep::Index(i) => Key::Index(i),
            PathStep::Key(k) => Key::Field(k),
        }
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

impl From<&str> for Key {
    fn from(k: &str) -> Self {
        Key::Field(k.to_string())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "[{i}]"),
            Key::Field(k) => write!(f, "{k:?}"),
            Key::Root => f.write_str("<root>"),
        }
    }
}

/// The kind of a [`DiffOp`], without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    Add,
    Remove,
    Replace,
    Patch,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpKind::Add => "add",
            OpKind::Remove => "remove",
            OpKind::Replace => "replace",
            OpKind::Patch => "patch",
        };
        f.write_str(name)
    }
}

/// One addressed change within a container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DiffOp {
    /// Insert a new entry.
    Add { key: Key, value: Value },
    /// Delete an existing entry.
    Remove { key: Key },
    /// Replace an entry wholesale.
    Replace { key: Key, value: Value },
    /// Modify an entry recursively.
    Patch { key: Key, diff: Diff },
}

impl DiffOp {
    pub fn add(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        DiffOp::Add {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn remove(key: impl Into<Key>) -> Self {
        DiffOp::Remove { key: key.into() }
    }

    pub fn replace(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        DiffOp::Replace {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn patch(key: impl Into<Key>, diff: Diff) -> Self {
        DiffOp::Patch {
            key: key.into(),
            diff,
        }
    }

    pub fn key(&self) -> &Key {
        match self {
            DiffOp::Add { key, .. }
            | DiffOp::Remove { key }
            | DiffOp::Replace { key, .. }
            | DiffOp::Patch { key, .. } => key,
        }
    }

    pub fn kind(&self) -> OpKind {
        match self {
            DiffOp::Add { .. } => OpKind::Add,
            DiffOp::Remove { .. } => OpKind::Remove,
            DiffOp::Replace { .. } => OpKind::Replace,
            DiffOp::Patch { .. } => OpKind::Patch,
        }
    }

    /// Returns `true` if this op names an existing element rather than a gap.
    pub fn addresses_existing(&self) -> bool {
        !matches!(self, DiffOp::Add { .. })
    }

    /// Ordering key within a sequence diff: adds precede the element op at
    /// the same index.
    fn sequence_rank(&self) -> Option<(usize, u8)> {
        self.key()
            .index()
            .map(|i| (i, u8::from(self.addresses_existing())))
    }
}

/// An ordered list of [`DiffOp`]s scoped to one container.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diff {
    ops: Vec<DiffOp>,
}

impl Diff {
    /// Create an empty diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a list of ops as-is.
    pub fn from_ops(ops: Vec<DiffOp>) -> Self {
        Self { ops }
    }

    /// A diff replacing the whole document.
    pub fn replace_root(value: Value) -> Self {
        Self {
            ops: vec![DiffOp::Replace {
                key: Key::Root,
                value,
            }],
        }
    }

    pub fn ops(&self) -> &[DiffOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<DiffOp> {
        self.ops
    }

    pub fn ops_mut(&mut self) -> &mut Vec<DiffOp> {
        &mut self.ops
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DiffOp> {
        self.ops.iter()
    }

    /// Returns `true` if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of ops at this level.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// The replacement document if this is a root `Replace` diff.
    pub fn root_replacement(&self) -> Option<&Value> {
        match self.ops.as_slice() {
            [DiffOp::Replace {
                key: Key::Root,
                value,
            }] => Some(value),
            _ => None,
        }
    }

    /// Number of `Add` ops at this level.
    pub fn additions(&self) -> usize {
        self.count(OpKind::Add)
    }

    /// Number of `Remove` ops at this level.
    pub fn removals(&self) -> usize {
        self.count(OpKind::Remove)
    }

    /// Number of `Replace` ops at this level.
    pub fn replacements(&self) -> usize {
        self.count(OpKind::Replace)
    }

    /// Number of `Patch` ops at this level.
    pub fn patches(&self) -> usize {
        self.count(OpKind::Patch)
    }

    fn count(&self, kind: OpKind) -> usize {
        self.ops.iter().filter(|op| op.kind() == kind).count()
    }

    /// Leaf change counts across every nesting level.
    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        let mut stack = vec![self];
        while let Some(diff) = stack.pop() {
            for op in &diff.ops {
                match op {
                    DiffOp::Add { .. } => summary.added += 1,
                    DiffOp::Remove { .. } => summary.removed += 1,
                    DiffOp::Replace { .. } => summary.replaced += 1,
                    DiffOp::Patch { diff, .. } => {
                        summary.patched += 1;
                        stack.push(diff);
                    }
                }
            }
        }
        summary
    }

    /// Reorder ops into canonical order at every nesting level.
    ///
    /// Index-addressed ops are stably sorted by index with adds before the
    /// element op at the same index; other ops keep their relative order
    /// after them.
    pub fn normalize(&mut self) {
        let mut stack = vec![self];
        while let Some(diff) = stack.pop() {
            diff.ops
                .sort_by_key(|op| op.sequence_rank().unwrap_or((usize::MAX, 2)));
            for op in &mut diff.ops {
                if let DiffOp::Patch { diff: nested, .. } = op {
                    stack.push(nested);
                }
            }
        }
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// Serialize to the self-describing JSON form.
    pub fn to_json(&self) -> DiffResult<String> {
        serde_json::to_string(self).map_err(|e| DiffError::Serialization(e.to_string()))
    }

    /// Serialize to indented JSON.
    pub fn to_json_pretty(&self) -> DiffResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| DiffError::Serialization(e.to_string()))
    }

    /// Parse the self-describing JSON form.
    ///
    /// Nesting depth is unbounded: the parser's recursion limit is lifted
    /// and the stack grows on demand, so any diff `to_json` emits reads back.
    pub fn from_json(s: &str) -> DiffResult<Self> {
        let mut de = serde_json::Deserializer::from_str(s);
        de.disable_recursion_limit();
        let diff = Diff::deserialize(serde_stacker::Deserializer::new(&mut de))
            .map_err(|e| DiffError::Serialization(e.to_string()))?;
        de.end()
            .map_err(|e| DiffError::Serialization(e.to_string()))?;
        Ok(diff)
    }
}

impl From<Vec<DiffOp>> for Diff {
    fn from(ops: Vec<DiffOp>) -> Self {
        Self::from_ops(ops)
    }
}

impl IntoIterator for Diff {
    type Item = DiffOp;
    type IntoIter = std::vec::IntoIter<DiffOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diff {
    type Item = &'a DiffOp;
    type IntoIter = std::slice::Iter<'a, DiffOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

/// Leaf change counts of a diff, summed over all nesting levels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub replaced: usize,
    /// Number of `Patch` ops (containers modified in place).
    pub patched: usize,
}

impl DiffSummary {
    /// Total number of leaf changes.
    pub fn changes(&self) -> usize {
        self.added + self.removed + self.replaced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn serialized_form_is_tagged() {
        let diff = Diff::from_ops(vec![
            DiffOp::add("c", v(json!(2))),
            DiffOp::patch("b", Diff::from_ops(vec![DiffOp::add(3usize, v(json!(4)))])),
            DiffOp::remove("gone"),
        ]);
        let json: serde_json::Value = serde_json::from_str(&diff.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            json!([
                {"op": "add", "key": "c", "value": 2},
                {"op": "patch", "key": "b", "diff": [{"op": "add", "key": 3, "value": 4}]},
                {"op": "remove", "key": "gone"}
            ])
        );
    }

    #[test]
    fn json_roundtrip_nested() {
        let diff = Diff::from_ops(vec![
            DiffOp::replace("x", v(json!({"deep": [1, null, "s"]}))),
            DiffOp::patch(
                "list",
                Diff::from_ops(vec![
                    DiffOp::add(0usize, v(json!("first"))),
                    DiffOp::remove(2usize),
                    DiffOp::patch(4usize, Diff::from_ops(vec![DiffOp::remove("k")])),
                ]),
            ),
        ]);
        let parsed = Diff::from_json(&diff.to_json_pretty().unwrap()).unwrap();
        assert_eq!(parsed, diff);
    }

    #[test]
    fn root_replacement_roundtrip() {
        let diff = Diff::replace_root(v(json!([1, 2])));
        let text = diff.to_json().unwrap();
        assert_eq!(text, r#"[{"op":"replace","key":null,"value":[1,2]}]"#);
        let parsed = Diff::from_json(&text).unwrap();
        assert_eq!(parsed.root_replacement(), Some(&v(json!([1, 2]))));
    }

    #[test]
    fn json_roundtrip_past_parser_recursion_limit() {
        let mut diff = Diff::from_ops(vec![DiffOp::replace("leaf", v(json!(2)))]);
        for depth in 0..100 {
            let key = if depth % 2 == 0 { Key::Index(0) } else { Key::from("k") };
            diff = Diff::from_ops(vec![DiffOp::Patch { key, diff }]);
        }
        let text = diff.to_json().unwrap();
        let parsed = Diff::from_json(&text).unwrap();
        assert_eq!(parsed, diff);
        assert_eq!(parsed.to_json().unwrap(), text);
    }

    #[test]
    fn from_json_rejects_trailing_input() {
        assert!(matches!(
            Diff::from_json(r#"[] []"#),
            Err(DiffError::Serialization(_))
        ));
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(matches!(
            Diff::from_json(r#"[{"op": "frobnicate", "key": 1}]"#),
            Err(DiffError::Serialization(_))
        ));
    }

    #[test]
    fn counts_and_summary() {
        let diff = Diff::from_ops(vec![
            DiffOp::add("a", v(json!(1))),
            DiffOp::remove("b"),
            DiffOp::patch(
                "c",
                Diff::from_ops(vec![
                    DiffOp::replace(0usize, v(json!(5))),
                    DiffOp::add(1usize, v(json!(6))),
                ]),
            ),
        ]);
        assert_eq!(diff.len(), 3);
        assert_eq!(diff.additions(), 1);
        assert_eq!(diff.removals(), 1);
        assert_eq!(diff.patches(), 1);
        assert_eq!(diff.replacements(), 0);

        let summary = diff.summary();
        assert_eq!(summary.added, 2);
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.replaced, 1);
        assert_eq!(summary.patched, 1);
        assert_eq!(summary.changes(), 4);
    }

    #[test]
    fn normalized_puts_adds_before_element_ops() {
        let diff = Diff::from_ops(vec![
            DiffOp::remove(2usize),
            DiffOp::add(2usize, v(json!("x"))),
            DiffOp::replace(0usize, v(json!("y"))),
            DiffOp::add(2usize, v(json!("z"))),
        ])
        .normalized();
        let keys: Vec<(OpKind, usize)> = diff
            .iter()
            .map(|op| (op.kind(), op.key().index().unwrap()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (OpKind::Replace, 0),
                (OpKind::Add, 2),
                (OpKind::Add, 2),
                (OpKind::Remove, 2),
            ]
        );
        // Adds sharing a gap keep their relative order.
        assert_eq!(diff.ops()[1], DiffOp::add(2usize, v(json!("x"))));
    }

    #[test]
    fn normalize_reaches_nested_diffs() {
        let diff = Diff::from_ops(vec![DiffOp::patch(
            "list",
            Diff::from_ops(vec![DiffOp::remove(3usize), DiffOp::add(1usize, v(json!(0)))]),
        )])
        .normalized();
        let DiffOp::Patch { diff: nested, .. } = &diff.ops()[0] else {
            panic!("expected a patch op");
        };
        assert_eq!(nested.ops()[0].kind(), OpKind::Add);
        assert_eq!(nested.ops()[1].kind(), OpKind::Remove);
    }
}
