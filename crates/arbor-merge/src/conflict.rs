//! The conflict model and the outcome of a three-way merge.

use std::fmt;

use arbor_diff::{Diff, DiffOp};
use arbor_types::{Path, Value};
use serde::{Deserialize, Serialize};

/// How a conflict has been settled.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ConflictState {
    #[default]
    Unresolved,
    /// Take the local side's op.
    ResolvedLocal,
    /// Take the remote side's op.
    ResolvedRemote,
    /// Install a caller-supplied value at the conflict address.
    ResolvedCustom(Value),
    /// Keep the base value, discarding both sides.
    ResolvedBase,
}

impl ConflictState {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, ConflictState::Unresolved)
    }
}

/// An address where the local and remote diffs disagree.
///
/// `path` names the location in the base document; `local_op` and
/// `remote_op` are the competing ops as they appear in their diffs, keyed
/// relative to the container at `path`'s parent.
///
/// Both ops are always present: a disagreement needs an edit from each
/// side, so neither field is optional. At the root, a side whose diff is
/// not a whole-document replacement is carried as one `Patch` op keyed
/// [`Key::Root`](arbor_diff::Key::Root) holding that entire diff.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub path: Path,
    pub local_op: DiffOp,
    pub remote_op: DiffOp,
    #[serde(default)]
    pub state: ConflictState,
}

impl Conflict {
    pub fn new(path: Path, local_op: DiffOp, remote_op: DiffOp) -> Self {
        Self {
            path,
            local_op,
            remote_op,
            state: ConflictState::Unresolved,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state.is_resolved()
    }

    pub fn resolve_local(&mut self) {
        self.state = ConflictState::ResolvedLocal;
    }

    pub fn resolve_remote(&mut self) {
        self.state = ConflictState::ResolvedRemote;
    }

    pub fn resolve_custom(&mut self, value: impl Into<Value>) {
        self.state = ConflictState::ResolvedCustom(value.into());
    }

    pub fn resolve_base(&mut self) {
        self.state = ConflictState::ResolvedBase;
    }

    /// The same conflict seen from the other side.
    pub fn swapped(&self) -> Self {
        let state = match &self.state {
            ConflictState::ResolvedLocal => ConflictState::ResolvedRemote,
            ConflictState::ResolvedRemote => ConflictState::ResolvedLocal,
            other => other.clone(),
        };
        Self {
            path: self.path.clone(),
            local_op: self.remote_op.clone(),
            remote_op: self.local_op.clone(),
            state,
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}': local {} vs remote {}",
            self.path,
            self.local_op.kind(),
            self.remote_op.kind()
        )
    }
}

/// A bulk resolution policy, applied to every unresolved conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Prefer the local side.
    Local,
    /// Prefer the remote side.
    Remote,
    /// Keep the base value, dropping both sides' edits at the address.
    Base,
}

impl Strategy {
    fn state(self) -> ConflictState {
        match self {
            Strategy::Local => ConflictState::ResolvedLocal,
            Strategy::Remote => ConflictState::ResolvedRemote,
            Strategy::Base => ConflictState::ResolvedBase,
        }
    }
}

/// The outcome of [`merge`](crate::merge).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergeResult {
    /// The base with every non-conflicting edit applied. Conflicting
    /// addresses still hold their base value.
    pub merged: Value,
    /// Disagreements, sorted by path in pre-order.
    pub conflicts: Vec<Conflict>,
    /// The common ancestor both diffs were computed against.
    pub base: Value,
    /// The auto-merged diff: `apply(&diff, &base) == merged`.
    pub diff: Diff,
}

impl MergeResult {
    /// Returns `true` if the merge produced no conflicts.
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Number of conflicts still awaiting a decision.
    pub fn unresolved(&self) -> usize {
        self.conflicts.iter().filter(|c| !c.is_resolved()).count()
    }

    /// Resolve every outstanding conflict with `strategy`.
    ///
    /// Conflicts that already carry a decision are left alone.
    pub fn resolve_all(&mut self, strategy: Strategy) {
        for conflict in self.conflicts.iter_mut().filter(|c| !c.is_resolved()) {
            conflict.state = strategy.state();
        }
    }

    /// The first conflict at `path`, if any.
    pub fn conflict_at(&self, path: &Path) -> Option<&Conflict> {
        self.conflicts.iter().find(|c| &c.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conflict(key: &str) -> Conflict {
        Conflict::new(
            Path::root().child(key),
            DiffOp::replace(key, Value::from("l")),
            DiffOp::remove(key),
        )
    }

    fn result(conflicts: Vec<Conflict>) -> MergeResult {
        MergeResult {
            merged: Value::Null,
            conflicts,
            base: Value::Null,
            diff: Diff::new(),
        }
    }

    #[test]
    fn new_conflicts_are_unresolved() {
        let c = conflict("x");
        assert_eq!(c.state, ConflictState::Unresolved);
        assert!(!c.is_resolved());
    }

    #[test]
    fn resolve_helpers_set_state() {
        let mut c = conflict("x");
        c.resolve_local();
        assert_eq!(c.state, ConflictState::ResolvedLocal);
        c.resolve_remote();
        assert_eq!(c.state, ConflictState::ResolvedRemote);
        c.resolve_custom(7u64);
        assert_eq!(c.state, ConflictState::ResolvedCustom(Value::from(7u64)));
        c.resolve_base();
        assert!(c.is_resolved());
    }

    #[test]
    fn resolve_all_keeps_existing_decisions() {
        let mut first = conflict("a");
        first.resolve_remote();
        let mut r = result(vec![first, conflict("b"), conflict("c")]);
        assert_eq!(r.unresolved(), 2);

        r.resolve_all(Strategy::Local);
        assert_eq!(r.unresolved(), 0);
        assert_eq!(r.conflicts[0].state, ConflictState::ResolvedRemote);
        assert_eq!(r.conflicts[1].state, ConflictState::ResolvedLocal);
        assert_eq!(r.conflicts[2].state, ConflictState::ResolvedLocal);
    }

    #[test]
    fn swapped_exchanges_sides() {
        let mut c = conflict("x");
        c.resolve_local();
        let s = c.swapped();
        assert_eq!(s.local_op, c.remote_op);
        assert_eq!(s.remote_op, c.local_op);
        assert_eq!(s.state, ConflictState::ResolvedRemote);
        assert_eq!(s.swapped(), c);
    }

    #[test]
    fn serialized_state_is_tagged() {
        let mut c = conflict("x");
        c.resolve_custom("mine");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["path"], json!(["x"]));
        assert_eq!(json["state"], json!({"state": "resolved_custom", "value": "mine"}));
        assert_eq!(json["remote_op"], json!({"op": "remove", "key": "x"}));
        let back: Conflict = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn display_names_path_and_kinds() {
        assert_eq!(conflict("x").to_string(), "'/x': local replace vs remote remove");
    }
}
