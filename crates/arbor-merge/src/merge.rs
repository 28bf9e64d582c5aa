//! Three-way merge of two diffs computed against the same base.
//!
//! Both diffs are walked per container, address by address. An address
//! touched by one side takes that side's op; identical ops on both sides
//! apply once; two `Patch` ops on the same container descend into it; any
//! other disagreement becomes a [`Conflict`] and the address keeps its base
//! value. Like the diff engine, the walk runs from an explicit work-list so
//! deep documents do not grow the call stack.
//!
//! # Sequences
//!
//! Insertions into the same gap from both sides are kept, local first;
//! identical insertion blocks are kept once. An insertion into gap `g`
//! while the other side removes both `g - 1` and `g` lands inside a deleted
//! run: each inserted element conflicts with the removal of element `g`,
//! and that removal is held back until the conflict is resolved.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use arbor_diff::{apply, Diff, DiffOp, Differ, Key, OpKind};
use arbor_types::{Mapping, Path, Value};
use tracing::{debug, trace, warn};

use crate::conflict::{Conflict, MergeResult};

/// Merge `local` and `remote`, both diffs against `base`.
///
/// Never fails. Diffs that do not fit `base` cannot be reconciled address
/// by address; they produce a single conflict at the root.
pub fn merge(base: &Value, local: &Diff, remote: &Diff) -> MergeResult {
    let (diff, mut conflicts) = merge_diffs(base, local, remote);

    match apply(&diff, base) {
        Ok(merged) => {
            conflicts.sort_by(|a, b| a.path.cmp(&b.path));
            debug!(
                ops = diff.len(),
                conflicts = conflicts.len(),
                "merge computed"
            );
            MergeResult {
                merged,
                conflicts,
                base: base.clone(),
                diff,
            }
        }
        Err(err) => {
            warn!(error = %err, "merged diff does not fit the base; conflicting at the root");
            MergeResult {
                merged: base.clone(),
                conflicts: vec![root_conflict(local, remote)],
                base: base.clone(),
                diff: Diff::new(),
            }
        }
    }
}

/// Diff both documents against `base` with `differ`, then merge.
pub fn merge_values(base: &Value, local: &Value, remote: &Value, differ: &Differ) -> MergeResult {
    let local_diff = differ.diff(base, local);
    let remote_diff = differ.diff(base, remote);
    merge(base, &local_diff, &remote_diff)
}

fn merge_diffs(base: &Value, local: &Diff, remote: &Diff) -> (Diff, Vec<Conflict>) {
    if local == remote || remote.is_empty() {
        return (local.clone(), Vec::new());
    }
    if local.is_empty() {
        return (remote.clone(), Vec::new());
    }
    let structural = local.root_replacement().is_none() && remote.root_replacement().is_none();
    if !structural || !is_mergeable(base) {
        trace!("root conflict");
        return (Diff::new(), vec![root_conflict(local, remote)]);
    }
    merge_containers(base, local, remote)
}

/// Both whole diffs as competing ops on the document root.
fn root_conflict(local: &Diff, remote: &Diff) -> Conflict {
    Conflict::new(Path::root(), root_op(local), root_op(remote))
}

fn root_op(diff: &Diff) -> DiffOp {
    match diff.root_replacement() {
        Some(value) => DiffOp::Replace {
            key: Key::Root,
            value: value.clone(),
        },
        None => DiffOp::Patch {
            key: Key::Root,
            diff: diff.clone(),
        },
    }
}

/// Values a pair of `Patch` ops can be merged inside.
fn is_mergeable(value: &Value) -> bool {
    matches!(
        value,
        Value::Mapping(_) | Value::Sequence(_) | Value::String(_)
    )
}

/// A container whose two diffs are waiting to be merged.
struct Frame<'a> {
    base: &'a Value,
    local: &'a Diff,
    remote: &'a Diff,
    path: Path,
    /// Frame index and op slot of the `Patch` placeholder this frame fills.
    parent: Option<(usize, usize)>,
    ops: Vec<DiffOp>,
}

/// A child both sides patched, discovered while merging a container.
struct ChildJob<'a> {
    slot: usize,
    base: &'a Value,
    local: &'a Diff,
    remote: &'a Diff,
    path: Path,
}

/// Output of merging one container level.
struct Level<'a> {
    path: Path,
    ops: Vec<DiffOp>,
    children: Vec<ChildJob<'a>>,
    conflicts: Vec<Conflict>,
}

impl<'a> Level<'a> {
    fn new(path: Path) -> Self {
        Self {
            path,
            ops: Vec::new(),
            children: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    fn take(&mut self, op: &DiffOp) {
        self.ops.push(op.clone());
    }

    fn conflict(&mut self, path: Path, local: &DiffOp, remote: &DiffOp) {
        trace!(path = %path, local = %local.kind(), remote = %remote.kind(), "conflict");
        self.conflicts
            .push(Conflict::new(path, local.clone(), remote.clone()));
    }

    /// Both sides touched the same entry.
    ///
    /// `child` is the base entry, if it can be descended into.
    fn both(&mut self, path: Path, child: Option<&'a Value>, local: &'a DiffOp, remote: &'a DiffOp) {
        if local == remote {
            self.take(local);
            return;
        }
        if let (
            DiffOp::Patch { key, diff: l },
            DiffOp::Patch { diff: r, .. },
        ) = (local, remote)
        {
            if let Some(base) = child.filter(|v| is_mergeable(v)) {
                trace!(path = %path, "merging patched child");
                self.children.push(ChildJob {
                    slot: self.ops.len(),
                    base,
                    local: l,
                    remote: r,
                    path,
                });
                self.ops.push(DiffOp::patch(key.clone(), Diff::new()));
                return;
            }
        }
        self.conflict(path, local, remote);
    }
}

fn merge_containers(base: &Value, local: &Diff, remote: &Diff) -> (Diff, Vec<Conflict>) {
    let mut frames = vec![Frame {
        base,
        local,
        remote,
        path: Path::root(),
        parent: None,
        ops: Vec::new(),
    }];
    let mut conflicts = Vec::new();

    let mut next = 0;
    while next < frames.len() {
        let frame = &frames[next];
        let (ops, children, found) =
            merge_level(frame.base, frame.local, frame.remote, &frame.path);
        trace!(
            path = %frames[next].path,
            ops = ops.len(),
            conflicts = found.len(),
            "container merged"
        );
        conflicts.extend(found);
        frames[next].ops = ops;
        for child in children {
            frames.push(Frame {
                base: child.base,
                local: child.local,
                remote: child.remote,
                path: child.path,
                parent: Some((next, child.slot)),
                ops: Vec::new(),
            });
        }
        next += 1;
    }

    // Children sit after their parents, so every slot of a frame is filled
    // by the time the frame itself is popped.
    while frames.len() > 1 {
        let Some(mut frame) = frames.pop() else { break };
        prune_empty_patches(&mut frame.ops);
        let Some((parent, slot)) = frame.parent else { continue };
        if let Some(DiffOp::Patch { diff, .. }) = frames[parent].ops.get_mut(slot) {
            *diff = Diff::from_ops(frame.ops);
        }
    }

    let mut ops = frames.pop().map(|f| f.ops).unwrap_or_default();
    prune_empty_patches(&mut ops);
    (Diff::from_ops(ops).normalized(), conflicts)
}

/// Drop `Patch` placeholders whose merge produced nothing.
fn prune_empty_patches(ops: &mut Vec<DiffOp>) {
    ops.retain(|op| !matches!(op, DiffOp::Patch { diff, .. } if diff.is_empty()));
}

fn merge_level<'a>(
    base: &'a Value,
    local: &'a Diff,
    remote: &'a Diff,
    path: &Path,
) -> (Vec<DiffOp>, Vec<ChildJob<'a>>, Vec<Conflict>) {
    let mut level = Level::new(path.clone());
    match base {
        Value::Mapping(m) => merge_mapping(&mut level, m, local, remote),
        Value::Sequence(items) => {
            merge_sequence(&mut level, Some(items.as_slice()), local, remote)
        }
        // Lines are plain strings: two patches of one line conflict.
        Value::String(_) => merge_sequence(&mut level, None, local, remote),
        _ => {}
    }
    (level.ops, level.children, level.conflicts)
}

fn merge_mapping<'a>(level: &mut Level<'a>, base: &'a Mapping, local: &'a Diff, remote: &'a Diff) {
    let remote_ops: HashMap<&Key, &DiffOp> = remote.iter().map(|op| (op.key(), op)).collect();
    let local_keys: HashSet<&Key> = local.iter().map(DiffOp::key).collect();

    for op in local {
        match remote_ops.get(op.key()) {
            None => level.take(op),
            Some(&other) => {
                let child = match op.key() {
                    Key::Field(k) => base.get(k),
                    _ => None,
                };
                let path = child_path(&level.path, op.key());
                level.both(path, child, op, other);
            }
        }
    }
    for op in remote.iter().filter(|op| !local_keys.contains(op.key())) {
        level.take(op);
    }
}

/// One side's ops at a single sequence index.
#[derive(Default)]
struct Slot<'a> {
    /// Insertions into the gap before the element, in order.
    adds: Vec<&'a DiffOp>,
    /// The op on the element itself.
    element: Option<&'a DiffOp>,
}

/// Group a sequence diff by index. Ops that do not fit the grouping are
/// passed through untouched so the final application reports them.
fn slots<'a>(diff: &'a Diff, stray: &mut Vec<DiffOp>) -> BTreeMap<usize, Slot<'a>> {
    let mut slots: BTreeMap<usize, Slot<'a>> = BTreeMap::new();
    for op in diff {
        let Some(index) = op.key().index() else {
            stray.push(op.clone());
            continue;
        };
        let slot = slots.entry(index).or_default();
        if !op.addresses_existing() {
            slot.adds.push(op);
        } else if slot.element.is_none() {
            slot.element = Some(op);
        } else {
            stray.push(op.clone());
        }
    }
    slots
}

fn removes<'a>(slots: &BTreeMap<usize, Slot<'a>>, index: usize) -> Option<&'a DiffOp> {
    slots
        .get(&index)
        .and_then(|s| s.element)
        .filter(|op| op.kind() == OpKind::Remove)
}

/// The removal of element `gap` if both neighbours of the gap are removed.
fn deleted_run<'a>(slots: &BTreeMap<usize, Slot<'a>>, gap: usize) -> Option<&'a DiffOp> {
    let before = gap.checked_sub(1).and_then(|prev| removes(slots, prev));
    before.and_then(|_| removes(slots, gap))
}

fn merge_sequence<'a>(
    level: &mut Level<'a>,
    items: Option<&'a [Value]>,
    local: &'a Diff,
    remote: &'a Diff,
) {
    let mut stray = Vec::new();
    let local_slots = slots(local, &mut stray);
    let remote_slots = slots(remote, &mut stray);
    let indices: BTreeSet<usize> = local_slots
        .keys()
        .chain(remote_slots.keys())
        .copied()
        .collect();
    let empty = Slot::default();

    for index in indices {
        let l = local_slots.get(&index).unwrap_or(&empty);
        let r = remote_slots.get(&index).unwrap_or(&empty);
        let path = level.path.child(index);
        let mut held = false;

        if l.adds == r.adds {
            l.adds.iter().for_each(|op| level.take(op));
        } else {
            match deleted_run(&remote_slots, index) {
                Some(removal) if !l.adds.is_empty() => {
                    for add in &l.adds {
                        level.conflict(path.clone(), add, removal);
                    }
                    held = true;
                }
                _ => l.adds.iter().for_each(|op| level.take(op)),
            }
            match deleted_run(&local_slots, index) {
                Some(removal) if !r.adds.is_empty() => {
                    for add in &r.adds {
                        level.conflict(path.clone(), removal, add);
                    }
                    held = true;
                }
                _ => r.adds.iter().for_each(|op| level.take(op)),
            }
        }

        match (l.element, r.element) {
            // The removal of a run the other side inserted into waits for
            // the insertion conflicts to be resolved, even when both sides
            // remove it.
            (Some(a), Some(b)) if held && a != b => level.conflict(path, a, b),
            _ if held => {}
            (Some(a), Some(b)) if a == b => level.take(a),
            (Some(a), Some(b)) => {
                let child = items.and_then(|items| items.get(index));
                level.both(path, child, a, b);
            }
            (Some(op), None) | (None, Some(op)) => level.take(op),
            (None, None) => {}
        }
    }

    level.ops.extend(stray);
}

fn child_path(path: &Path, key: &Key) -> Path {
    match key.to_step() {
        Some(step) => path.child(step),
        None => path.clone(),
    }
}
