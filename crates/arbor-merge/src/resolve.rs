//! Materializing a merge once its conflicts are decided.
//!
//! Conflicting addresses are named in base coordinates, while `merged` may
//! have shifted sequence elements around them. Each decision is therefore
//! turned into an op and spliced into the auto-merged diff, which is then
//! re-applied to the base.

use arbor_diff::{apply, Diff, DiffOp, Key, OpKind};
use arbor_types::{PathStep, Value};
use tracing::debug;

use crate::conflict::{Conflict, ConflictState, MergeResult};
use crate::error::{MergeError, ResolveResult};

/// Build the final document from a merge whose conflicts are all resolved.
///
/// Fails with [`MergeError::UnresolvedConflict`] naming the first conflict,
/// in pre-order, that is still [`ConflictState::Unresolved`].
pub fn apply_resolutions(result: &MergeResult) -> ResolveResult<Value> {
    if let Some(open) = result.conflicts.iter().find(|c| !c.is_resolved()) {
        return Err(MergeError::UnresolvedConflict {
            path: open.path.clone(),
        });
    }

    let diff = resolved_diff(result);
    debug!(
        conflicts = result.conflicts.len(),
        ops = diff.len(),
        "resolutions applied"
    );
    Ok(apply(&diff, &result.base)?)
}

/// The diff taking the base to the resolved document.
fn resolved_diff(result: &MergeResult) -> Diff {
    if let Some(root) = result.conflicts.iter().find(|c| c.path.is_root()) {
        return root_resolution(root);
    }

    let mut diff = result.diff.clone();
    for conflict in &result.conflicts {
        let Some((last, parents)) = conflict.path.steps().split_last() else {
            continue;
        };
        let Some(op) = resolution_op(conflict, last) else {
            continue;
        };
        if let Some(container) = container_mut(&mut diff, parents) {
            install(container, op);
        }
    }
    diff.normalized()
}

/// The whole-document diff chosen for a conflict at the root.
fn root_resolution(conflict: &Conflict) -> Diff {
    let side = |op: &DiffOp| match op {
        DiffOp::Patch { diff, .. } => diff.clone(),
        other => Diff::from_ops(vec![other.clone()]),
    };
    match &conflict.state {
        ConflictState::ResolvedLocal => side(&conflict.local_op),
        ConflictState::ResolvedRemote => side(&conflict.remote_op),
        ConflictState::ResolvedCustom(value) => Diff::replace_root(value.clone()),
        ConflictState::ResolvedBase | ConflictState::Unresolved => Diff::new(),
    }
}

/// The op installing a conflict's decision, or `None` to keep the base.
fn resolution_op(conflict: &Conflict, last: &PathStep) -> Option<DiffOp> {
    match &conflict.state {
        ConflictState::ResolvedLocal => Some(conflict.local_op.clone()),
        ConflictState::ResolvedRemote => Some(conflict.remote_op.clone()),
        ConflictState::ResolvedCustom(value) => {
            let key = Key::from(last.clone());
            // Both sides adding means the address is absent from the base.
            let op = if conflict.local_op.kind() == OpKind::Add
                && conflict.remote_op.kind() == OpKind::Add
            {
                DiffOp::Add {
                    key,
                    value: value.clone(),
                }
            } else {
                DiffOp::Replace {
                    key,
                    value: value.clone(),
                }
            };
            Some(op)
        }
        ConflictState::ResolvedBase | ConflictState::Unresolved => None,
    }
}

/// The nested diff at `steps`, creating empty `Patch` ops along the way.
fn container_mut<'d>(mut diff: &'d mut Diff, steps: &[PathStep]) -> Option<&'d mut Diff> {
    for step in steps {
        let key = Key::from(step.clone());
        let ops = diff.ops_mut();
        if !ops
            .iter()
            .any(|op| op.kind() == OpKind::Patch && *op.key() == key)
        {
            ops.push(DiffOp::patch(key.clone(), Diff::new()));
        }
        diff = ops.iter_mut().find_map(|op| match op {
            DiffOp::Patch { key: k, diff: nested } if *k == key => Some(nested),
            _ => None,
        })?;
    }
    Some(diff)
}

/// Add `op` to a container diff.
///
/// Identical ops are kept once. A mapping entry or a sequence element takes
/// the last op installed for it; insertions into a gap accumulate.
fn install(diff: &mut Diff, op: DiffOp) {
    let ops = diff.ops_mut();
    if ops.contains(&op) {
        return;
    }
    let existing = match op.key() {
        Key::Field(_) => ops.iter().position(|o| o.key() == op.key()),
        Key::Index(_) if op.addresses_existing() => ops
            .iter()
            .position(|o| o.key() == op.key() && o.addresses_existing()),
        _ => None,
    };
    match existing {
        Some(pos) => ops[pos] = op,
        None => ops.push(op),
    }
}
