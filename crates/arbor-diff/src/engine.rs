//! The diff engine: walks two values in parallel and emits a composed diff.
//!
//! Containers are visited from an explicit work-list instead of by
//! recursion, so deeply nested documents do not grow the call stack. Each
//! frame diffs one container pair; a child that survives structurally gets a
//! `Patch` op with an empty placeholder and its own frame. Frames are created
//! after their parents, so filling placeholders from the last frame to the
//! first assembles the nested diff bottom-up.

use arbor_types::{Mapping, Path, Value};
use tracing::{debug, trace};

use crate::align::{align, align_equal, Edit};
use crate::config::DiffConfig;
use crate::error::DiffResult;
use crate::lines::split_lines;
use crate::ops::{Diff, DiffOp, Key};
use crate::similarity::{equivalent, is_alignable};

/// Computes diffs under a validated [`DiffConfig`].
#[derive(Clone, Debug, Default)]
pub struct Differ {
    config: DiffConfig,
}

/// A container pair waiting to be diffed.
struct Frame<'a> {
    old: &'a Value,
    new: &'a Value,
    path: Path,
    /// Frame index and op slot of the `Patch` placeholder this frame fills.
    parent: Option<(usize, usize)>,
    ops: Vec<DiffOp>,
}

/// A child pair discovered while diffing a container.
struct ChildJob<'a> {
    slot: usize,
    old: &'a Value,
    new: &'a Value,
    path: Path,
}

impl Differ {
    /// Create a differ, rejecting out-of-domain configuration.
    pub fn new(config: DiffConfig) -> DiffResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    /// Compute the diff turning `old` into `new`.
    ///
    /// Never fails: values that cannot be diffed structurally are replaced.
    /// Applying the result to `old` yields `new`, up to ignored keys.
    pub fn diff(&self, old: &Value, new: &Value) -> Diff {
        let root = Path::root();
        if equivalent(old, new, &root, &self.config) {
            return Diff::new();
        }
        if !self.diffs_structurally(old, new) {
            debug!(old = %old.kind(), new = %new.kind(), "root replaced");
            return Diff::replace_root(new.clone());
        }

        let mut frames = vec![Frame {
            old,
            new,
            path: root,
            parent: None,
            ops: Vec::new(),
        }];

        let mut next = 0;
        while next < frames.len() {
            let frame = &frames[next];
            let (ops, children) = self.diff_container(frame.old, frame.new, &frame.path);
            trace!(path = %frames[next].path, ops = ops.len(), "container diffed");
            frames[next].ops = ops;
            for child in children {
                frames.push(Frame {
                    old: child.old,
                    new: child.new,
                    path: child.path,
                    parent: Some((next, child.slot)),
                    ops: Vec::new(),
                });
            }
            next += 1;
        }

        let containers = frames.len();
        while frames.len() > 1 {
            let Some(frame) = frames.pop() else { break };
            let Some((parent, slot)) = frame.parent else { continue };
            if let Some(DiffOp::Patch { diff, .. }) = frames[parent].ops.get_mut(slot) {
                *diff = Diff::from_ops(frame.ops);
            }
        }

        let diff = Diff::from_ops(frames.pop().map(|f| f.ops).unwrap_or_default());
        debug!(containers, ops = diff.len(), "diff computed");
        diff
    }

    fn diffs_structurally(&self, old: &Value, new: &Value) -> bool {
        match (old, new) {
            (Value::Mapping(_), Value::Mapping(_)) | (Value::Sequence(_), Value::Sequence(_)) => true,
            (Value::String(_), Value::String(_)) => {
                is_alignable(old, new, &Path::root(), &self.config)
            }
            _ => false,
        }
    }

    fn diff_container<'a>(
        &self,
        old: &'a Value,
        new: &'a Value,
        path: &Path,
    ) -> (Vec<DiffOp>, Vec<ChildJob<'a>>) {
        match (old, new) {
            (Value::Mapping(a), Value::Mapping(b)) => self.diff_mappings(a, b, path),
            (Value::Sequence(a), Value::Sequence(b)) => self.diff_sequences(a, b, path),
            (Value::String(a), Value::String(b)) => (diff_lines(a, b), Vec::new()),
            _ => (Vec::new(), Vec::new()),
        }
    }

    fn diff_mappings<'a>(
        &self,
        old: &'a Mapping,
        new: &'a Mapping,
        path: &Path,
    ) -> (Vec<DiffOp>, Vec<ChildJob<'a>>) {
        let mut ops = Vec::new();
        let mut children = Vec::new();

        for (key, old_value) in old.iter() {
            if self.config.is_ignored(path, key) {
                continue;
            }
            let Some(new_value) = new.get(key) else {
                ops.push(DiffOp::remove(key));
                continue;
            };
            let child_path = path.child(key);
            if equivalent(old_value, new_value, &child_path, &self.config) {
                continue;
            }
            if is_alignable(old_value, new_value, &child_path, &self.config) {
                trace!(path = %child_path, "patching child");
                children.push(ChildJob {
                    slot: ops.len(),
                    old: old_value,
                    new: new_value,
                    path: child_path,
                });
                ops.push(DiffOp::patch(key, Diff::new()));
            } else {
                trace!(path = %child_path, "replacing child");
                ops.push(DiffOp::replace(key, new_value.clone()));
            }
        }

        for (key, new_value) in new.iter() {
            if !old.contains_key(key) && !self.config.is_ignored(path, key) {
                ops.push(DiffOp::add(key, new_value.clone()));
            }
        }

        (ops, children)
    }

    fn diff_sequences<'a>(
        &self,
        old: &'a [Value],
        new: &'a [Value],
        path: &Path,
    ) -> (Vec<DiffOp>, Vec<ChildJob<'a>>) {
        let old_idx: Vec<usize> = (0..old.len()).collect();
        let new_idx: Vec<usize> = (0..new.len()).collect();
        let edits = align(&old_idx, &new_idx, |&i, &j| {
            is_alignable(&old[i], &new[j], &path.child(i), &self.config)
        });

        let mut children = Vec::new();
        let ops = emit_sequence_ops(&edits, |j| new[j].clone(), |i, j, ops| {
            let child_path = path.child(i);
            if !equivalent(&old[i], &new[j], &child_path, &self.config) {
                children.push(ChildJob {
                    slot: ops.len(),
                    old: &old[i],
                    new: &new[j],
                    path: child_path,
                });
                ops.push(DiffOp::patch(i, Diff::new()));
            }
        });
        (ops, children)
    }
}

/// Line-level diff of two strings, as index-addressed ops over lines.
fn diff_lines(old: &str, new: &str) -> Vec<DiffOp> {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    let edits = align_equal(&old_lines, &new_lines);
    emit_sequence_ops(&edits, |j| Value::from(new_lines[j]), |_, _, _| {})
}

/// Turn an edit script into sequence ops.
///
/// Each run of unmatched elements between two matches pairs its deletions
/// with its insertions as `Replace`s; leftover deletions become `Remove`s
/// and leftover insertions become `Add`s at the gap after the run.
fn emit_sequence_ops(
    edits: &[Edit],
    new_value: impl Fn(usize) -> Value,
    mut on_match: impl FnMut(usize, usize, &mut Vec<DiffOp>),
) -> Vec<DiffOp> {
    let mut ops = Vec::new();
    let mut deleted: Vec<usize> = Vec::new();
    let mut inserted: Vec<usize> = Vec::new();
    let mut next_old = 0;

    let flush = |ops: &mut Vec<DiffOp>,
                 deleted: &mut Vec<usize>,
                 inserted: &mut Vec<usize>,
                 gap: usize| {
        let paired = deleted.len().min(inserted.len());
        for (&i, &j) in deleted.iter().zip(inserted.iter()) {
            ops.push(DiffOp::replace(i, new_value(j)));
        }
        for &i in &deleted[paired..] {
            ops.push(DiffOp::remove(i));
        }
        for &j in &inserted[paired..] {
            ops.push(DiffOp::Add {
                key: Key::Index(gap),
                value: new_value(j),
            });
        }
        deleted.clear();
        inserted.clear();
    };

    for edit in edits {
        match *edit {
            Edit::Delete { old } => {
                deleted.push(old);
                next_old = old + 1;
            }
            Edit::Insert { new } => inserted.push(new),
            Edit::Keep { old, new } => {
                flush(&mut ops, &mut deleted, &mut inserted, next_old);
                on_match(old, new, &mut ops);
                next_old = old + 1;
            }
        }
    }
    flush(&mut ops, &mut deleted, &mut inserted, next_old);
    ops
}

/// Diff two values under the default configuration.
pub fn diff(old: &Value, new: &Value) -> Diff {
    Differ::default().diff(old, new)
}
