//! Sequence alignment: a shortest edit script between two sequences.
//!
//! Runs the linear-space Myers implementation from `similar`. Elements are
//! compared through a caller-supplied predicate, so the same aligner serves
//! strict equality (lines, scalars) and similarity-based matching
//! (containers). The predicate reaches `similar` through a pair of element
//! wrappers whose `PartialEq` calls it.

use std::hash::Hash;
use std::marker::PhantomData;

use similar::algorithms::{myers, Capture};
use similar::{capture_diff_slices, Algorithm, DiffOp};

/// One step of an edit script.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edit {
    /// `old[old]` is matched with `new[new]`.
    Keep { old: usize, new: usize },
    /// `old[old]` has no counterpart.
    Delete { old: usize },
    /// `new[new]` has no counterpart.
    Insert { new: usize },
}

/// An element of the old sequence.
struct Left<'a, T>(&'a T);

/// An element of the new sequence, carrying the match predicate.
struct Right<'a, T, U, F> {
    item: &'a U,
    matches: &'a F,
    _old: PhantomData<fn(&T)>,
}

impl<T, U, F> PartialEq<Left<'_, T>> for Right<'_, T, U, F>
where
    F: Fn(&T, &U) -> bool,
{
    fn eq(&self, other: &Left<'_, T>) -> bool {
        (self.matches)(other.0, self.item)
    }
}

/// Compute a minimal edit script turning `old` into `new`.
///
/// `matches` decides whether two elements may be aligned. The script lists
/// every element of both sequences exactly once, in order.
pub fn align<T, U, F>(old: &[T], new: &[U], matches: F) -> Vec<Edit>
where
    F: Fn(&T, &U) -> bool,
{
    let left: Vec<Left<'_, T>> = old.iter().map(Left).collect();
    let right: Vec<Right<'_, T, U, F>> = new
        .iter()
        .map(|item| Right {
            item,
            matches: &matches,
            _old: PhantomData,
        })
        .collect();

    let mut capture = Capture::new();
    match myers::diff(&mut capture, &left, 0..left.len(), &right, 0..right.len()) {
        Ok(()) => {}
        Err(never) => match never {},
    }
    expand(capture.into_ops(), old.len() + new.len())
}

/// [`align`] under plain equality.
pub fn align_equal<T>(old: &[T], new: &[T]) -> Vec<Edit>
where
    T: Hash + Eq + Ord,
{
    expand(
        capture_diff_slices(Algorithm::Myers, old, new),
        old.len() + new.len(),
    )
}

/// Number of aligned pairs in a minimal edit script.
pub fn common_len<T, U, F>(old: &[T], new: &[U], matches: F) -> usize
where
    F: Fn(&T, &U) -> bool,
{
    align(old, new, matches)
        .iter()
        .filter(|e| matches!(e, Edit::Keep { .. }))
        .count()
}

/// Flatten `similar`'s range ops into one edit per element.
fn expand(ops: Vec<DiffOp>, capacity: usize) -> Vec<Edit> {
    let mut edits = Vec::with_capacity(capacity);
    for op in ops {
        match op {
            DiffOp::Equal {
                old_index,
                new_index,
                len,
            } => edits.extend((0..len).map(|i| Edit::Keep {
                old: old_index + i,
                new: new_index + i,
            })),
            DiffOp::Delete {
                old_index, old_len, ..
            } => edits.extend((old_index..old_index + old_len).map(|old| Edit::Delete { old })),
            DiffOp::Insert {
                new_index, new_len, ..
            } => edits.extend((new_index..new_index + new_len).map(|new| Edit::Insert { new })),
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                edits.extend((old_index..old_index + old_len).map(|old| Edit::Delete { old }));
                edits.extend((new_index..new_index + new_len).map(|new| Edit::Insert { new }));
            }
        }
    }
    edits
}
