//! Patch application: rebuild the target value from a base and a diff.
//!
//! Application is pure; the base is never modified. Any op that does not fit
//! the value it addresses is rejected with [`DiffError::MalformedDiff`]
//! carrying the path of the offending container.

use std::collections::HashSet;

use arbor_types::{Mapping, Path, Value};

use crate::error::{DiffError, DiffResult};
use crate::lines::{join_lines, line_values};
use crate::ops::{Diff, DiffOp, Key};

/// Apply `diff` to `base`, producing a new value.
pub fn apply(diff: &Diff, base: &Value) -> DiffResult<Value> {
    apply_at(diff, base, &Path::root())
}

fn apply_at(diff: &Diff, base: &Value, path: &Path) -> DiffResult<Value> {
    if diff.is_empty() {
        return Ok(base.clone());
    }
    if let Some(value) = diff.root_replacement() {
        if path.is_root() {
            return Ok(value.clone());
        }
        return Err(DiffError::malformed(path, "root replacement below the root"));
    }

    match base {
        Value::Mapping(m) => apply_mapping(diff, m, path).map(Value::Mapping),
        Value::Sequence(items) => apply_sequence(diff, items, path).map(Value::Sequence),
        Value::String(s) => {
            let lines = apply_sequence(diff, &line_values(s), path)?;
            join_lines(&lines)
                .map(Value::String)
                .ok_or_else(|| DiffError::malformed(path, "line patch produced a non-string line"))
        }
        other => Err(DiffError::malformed(
            path,
            format!("cannot patch a {} value", other.kind()),
        )),
    }
}

fn apply_mapping(diff: &Diff, base: &Mapping, path: &Path) -> DiffResult<Mapping> {
    let mut out = base.clone();
    let mut seen = HashSet::new();

    for op in diff {
        let key = match op.key() {
            Key::Field(k) => k.as_str(),
            other => {
                return Err(DiffError::malformed(
                    path,
                    format!("expected a mapping key, got {other}"),
                ))
            }
        };
        if !seen.insert(key) {
            return Err(DiffError::malformed(path, format!("key {key:?} addressed twice")));
        }

        match op {
            DiffOp::Add { value, .. } => {
                if out.insert(key, value.clone()).is_some() {
                    return Err(DiffError::malformed(path, format!("key {key:?} already exists")));
                }
            }
            DiffOp::Remove { .. } => {
                if out.remove(key).is_none() {
                    return Err(missing_key(path, key));
                }
            }
            DiffOp::Replace { value, .. } => {
                if out.insert(key, value.clone()).is_none() {
                    return Err(missing_key(path, key));
                }
            }
            DiffOp::Patch { diff, .. } => {
                let child = out.get(key).ok_or_else(|| missing_key(path, key))?;
                let patched = apply_at(diff, child, &path.child(key))?;
                out.insert(key, patched);
            }
        }
    }
    Ok(out)
}

fn missing_key(path: &Path, key: &str) -> DiffError {
    DiffError::malformed(path, format!("key {key:?} does not exist"))
}

fn apply_sequence(diff: &Diff, base: &[Value], path: &Path) -> DiffResult<Vec<Value>> {
    let mut out = Vec::with_capacity(base.len() + diff.additions());
    // Number of base elements already copied or consumed.
    let mut next = 0;

    for op in diff {
        let index = op.key().index().ok_or_else(|| {
            DiffError::malformed(path, format!("expected a sequence index, got {}", op.key()))
        })?;
        if index < next {
            return Err(DiffError::malformed(
                path,
                format!("{} at index {index} is out of order", op.kind()),
            ));
        }
        let limit = if op.addresses_existing() { base.len() } else { base.len() + 1 };
        if index >= limit {
            return Err(DiffError::malformed(
                path,
                format!("index {index} out of range for length {}", base.len()),
            ));
        }

        out.extend_from_slice(&base[next..index]);
        next = index;

        match op {
            DiffOp::Add { value, .. } => out.push(value.clone()),
            DiffOp::Remove { .. } => next += 1,
            DiffOp::Replace { value, .. } => {
                out.push(value.clone());
                next += 1;
            }
            DiffOp::Patch { diff, .. } => {
                out.push(apply_at(diff, &base[index], &path.child(index))?);
                next += 1;
            }
        }
    }

    out.extend_from_slice(&base[next..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn malformed_path(result: DiffResult<Value>) -> String {
        match result {
            Err(DiffError::MalformedDiff { path, .. }) => path.to_string(),
            other => panic!("expected MalformedDiff, got {other:?}"),
        }
    }

    #[test]
    fn empty_diff_is_identity() {
        let base = v(json!({"a": [1, 2]}));
        assert_eq!(apply(&Diff::new(), &base).unwrap(), base);
    }

    #[test]
    fn base_is_untouched() {
        let base = v(json!({"a": 1}));
        let diff = Diff::from_ops(vec![DiffOp::replace("a", v(json!(2)))]);
        let out = apply(&diff, &base).unwrap();
        assert_eq!(out, v(json!({"a": 2})));
        assert_eq!(base, v(json!({"a": 1})));
    }

    #[test]
    fn mapping_ops() {
        let base = v(json!({"keep": 1, "gone": 2, "change": 3, "nested": {"x": 1}}));
        let diff = Diff::from_ops(vec![
            DiffOp::remove("gone"),
            DiffOp::replace("change", v(json!("three"))),
            DiffOp::patch("nested", Diff::from_ops(vec![DiffOp::add("y", v(json!(2)))])),
            DiffOp::add("new", v(json!(4))),
        ]);
        let out = apply(&diff, &base).unwrap();
        assert_eq!(
            out,
            v(json!({"keep": 1, "change": "three", "nested": {"x": 1, "y": 2}, "new": 4}))
        );
    }

    #[test]
    fn mapping_keeps_base_order_and_appends() {
        let base = v(json!({"b": 1, "a": 2}));
        let diff = Diff::from_ops(vec![DiffOp::add("c", v(json!(3))), DiffOp::replace("b", v(json!(0)))]);
        let out = apply(&diff, &base).unwrap();
        let keys: Vec<_> = out.as_mapping().unwrap().keys().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn sequence_ops_use_original_indices() {
        let base = v(json!(["a", "b", "c", "d"]));
        let diff = Diff::from_ops(vec![
            DiffOp::add(0usize, v(json!("start"))),
            DiffOp::remove(1usize),
            DiffOp::add(2usize, v(json!("x"))),
            DiffOp::add(2usize, v(json!("y"))),
            DiffOp::replace(2usize, v(json!("C"))),
            DiffOp::add(4usize, v(json!("end"))),
        ]);
        let out = apply(&diff, &base).unwrap();
        assert_eq!(out, v(json!(["start", "a", "x", "y", "C", "d", "end"])));
    }

    #[test]
    fn string_patch_applies_to_lines() {
        let base = v(json!("one\ntwo\nthree\n"));
        let diff = Diff::from_ops(vec![
            DiffOp::replace(1usize, v(json!("TWO\n"))),
            DiffOp::add(3usize, v(json!("four\n"))),
        ]);
        assert_eq!(apply(&diff, &base).unwrap(), v(json!("one\nTWO\nthree\nfour\n")));
    }

    #[test]
    fn root_replacement() {
        let diff = Diff::replace_root(v(json!("whole")));
        assert_eq!(apply(&diff, &v(json!([1, 2]))).unwrap(), v(json!("whole")));
    }

    #[test]
    fn remove_missing_key_is_malformed() {
        let diff = Diff::from_ops(vec![DiffOp::remove("nope")]);
        assert_eq!(malformed_path(apply(&diff, &v(json!({"a": 1})))), "");
    }

    #[test]
    fn add_existing_key_is_malformed() {
        let diff = Diff::from_ops(vec![DiffOp::add("a", v(json!(2)))]);
        assert!(apply(&diff, &v(json!({"a": 1}))).is_err());
    }

    #[test]
    fn patch_on_scalar_is_malformed() {
        let diff = Diff::from_ops(vec![DiffOp::patch(
            "n",
            Diff::from_ops(vec![DiffOp::remove("x")]),
        )]);
        assert_eq!(malformed_path(apply(&diff, &v(json!({"n": 5})))), "/n");
    }

    #[test]
    fn index_key_on_mapping_is_malformed() {
        let diff = Diff::from_ops(vec![DiffOp::remove(0usize)]);
        assert!(apply(&diff, &v(json!({"a": 1}))).is_err());
    }

    #[test]
    fn out_of_range_index_is_malformed() {
        let diff = Diff::from_ops(vec![DiffOp::remove(3usize)]);
        assert!(apply(&diff, &v(json!([1, 2, 3]))).is_err());
        let diff = Diff::from_ops(vec![DiffOp::add(4usize, v(json!(0)))]);
        assert!(apply(&diff, &v(json!([1, 2, 3]))).is_err());
        let diff = Diff::from_ops(vec![DiffOp::add(3usize, v(json!(0)))]);
        assert!(apply(&diff, &v(json!([1, 2, 3]))).is_ok());
    }

    #[test]
    fn duplicate_addressing_is_malformed() {
        let diff = Diff::from_ops(vec![DiffOp::remove(1usize), DiffOp::replace(1usize, v(json!(0)))]);
        assert!(apply(&diff, &v(json!([1, 2, 3]))).is_err());
        let diff = Diff::from_ops(vec![DiffOp::remove("a"), DiffOp::add("a", v(json!(0)))]);
        assert!(apply(&diff, &v(json!({"a": 1}))).is_err());
    }

    #[test]
    fn add_after_element_op_at_same_index_is_malformed() {
        let diff = Diff::from_ops(vec![DiffOp::remove(1usize), DiffOp::add(1usize, v(json!(0)))]);
        assert!(apply(&diff, &v(json!([1, 2, 3]))).is_err());
    }

    #[test]
    fn nested_root_replacement_is_malformed() {
        let diff = Diff::from_ops(vec![DiffOp::patch("a", Diff::replace_root(v(json!(1))))]);
        assert_eq!(malformed_path(apply(&diff, &v(json!({"a": {"b": 1}})))), "/a");
    }
}
