//! Similarity scoring: how much two values look like versions of each other.
//!
//! Every "is this the same element, modified?" decision in the engine goes
//! through [`is_alignable`], which compares a [`similarity`] score against the
//! configured thresholds. Scores lie in `[0, 1]`; equal values score `1` and
//! values of different kinds score `0`.

use arbor_types::{Mapping, Path, Value};
use similar::TextDiff;

use crate::align::common_len;
use crate::config::DiffConfig;
use crate::lines::is_multiline;

/// Similarity of two values at the document root.
///
/// - mappings: `(shared + shared_equal) / (2 · union)` over non-ignored keys
/// - sequences: `2 · aligned / (n + m)` with strict element matching
/// - strings: character ratio, or line ratio when either spans lines
/// - other scalars: `1` if equal, else `0`
pub fn similarity(a: &Value, b: &Value, config: &DiffConfig) -> f64 {
    score(a, b, &Path::root(), config)
}

pub(crate) fn score(a: &Value, b: &Value, path: &Path, config: &DiffConfig) -> f64 {
    match (a, b) {
        (Value::Mapping(ma), Value::Mapping(mb)) => mapping_score(ma, mb, path, config),
        (Value::Sequence(sa), Value::Sequence(sb)) => {
            if sa.is_empty() && sb.is_empty() {
                return 1.0;
            }
            let common = common_len(sa, sb, |x, y| equivalent(x, y, path, config));
            (2 * common) as f64 / (sa.len() + sb.len()) as f64
        }
        (Value::String(sa), Value::String(sb)) => string_score(sa, sb),
        _ if a == b => 1.0,
        _ => 0.0,
    }
}

fn mapping_score(a: &Mapping, b: &Mapping, path: &Path, config: &DiffConfig) -> f64 {
    let mut union = 0usize;
    let mut shared = 0usize;
    let mut shared_equal = 0usize;

    for (key, va) in a.iter() {
        if config.is_ignored(path, key) {
            continue;
        }
        union += 1;
        if let Some(vb) = b.get(key) {
            shared += 1;
            if equivalent(va, vb, &path.child(key), config) {
                shared_equal += 1;
            }
        }
    }
    union += b
        .keys()
        .filter(|k| !a.contains_key(k) && !config.is_ignored(path, k))
        .count();

    if union == 0 {
        return 1.0;
    }
    (shared + shared_equal) as f64 / (2 * union) as f64
}

fn string_score(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let ratio = if is_multiline(a) || is_multiline(b) {
        TextDiff::from_lines(a, b).ratio()
    } else {
        TextDiff::from_chars(a, b).ratio()
    };
    f64::from(ratio)
}

/// Structural equality that skips ignored mapping keys.
pub(crate) fn equivalent(a: &Value, b: &Value, path: &Path, config: &DiffConfig) -> bool {
    if config.ignored_keys.is_empty() && config.key_filter.is_none() {
        return a == b;
    }

    let mut stack = vec![(a, b, path.clone())];
    while let Some((a, b, path)) = stack.pop() {
        match (a, b) {
            (Value::Mapping(ma), Value::Mapping(mb)) => {
                let visible = |m: &Mapping| {
                    m.keys().filter(|k| !config.is_ignored(&path, k)).count()
                };
                if visible(ma) != visible(mb) {
                    return false;
                }
                for (key, va) in ma.iter() {
                    if config.is_ignored(&path, key) {
                        continue;
                    }
                    match mb.get(key) {
                        Some(vb) => stack.push((va, vb, path.child(key))),
                        None => return false,
                    }
                }
            }
            (Value::Sequence(sa), Value::Sequence(sb)) => {
                if sa.len() != sb.len() {
                    return false;
                }
                for (i, (va, vb)) in sa.iter().zip(sb).enumerate() {
                    stack.push((va, vb, path.child(i)));
                }
            }
            _ => {
                if a != b {
                    return false;
                }
            }
        }
    }
    true
}

/// Decide whether two values are the same element (possibly modified).
///
/// Equivalent values always align. Two mappings or two sequences align when
/// their score reaches `container_threshold`; two strings align, when line
/// diffing is enabled and either spans lines, when their score reaches
/// `string_threshold`. Nothing else aligns.
pub(crate) fn is_alignable(a: &Value, b: &Value, path: &Path, config: &DiffConfig) -> bool {
    if equivalent(a, b, path, config) {
        return true;
    }
    match (a, b) {
        (Value::Mapping(_), Value::Mapping(_)) | (Value::Sequence(_), Value::Sequence(_)) => {
            score(a, b, path, config) >= config.container_threshold
        }
        (Value::String(sa), Value::String(sb)) => {
            is_line_diffable(sa, sb, config) && string_score(sa, sb) >= config.string_threshold
        }
        _ => false,
    }
}

fn is_line_diffable(a: &str, b: &str, config: &DiffConfig) -> bool {
    config.line_diff_strings && (is_multiline(a) || is_multiline(b))
}
