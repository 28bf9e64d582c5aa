//! Multi-line strings viewed as sequences of lines.
//!
//! Lines keep their terminators so that joining them reproduces the
//! original text byte for byte.

use arbor_types::Value;

/// Returns `true` if `s` spans more than one line.
pub fn is_multiline(s: &str) -> bool {
    s.trim_end_matches('\n').contains('\n')
}

/// Split `s` into lines, each keeping its trailing `\n`.
pub fn split_lines(s: &str) -> Vec<&str> {
    s.split_inclusive('\n').collect()
}

/// Split `s` into line values for sequence-level diffing.
pub fn line_values(s: &str) -> Vec<Value> {
    split_lines(s).into_iter().map(Value::from).collect()
}

/// Join line values back into a single string.
///
/// Returns `None` if any element is not a string.
pub fn join_lines(lines: &[Value]) -> Option<String> {
    lines.iter().map(Value::as_str).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiline_detection() {
        assert!(!is_multiline("one line"));
        assert!(!is_multiline("one line\n"));
        assert!(is_multiline("a\nb"));
        assert!(is_multiline("a\nb\n"));
    }

    #[test]
    fn split_keeps_terminators() {
        assert_eq!(split_lines("a\nb\nc"), vec!["a\n", "b\n", "c"]);
        assert_eq!(split_lines("a\n"), vec!["a\n"]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn join_inverts_split() {
        for text in ["", "x", "a\nb\n", "a\n\n\nb", "\n"] {
            assert_eq!(join_lines(&line_values(text)).as_deref(), Some(text));
        }
    }

    #[test]
    fn join_rejects_non_strings() {
        assert_eq!(join_lines(&[Value::from("a\n"), Value::Null]), None);
    }
}
