//! Ordered mapping with unique string keys.
//!
//! Entries keep their insertion order so documents are emitted stably, but
//! equality only looks at membership: two mappings are equal when they hold
//! the same keys bound to equal values, whatever the order.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::value::Value;

/// An insertion-ordered map from string keys to [`Value`]s.
#[derive(Clone, Default)]
pub struct Mapping {
    entries: IndexMap<String, Value>,
}

impl Mapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mapping with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the mapping has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the value bound to `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Returns `true` if `key` is bound.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Bind `key` to `value`.
    ///
    /// An existing binding is replaced in place, keeping its position, and
    /// the previous value is returned. New keys are appended.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    /// Remove the binding for `key`, preserving the order of the rest.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    /// Iterate over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate over values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values()
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl PartialEq for Mapping {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|ov| ov == v))
    }
}

impl Eq for Mapping {}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut mapping = Mapping::new();
        for (k, v) in iter {
            mapping.insert(k, v);
        }
        mapping
    }
}

impl IntoIterator for Mapping {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Mapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Mapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MappingVisitor;

        impl<'de> Visitor<'de> for MappingVisitor {
            type Value = Mapping;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map with string keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Mapping, A::Error> {
                let mut mapping = Mapping::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, Value>()? {
                    mapping.insert(k, v);
                }
                Ok(mapping)
            }
        }

        deserializer.deserialize_map(MappingVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: i64) -> Value {
        Value::Number(n.into())
    }

    #[test]
    fn insert_appends_new_keys() {
        let mut m = Mapping::new();
        m.insert("b", num(1));
        m.insert("a", num(2));
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut m: Mapping = [("a", num(1)), ("b", num(2))].into_iter().collect();
        let old = m.insert("a", num(9));
        assert_eq!(old, Some(num(1)));
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(m.get("a"), Some(&num(9)));
    }

    #[test]
    fn remove_keeps_order_of_rest() {
        let mut m: Mapping = [("a", num(1)), ("b", num(2)), ("c", num(3))]
            .into_iter()
            .collect();
        assert_eq!(m.remove("b"), Some(num(2)));
        assert_eq!(m.remove("zzz"), None);
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn large_mapping_lookups_and_removals() {
        let n = 50_000;
        let mut m: Mapping = (0..n).map(|i| (format!("k{i}"), num(i))).collect();
        assert_eq!(m.len(), n as usize);
        for i in 0..n {
            assert_eq!(m.get(&format!("k{i}")), Some(&num(i)));
        }
        for i in (0..n).step_by(2) {
            assert_eq!(m.remove(&format!("k{i}")), Some(num(i)));
        }
        assert_eq!(m.keys().take(3).collect::<Vec<_>>(), vec!["k1", "k3", "k5"]);
        let reversed: Mapping = m.clone().into_iter().rev().collect();
        assert_eq!(reversed, m);
    }

    #[test]
    fn equality_ignores_order() {
        let m1: Mapping = [("a", num(1)), ("b", num(2))].into_iter().collect();
        let m2: Mapping = [("b", num(2)), ("a", num(1))].into_iter().collect();
        assert_eq!(m1, m2);
    }

    #[test]
    fn equality_checks_membership_and_values() {
        let m1: Mapping = [("a", num(1))].into_iter().collect();
        let m2: Mapping = [("a", num(2))].into_iter().collect();
        let m3: Mapping = [("a", num(1)), ("b", num(1))].into_iter().collect();
        assert_ne!(m1, m2);
        assert_ne!(m1, m3);
    }

    #[test]
    fn serde_preserves_order() {
        let m: Mapping = [("z", num(1)), ("a", num(2))].into_iter().collect();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"{"z":1,"a":2}"#);
        let parsed: Mapping = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.keys().collect::<Vec<_>>(), vec!["z", "a"]);
    }
}
