use std::fmt;
use std::sync::Arc;

use arbor_types::Path;
use serde::{Deserialize, Serialize};

use crate::error::{DiffError, DiffResult};

/// Runtime rule marking mapping keys as ignored.
///
/// Called with the path of the containing mapping and the key. Returning
/// `true` hides the entry from comparison entirely.
#[derive(Clone)]
pub struct KeyFilter(Arc<dyn Fn(&Path, &str) -> bool + Send + Sync>);

impl KeyFilter {
    pub fn new(f: impl Fn(&Path, &str) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    fn matches(&self, path: &Path, key: &str) -> bool {
        (self.0)(path, key)
    }
}

impl fmt::Debug for KeyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyFilter(..)")
    }
}

/// Configuration for the diff engine.
///
/// Thresholds are similarity scores in `[0, 1]`: two differing values whose
/// score reaches the threshold are treated as the same element modified
/// (diffed recursively), otherwise one replaces the other.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Minimum similarity for two mappings or two sequences to be aligned.
    pub container_threshold: f64,
    /// Minimum similarity for two multi-line strings to be line-diffed.
    pub string_threshold: f64,
    /// Whether multi-line strings are diffed line by line.
    pub line_diff_strings: bool,
    /// Mapping keys ignored at any depth.
    pub ignored_keys: Vec<String>,
    /// Path-aware ignore rule, in addition to `ignored_keys`.
    #[serde(skip)]
    pub key_filter: Option<KeyFilter>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            container_threshold: 0.5,
            string_threshold: 0.7,
            line_diff_strings: true,
            ignored_keys: Vec::new(),
            key_filter: None,
        }
    }
}

impl DiffConfig {
    /// Load a configuration from TOML. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> DiffResult<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| DiffError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_container_threshold(mut self, threshold: f64) -> Self {
        self.container_threshold = threshold;
        self
    }

    pub fn with_string_threshold(mut self, threshold: f64) -> Self {
        self.string_threshold = threshold;
        self
    }

    pub fn with_line_diff_strings(mut self, enabled: bool) -> Self {
        self.line_diff_strings = enabled;
        self
    }

    pub fn with_ignored_key(mut self, key: impl Into<String>) -> Self {
        self.ignored_keys.push(key.into());
        self
    }

    pub fn with_key_filter(
        mut self,
        f: impl Fn(&Path, &str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.key_filter = Some(KeyFilter::new(f));
        self
    }

    /// Check that every threshold lies in `[0, 1]`.
    pub fn validate(&self) -> DiffResult<()> {
        check_threshold("container_threshold", self.container_threshold)?;
        check_threshold("string_threshold", self.string_threshold)
    }

    /// Returns `true` if the entry `key` of the mapping at `path` is ignored.
    pub fn is_ignored(&self, path: &Path, key: &str) -> bool {
        self.ignored_keys.iter().any(|k| k == key)
            || self
                .key_filter
                .as_ref()
                .is_some_and(|f| f.matches(path, key))
    }
}

fn check_threshold(name: &str, value: f64) -> DiffResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(DiffError::InvalidConfiguration(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = DiffConfig::default();
        assert_eq!(c.container_threshold, 0.5);
        assert_eq!(c.string_threshold, 0.7);
        assert!(c.line_diff_strings);
        assert!(c.ignored_keys.is_empty());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn negative_threshold_rejected() {
        let c = DiffConfig::default().with_container_threshold(-0.1);
        assert!(matches!(c.validate(), Err(DiffError::InvalidConfiguration(_))));
    }

    #[test]
    fn nan_threshold_rejected() {
        let c = DiffConfig::default().with_string_threshold(f64::NAN);
        assert!(c.validate().is_err());
    }

    #[test]
    fn toml_partial_config() {
        let c = DiffConfig::from_toml_str(
            r#"
            container_threshold = 0.3
            ignored_keys = ["execution_count"]
            "#,
        )
        .unwrap();
        assert_eq!(c.container_threshold, 0.3);
        assert_eq!(c.string_threshold, 0.7);
        assert_eq!(c.ignored_keys, vec!["execution_count".to_string()]);
    }

    #[test]
    fn toml_out_of_range_rejected() {
        let err = DiffConfig::from_toml_str("string_threshold = 1.5").unwrap_err();
        assert!(err.to_string().contains("string_threshold"));
    }

    #[test]
    fn ignore_by_name_and_filter() {
        let c = DiffConfig::default()
            .with_ignored_key("id")
            .with_key_filter(|path, key| key == "outputs" && !path.is_root());
        assert!(c.is_ignored(&Path::root(), "id"));
        assert!(!c.is_ignored(&Path::root(), "outputs"));
        assert!(c.is_ignored(&Path::root().child("cell"), "outputs"));
        assert!(!c.is_ignored(&Path::root(), "source"));
    }
}
