//! `gradle.properties` style key=value overrides

use std::collections::BTreeMap;
use std::fmt;

/// Property key that turns on the configuration cache
pub const CONFIGURATION_CACHE_KEY: &str = "org.gradle.configuration-cache";

/// Property key that controls whether cache problems fail the build
pub const CONFIGURATION_CACHE_PROBLEMS_KEY: &str = "org.gradle.configuration-cache.problems";

/// Ordered set of property overrides rendered as `key=value` lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    /// Create an empty property set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, replacing any previous value
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Enable or disable the configuration cache
    pub fn with_configuration_cache(self, enabled: bool) -> Self {
        self.set(CONFIGURATION_CACHE_KEY, enabled.to_string())
    }

    /// Look up a property value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Whether the configuration cache flag is set, if present and boolean
    pub fn configuration_cache_enabled(&self) -> Option<bool> {
        self.get(CONFIGURATION_CACHE_KEY)
            .and_then(|v| v.trim().parse::<bool>().ok())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as file content, one `key=value` per line
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.entries {
            writeln!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
