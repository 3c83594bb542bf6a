//! Configuration schema for cachecheck
//!
//! Configuration is stored at `~/.config/cachecheck/config.toml`, with
//! project-local overrides in `.cachecheck.toml`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Build tool invocation settings
    pub runner: RunnerConfig,

    /// Diagnostic wording the assertions match against
    pub diagnostics: DiagnosticsConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Append scenario outcomes to the run journal
    pub journal: bool,

    /// Keep fixture directories after a run
    pub keep_fixtures: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            journal: true,
            keep_fixtures: false,
        }
    }
}

/// Build tool invocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Explicit build tool executable (default: project wrapper, then `gradle`)
    pub executable: Option<PathBuf>,

    /// Prefer the fixture's `gradlew` wrapper when present
    pub use_wrapper: bool,

    /// Per-invocation timeout in seconds (0 = no timeout)
    pub timeout_secs: u64,

    /// Flags appended after the scenario flags on every invocation
    pub extra_flags: Vec<String>,

    /// Extra environment variables for the build tool
    pub env: HashMap<String, String>,
}

impl RunnerConfig {
    /// Configured timeout, if any
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            executable: None,
            use_wrapper: true,
            timeout_secs: 0,
            extra_flags: vec!["--console=plain".to_string()],
            env: HashMap::new(),
        }
    }
}

/// Diagnostic wording emitted by the build tool.
///
/// The defaults match Gradle 8.x. Wording changes between releases, so
/// these are a versioned contract rather than a stable protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Build tool version the wording was taken from
    pub tool_version: String,

    /// Printed when the configuration phase hit cache problems
    pub problems_found: String,

    /// Printed when the cache entry could not be stored cleanly
    pub problems_storing: String,

    /// Printed when a stored entry is reused
    pub reusing: String,

    /// Printed when a new entry is stored
    pub stored: String,

    /// Require the `stored` line on the cold run
    pub require_stored: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            tool_version: "8.x".to_string(),
            problems_found: "Configuration cache problems found".to_string(),
            problems_storing: "problems were found storing the configuration cache".to_string(),
            reusing: "Reusing configuration cache".to_string(),
            stored: "Configuration cache entry stored".to_string(),
            require_stored: false,
        }
    }
}
