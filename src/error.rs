//! Error types for cachecheck
//!
//! All modules use `HarnessResult<T>` as their return type.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// All errors that can occur while building, running or checking a scenario
#[derive(Error, Debug)]
pub enum HarnessError {
    // Fixture errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Fixture path collision: {path}: {reason}")]
    FixtureCollision { path: PathBuf, reason: String },

    #[error("Invalid fixture path: {path}: {reason}")]
    PathInvalid { path: PathBuf, reason: String },

    #[error("Fixture directory is not empty: {0}")]
    FixtureDirNotEmpty(PathBuf),

    // Process errors
    #[error("Failed to launch {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exceeded the {}s timeout and was terminated\n{output}", .timeout.as_secs())]
    Timeout {
        command: String,
        timeout: Duration,
        output: String,
    },

    #[error("{command} exited with {}\n{output}", describe_exit(.code))]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    // Assertion errors
    #[error("{run} run violated {} expectation(s):\n{}\n--- captured output (tail) ---\n{output}", .violations.len(), .violations.join("\n"))]
    Expectation {
        run: String,
        violations: Vec<String>,
        output: String,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid scenario {path}: {reason}")]
    ScenarioInvalid { path: PathBuf, reason: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl HarnessError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a launch error
    pub fn launch(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::Launch {
            command: command.into(),
            source,
        }
    }

    /// Stable label for the error kind, used in reports and the journal
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. }
            | Self::FixtureCollision { .. }
            | Self::PathInvalid { .. }
            | Self::FixtureDirNotEmpty(_) => "io",
            Self::Launch { .. } => "launch",
            Self::Timeout { .. } => "timeout",
            Self::NonZeroExit { .. } => "non_zero_exit",
            Self::Precondition(_) => "precondition",
            Self::Expectation { .. } => "expectation",
            Self::ConfigInvalid { .. }
            | Self::ConfigDirCreate { .. }
            | Self::ScenarioInvalid { .. }
            | Self::TomlParse(_)
            | Self::TomlSerialize(_) => "config",
            Self::Json(_) | Self::Internal(_) | Self::User(_) => "internal",
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Launch { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                Some("Install Gradle, add a gradlew wrapper, or set runner.executable")
            }
            Self::Timeout { .. } => Some("Raise runner.timeout_secs or pass --timeout"),
            Self::NonZeroExit { .. } => Some("Rerun with --keep to inspect the fixture"),
            Self::Expectation { .. } => {
                Some("Diagnostic wording is version-dependent; check [diagnostics] in your config")
            }
            _ => None,
        }
    }
}
