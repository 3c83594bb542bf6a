//! Configuration-cache diagnostic wording
//!
//! The build tool owns these messages and rewords them between releases.

use super::ExpectationSet;
use crate::config::schema::DiagnosticsConfig;

/// Literal diagnostics for one build tool version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticContract {
    pub tool_version: String,
    pub problems_found: String,
    pub problems_storing: String,
    pub reusing: String,
    pub stored: String,
    pub require_stored: bool,
}

impl DiagnosticContract {
    /// Rules for the first run against a fresh fixture
    pub fn cold(&self) -> ExpectationSet {
        let set = ExpectationSet::new()
            .does_not_contain(&self.problems_found)
            .does_not_contain(&self.problems_storing);
        if self.require_stored {
            set.contains(&self.stored)
        } else {
            set
        }
    }

    /// Rules for the second run against the unchanged fixture
    pub fn warm(&self) -> ExpectationSet {
        ExpectationSet::new()
            .contains(&self.reusing)
            .does_not_contain(&self.problems_storing)
    }
}

impl Default for DiagnosticContract {
    fn default() -> Self {
        Self::from(&DiagnosticsConfig::default())
    }
}

impl From<&DiagnosticsConfig> for DiagnosticContract {
    fn from(config: &DiagnosticsConfig) -> Self {
        Self {
            tool_version: config.tool_version.clone(),
            problems_found: config.problems_found.clone(),
            problems_storing: config.problems_storing.clone(),
            reusing: config.reusing.clone(),
            stored: config.stored.clone(),
            require_stored: config.require_stored,
        }
    }
}
