//! Output assertions
//!
//! An [`ExpectationSet`] lists substrings that must appear in a run's merged
//! output and substrings that must not. Every rule is evaluated so one
//! failure report lists every violation.

mod contract;

pub use contract::DiagnosticContract;

use crate::error::{HarnessError, HarnessResult};
use crate::runner::RunResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One broken rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", content = "text", rename_all = "snake_case")]
pub enum Violation {
    /// A required substring never appeared
    Missing(String),
    /// A forbidden substring appeared
    Forbidden(String),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(text) => write!(f, "missing: {:?}", text),
            Self::Forbidden(text) => write!(f, "forbidden: {:?}", text),
        }
    }
}

/// Required-present and required-absent substrings for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectationSet {
    pub present: Vec<String>,
    pub absent: Vec<String>,
    /// Fail on a nonzero or missing exit code before looking at output
    pub require_success: bool,
}

impl Default for ExpectationSet {
    fn default() -> Self {
        Self {
            present: Vec::new(),
            absent: Vec::new(),
            require_success: true,
        }
    }
}

impl ExpectationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `text` to appear in the output
    pub fn contains(mut self, text: impl Into<String>) -> Self {
        push_unique(&mut self.present, text.into());
        self
    }

    /// Require `text` to be absent from the output
    pub fn does_not_contain(mut self, text: impl Into<String>) -> Self {
        push_unique(&mut self.absent, text.into());
        self
    }

    pub fn allow_failure(mut self) -> Self {
        self.require_success = false;
        self
    }

    /// Add every rule from `other`. Success stays required only if both
    /// sets require it.
    pub fn merge(mut self, other: ExpectationSet) -> Self {
        for text in other.present {
            push_unique(&mut self.present, text);
        }
        for text in other.absent {
            push_unique(&mut self.absent, text);
        }
        self.require_success &= other.require_success;
        self
    }

    /// All substring violations, in rule order
    pub fn evaluate(&self, result: &RunResult) -> Vec<Violation> {
        let missing = self
            .present
            .iter()
            .filter(|text| !result.contains(text))
            .map(|text| Violation::Missing(text.clone()));
        let forbidden = self
            .absent
            .iter()
            .filter(|text| result.contains(text))
            .map(|text| Violation::Forbidden(text.clone()));
        missing.chain(forbidden).collect()
    }

    /// Check exit status, then every substring rule.
    ///
    /// `label` names the run in the failure message (e.g. "cold").
    pub fn check(&self, label: &str, result: &RunResult) -> HarnessResult<()> {
        if self.require_success && !result.success() {
            return Err(HarnessError::NonZeroExit {
                command: result.command.clone(),
                code: result.exit_code,
                output: result.output_tail(),
            });
        }

        let violations = self.evaluate(result);
        if violations.is_empty() {
            return Ok(());
        }

        Err(HarnessError::Expectation {
            run: label.to_string(),
            violations: violations.iter().map(ToString::to_string).collect(),
            output: result.output_tail(),
        })
    }
}

fn push_unique(list: &mut Vec<String>, text: String) {
    if !list.contains(&text) {
        list.push(text);
    }
}
