//! Scenario reports and the run journal
//!
//! The journal appends one JSON line per scenario outcome to
//! `~/.local/state/cachecheck/journal.log`.

use crate::config::{schema::Config, ConfigManager};
use crate::runner::RunResult;
use crate::scenario::{ScenarioReport, ScenarioState};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

/// Serializable view of a finished scenario
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub run_id: Uuid,
    pub scenario: String,
    pub passed: bool,
    pub state: ScenarioState,
    pub fingerprint: String,
    pub cold: Option<RunSummary>,
    pub warm: Option<RunSummary>,
    pub failure: Option<FailureSummary>,
    pub fixture: Option<PathBuf>,
}

/// One invocation, without its output
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub command: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub output_lines: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    pub kind: &'static str,
    pub message: String,
    pub hint: Option<&'static str>,
}

impl From<&RunResult> for RunSummary {
    fn from(run: &RunResult) -> Self {
        Self {
            command: run.command.clone(),
            exit_code: run.exit_code,
            duration_ms: run.duration.as_millis() as u64,
            output_lines: run.output.lines().count(),
        }
    }
}

impl ReportSummary {
    /// Summarize a report. `fixture` is the kept fixture path, if any.
    pub fn new(report: &ScenarioReport, fixture: Option<&Path>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            scenario: report.scenario.clone(),
            passed: report.passed(),
            state: report.state,
            fingerprint: report.fingerprint.clone(),
            cold: report.cold.as_ref().map(RunSummary::from),
            warm: report.warm.as_ref().map(RunSummary::from),
            failure: report.failure.as_ref().map(|err| FailureSummary {
                kind: err.kind(),
                message: err.to_string(),
                hint: err.hint(),
            }),
            fixture: fixture.map(Path::to_path_buf),
        }
    }

    /// Plain-text rendering for terminals and CI logs
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let verdict = if self.passed { "PASSED" } else { "FAILED" };
        out.push_str(&format!("{} {} (reached {})\n", verdict, self.scenario, self.state));
        if !self.fingerprint.is_empty() {
            out.push_str(&format!("  fixture: {}\n", &self.fingerprint[..12.min(self.fingerprint.len())]));
        }
        for (label, run) in [("cold", &self.cold), ("warm", &self.warm)] {
            if let Some(run) = run {
                let code = run
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                out.push_str(&format!(
                    "  {}: exit {} in {:.1}s ({} lines)\n",
                    label,
                    code,
                    run.duration_ms as f64 / 1000.0,
                    run.output_lines
                ));
            }
        }
        if let Some(ref path) = self.fixture {
            out.push_str(&format!("  kept at: {}\n", path.display()));
        }
        if let Some(ref failure) = self.failure {
            out.push_str(&format!("  [{}] {}\n", failure.kind, failure.message));
        }
        out
    }
}

/// File-based journal that appends JSON lines
pub struct Journal {
    enabled: bool,
    path: PathBuf,
}

impl Journal {
    /// Create a journal from config
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.journal,
            path: ConfigManager::journal_path(),
        }
    }

    /// Journal writing to an explicit file
    pub fn at(path: PathBuf) -> Self {
        Self {
            enabled: true,
            path,
        }
    }

    /// Record a scenario outcome.
    ///
    /// IO failures are logged and dropped; the journal never fails a run.
    pub async fn record(&self, summary: &ReportSummary) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": if summary.passed { "scenario.passed" } else { "scenario.failed" },
            "data": summary,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize journal entry: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write journal {}: {}", self.path.display(), e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
