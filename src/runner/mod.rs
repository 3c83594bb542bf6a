//! Build tool invocation
//!
//! Provides a trait for running the external build tool so scenarios can
//! drive either a real subprocess or a scripted stand-in.

mod process;

pub use process::{OutputListener, ProcessRunner};

use crate::config::schema::RunnerConfig;
use crate::error::{HarnessError, HarnessResult};
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Max number of output lines to include in failure messages.
pub const OUTPUT_TAIL_LINES: usize = 50;

/// One request to run the build tool
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Directory the build tool runs in
    pub workdir: PathBuf,
    /// Task names, in order
    pub tasks: Vec<String>,
    /// Flags, in order, passed after the tasks
    pub flags: Vec<String>,
    /// Maximum run time (`None` = wait indefinitely)
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            tasks: Vec::new(),
            flags: Vec::new(),
            timeout: None,
        }
    }

    pub fn task(mut self, task: impl Into<String>) -> Self {
        self.tasks.push(task.into());
        self
    }

    pub fn tasks<I, S>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tasks.extend(tasks.into_iter().map(Into::into));
        self
    }

    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    pub fn flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject requests that must never reach a subprocess
    pub fn validate(&self) -> HarnessResult<()> {
        if self.tasks.is_empty() {
            return Err(HarnessError::Precondition(
                "at least one task name is required".to_string(),
            ));
        }
        if let Some(blank) = self.tasks.iter().find(|t| t.trim().is_empty()) {
            return Err(HarnessError::Precondition(format!(
                "task name {:?} is blank",
                blank
            )));
        }
        Ok(())
    }

    /// Command-line arguments: tasks first, then flags
    pub fn args(&self) -> Vec<String> {
        self.tasks.iter().chain(&self.flags).cloned().collect()
    }
}

/// Captured result of exactly one build tool invocation
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Command line as executed, for messages
    pub command: String,
    /// Tasks requested
    pub tasks: Vec<String>,
    /// Flags passed, including configured extras
    pub flags: Vec<String>,
    /// Exit code (`None` when terminated by a signal)
    pub exit_code: Option<i32>,
    /// stdout and stderr interleaved in arrival order
    pub output: String,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock run time
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl RunResult {
    /// Whether the build tool exited with code 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Whether the merged output contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.output.contains(needle)
    }

    /// Last [`OUTPUT_TAIL_LINES`] lines of merged output
    pub fn output_tail(&self) -> String {
        output_tail(&self.output, OUTPUT_TAIL_LINES)
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Extract the useful tail of captured output for error diagnostics.
pub fn output_tail(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let total = lines.len();
    if total == 0 {
        return "<no output>".to_string();
    }
    let tail = if total > max_lines {
        &lines[total - max_lines..]
    } else {
        &lines[..]
    };
    tail.join("\n")
}

/// Abstract build tool interface
#[async_trait]
pub trait BuildTool: Send + Sync {
    /// Run the tool once and capture everything it printed
    async fn invoke(&self, invocation: &Invocation) -> HarnessResult<RunResult>;

    /// Executable the tool would run in `workdir`, for display
    fn describe(&self, workdir: &Path) -> String;
}

/// Create the subprocess-backed build tool from runner configuration
pub fn create_runner(config: &RunnerConfig, listener: Option<OutputListener>) -> Box<dyn BuildTool> {
    let runner = ProcessRunner::from_config(config);
    match listener {
        Some(listener) => Box::new(runner.with_listener(listener)),
        None => Box::new(runner),
    }
}
