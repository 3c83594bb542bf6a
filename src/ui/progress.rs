//! Progress indicator for build tool runs

use super::context::UiContext;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Spinner showing the task the build tool is currently executing.
///
/// Shows an indicatif spinner in interactive mode, plain task lines in CI.
/// Cheap to clone; clones share the same spinner.
#[derive(Clone)]
pub struct RunProgress {
    bar: Option<ProgressBar>,
    tasks: Arc<AtomicU64>,
}

impl RunProgress {
    pub fn new(ctx: &UiContext, label: &str) -> Self {
        let bar = if ctx.use_fancy_output() {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("  {spinner:.cyan} {prefix} {pos:.dim} tasks  {msg:.dim}  {elapsed:.dim}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
            );
            bar.set_prefix(label.to_string());
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            Some(bar)
        } else {
            println!("Running {}...", label);
            None
        };
        Self {
            bar,
            tasks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Process one output line. Task headers advance the counter.
    pub fn on_line(&self, line: &str) {
        let Some((task, outcome)) = parse_task_line(line) else {
            return;
        };
        let count = self.tasks.fetch_add(1, Ordering::Relaxed) + 1;

        match self.bar {
            Some(ref bar) => {
                bar.set_position(count);
                bar.set_message(match outcome {
                    Some(outcome) => format!("{} {}", task, outcome),
                    None => task.to_string(),
                });
            }
            None => println!("  > Task {}", task),
        }
    }

    /// Number of task headers seen so far
    pub fn task_count(&self) -> u64 {
        self.tasks.load(Ordering::Relaxed)
    }

    /// Finish and clear the spinner.
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

/// Parse a task header like `> Task :app:test UP-TO-DATE`
fn parse_task_line(line: &str) -> Option<(&str, Option<&str>)> {
    let rest = line.trim().strip_prefix("> Task ")?;
    let mut parts = rest.splitn(2, ' ');
    let path = parts.next().filter(|p| p.starts_with(':'))?;
    let outcome = parts.next().map(str::trim).filter(|o| !o.is_empty());
    Some((path, outcome))
}
