//! Run command - execute a cold/warm configuration cache scenario

use crate::cli::args::{OutputFormat, RunArgs};
use crate::config::schema::RunnerConfig;
use crate::config::Config;
use crate::error::{HarnessError, HarnessResult};
use crate::expect::DiagnosticContract;
use crate::fixture::ProjectFixture;
use crate::report::{Journal, ReportSummary};
use crate::runner::{create_runner, OutputListener};
use crate::scenario::{presets, ConfigCacheScenario, ScenarioReport, ScenarioSpec, ScenarioState};
use crate::ui::{self, RunProgress, UiContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Execute the run command
pub async fn execute(args: RunArgs, config: &Config) -> HarnessResult<()> {
    let json = args.format == OutputFormat::Json;
    let ctx = if json {
        UiContext::non_interactive()
    } else {
        UiContext::detect()
    };

    let contract = DiagnosticContract::from(&config.diagnostics);
    let mut scenario = load_scenario(&args, &contract).await?;
    let mut runner_config = config.runner.clone();
    apply_overrides(&args, &mut scenario, &mut runner_config);
    debug!(
        "Scenario {}: tasks {:?}, flags {:?}, diagnostics for {}",
        scenario.name, scenario.tasks, scenario.flags, contract.tool_version
    );

    let progress = if json {
        None
    } else {
        ui::intro(&ctx, &format!("cachecheck: {}", scenario.name));
        Some(RunProgress::new(&ctx, &scenario.name))
    };
    let listener: Option<OutputListener> = progress.clone().map(|progress| {
        Arc::new(move |line: &str| progress.on_line(line)) as OutputListener
    });

    let runner = create_runner(&runner_config, listener);
    let mut report = scenario.run(runner.as_ref()).await;
    let tasks_seen = progress.as_ref().map(|progress| {
        progress.finish();
        progress.task_count()
    });

    let kept = if args.keep || config.general.keep_fixtures {
        report.fixture.take().map(ProjectFixture::keep)
    } else {
        None
    };

    let summary = ReportSummary::new(&report, kept.as_deref());
    Journal::new(config).record(&summary).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_report(&ctx, &report, &summary, tasks_seen.unwrap_or(0));
    }

    report.into_result()
}

async fn load_scenario(
    args: &RunArgs,
    contract: &DiagnosticContract,
) -> HarnessResult<ConfigCacheScenario> {
    if let Some(ref path) = args.scenario {
        let spec = ScenarioSpec::load(path).await?;
        for warning in spec.warnings() {
            warn!("{}: {}", path.display(), warning);
        }
        return Ok(spec.into_scenario(contract));
    }

    let name = args
        .preset
        .as_deref()
        .ok_or_else(|| HarnessError::User("Pass a scenario file or --preset".to_string()))?;

    presets::by_name(
        name,
        args.plugin_id.as_deref(),
        args.plugin_version.as_deref(),
        contract,
    )
    .ok_or_else(|| {
        HarnessError::User(format!(
            "Unknown preset {}. Available: {}",
            name,
            presets::PRESETS.join(", ")
        ))
    })
}

/// Command-line overrides of the scenario and runner settings.
///
/// `--timeout 0` turns the limit off entirely, including one set in config.
fn apply_overrides(args: &RunArgs, scenario: &mut ConfigCacheScenario, runner: &mut RunnerConfig) {
    match args.timeout {
        Some(0) => {
            scenario.timeout = None;
            runner.timeout_secs = 0;
        }
        Some(secs) => scenario.timeout = Some(Duration::from_secs(secs)),
        None => {}
    }
    if let Some(ref exe) = args.executable {
        runner.executable = Some(exe.clone());
    }
    runner.env.extend(args.env.iter().cloned());
}

fn print_report(ctx: &UiContext, report: &ScenarioReport, summary: &ReportSummary, tasks_seen: u64) {
    if !ctx.use_fancy_output() {
        print!("{}", summary.render_text());
        return;
    }

    if report.state >= ScenarioState::FixtureBuilt {
        ui::step_ok_detail(
            ctx,
            "Fixture written",
            &summary.fingerprint[..12.min(summary.fingerprint.len())],
        );
    }

    if let Some(ref cold) = summary.cold {
        let detail = format!("{:.1}s", cold.duration_ms as f64 / 1000.0);
        if report.state >= ScenarioState::ColdAssertionsPassed {
            ui::step_ok_detail(ctx, "Cold run stored a clean configuration cache entry", &detail);
        } else {
            ui::step_error_detail(ctx, "Cold run", &detail);
        }
    }

    if let Some(ref warm) = summary.warm {
        let detail = format!("{:.1}s", warm.duration_ms as f64 / 1000.0);
        if report.state >= ScenarioState::WarmAssertionsPassed {
            ui::step_ok_detail(ctx, "Warm run reused the configuration cache", &detail);
        } else {
            ui::step_error_detail(ctx, "Warm run", &detail);
        }
    }

    if tasks_seen > 0 {
        ui::key_value(ctx, "tasks executed", &tasks_seen.to_string());
    }
    if let Some(ref path) = summary.fixture {
        ui::key_value(ctx, "fixture", &path.display().to_string());
    }

    match summary.failure {
        Some(ref failure) => {
            ui::step_info(ctx, &format!("stopped after {}", report.state));
            if let Some(hint) = failure.hint {
                ui::remark(ctx, hint);
            }
            ui::outro_error(ctx, &format!("{} failed ({})", report.scenario, failure.kind));
        }
        None => ui::outro_success(ctx, &format!("{} passed", report.scenario)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(scenario: Option<PathBuf>, preset: Option<&str>) -> RunArgs {
        RunArgs {
            scenario,
            preset: preset.map(str::to_string),
            plugin_id: None,
            plugin_version: None,
            executable: None,
            timeout: None,
            env: vec![],
            keep: false,
            format: OutputFormat::Json,
        }
    }

    #[tokio::test]
    async fn loads_preset() {
        let scenario = load_scenario(&args(None, Some("rewrite-dry-run")), &DiagnosticContract::default())
            .await
            .unwrap();
        assert_eq!(scenario.name, "rewrite-dry-run");
    }

    #[tokio::test]
    async fn unknown_preset_is_user_error() {
        let err = load_scenario(&args(None, Some("nope")), &DiagnosticContract::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Available: rewrite-dry-run"));
    }

    async fn preset() -> ConfigCacheScenario {
        load_scenario(&args(None, Some("rewrite-dry-run")), &DiagnosticContract::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn zero_timeout_clears_configured_timeout() {
        let mut scenario = preset().await.timeout(Some(Duration::from_secs(30)));
        let mut runner = RunnerConfig {
            timeout_secs: 1,
            ..RunnerConfig::default()
        };
        let args = RunArgs {
            timeout: Some(0),
            ..args(None, Some("rewrite-dry-run"))
        };

        apply_overrides(&args, &mut scenario, &mut runner);

        assert_eq!(scenario.timeout, None);
        assert_eq!(runner.timeout(), None);
    }

    #[tokio::test]
    async fn explicit_timeout_wins_and_keeps_config_default() {
        let mut scenario = preset().await;
        let mut runner = RunnerConfig {
            timeout_secs: 1,
            ..RunnerConfig::default()
        };
        let args = RunArgs {
            timeout: Some(90),
            ..args(None, Some("rewrite-dry-run"))
        };

        apply_overrides(&args, &mut scenario, &mut runner);

        assert_eq!(scenario.timeout, Some(Duration::from_secs(90)));
        assert_eq!(runner.timeout(), Some(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn no_timeout_flag_leaves_both_alone() {
        let mut scenario = preset().await.timeout(Some(Duration::from_secs(30)));
        let mut runner = RunnerConfig {
            timeout_secs: 5,
            ..RunnerConfig::default()
        };
        let args = RunArgs {
            executable: Some(PathBuf::from("/opt/gradle/bin/gradle")),
            env: vec![("GRADLE_OPTS".to_string(), "-Xmx1g".to_string())],
            ..args(None, Some("rewrite-dry-run"))
        };

        apply_overrides(&args, &mut scenario, &mut runner);

        assert_eq!(scenario.timeout, Some(Duration::from_secs(30)));
        assert_eq!(runner.timeout_secs, 5);
        assert_eq!(runner.executable, Some(PathBuf::from("/opt/gradle/bin/gradle")));
        assert_eq!(runner.env.get("GRADLE_OPTS").map(String::as_str), Some("-Xmx1g"));
    }

    #[tokio::test]
    async fn missing_scenario_file_is_io_error() {
        let err = load_scenario(
            &args(Some(PathBuf::from("/nonexistent/scenario.toml")), None),
            &DiagnosticContract::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "io");
    }
}
