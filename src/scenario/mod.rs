//! Cold/warm configuration-cache scenarios
//!
//! A scenario writes its fixture, runs the build tool twice against the
//! same directory and checks each run:
//!
//! `FixtureBuilt → ColdRunExecuted → ColdAssertionsPassed → WarmRunExecuted
//! → WarmAssertionsPassed`
//!
//! The first failure ends the scenario; nothing is retried.

pub mod presets;
mod spec;

pub use spec::{RunRules, ScenarioSpec};

use crate::error::{HarnessError, HarnessResult};
use crate::expect::{DiagnosticContract, ExpectationSet};
use crate::fixture::{FixtureSpec, ProjectFixture};
use crate::runner::{BuildTool, Invocation, RunResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Flag that turns the configuration cache on for one invocation
pub const CONFIGURATION_CACHE_FLAG: &str = "--configuration-cache";

/// Progress through a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioState {
    Pending,
    FixtureBuilt,
    ColdRunExecuted,
    ColdAssertionsPassed,
    WarmRunExecuted,
    WarmAssertionsPassed,
}

impl ScenarioState {
    /// The state that follows this one, if any
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::FixtureBuilt),
            Self::FixtureBuilt => Some(Self::ColdRunExecuted),
            Self::ColdRunExecuted => Some(Self::ColdAssertionsPassed),
            Self::ColdAssertionsPassed => Some(Self::WarmRunExecuted),
            Self::WarmRunExecuted => Some(Self::WarmAssertionsPassed),
            Self::WarmAssertionsPassed => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::FixtureBuilt => "fixture_built",
            Self::ColdRunExecuted => "cold_run_executed",
            Self::ColdAssertionsPassed => "cold_assertions_passed",
            Self::WarmRunExecuted => "warm_run_executed",
            Self::WarmAssertionsPassed => "warm_assertions_passed",
        }
    }
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a scenario run produced
#[derive(Debug)]
pub struct ScenarioReport {
    pub scenario: String,
    /// Last state reached
    pub state: ScenarioState,
    /// Fixture content fingerprint (empty if the fixture was never built)
    pub fingerprint: String,
    pub cold: Option<RunResult>,
    pub warm: Option<RunResult>,
    /// The error that ended the scenario, if it did not pass
    pub failure: Option<HarnessError>,
    /// The fixture, still on disk until dropped or kept
    pub fixture: Option<ProjectFixture>,
}

/// Comparable summary of a report, independent of paths and timings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub passed: bool,
    pub state: ScenarioState,
    pub failure_kind: Option<&'static str>,
}

impl ScenarioReport {
    fn new(scenario: &str) -> Self {
        Self {
            scenario: scenario.to_string(),
            state: ScenarioState::Pending,
            fingerprint: String::new(),
            cold: None,
            warm: None,
            failure: None,
            fixture: None,
        }
    }

    /// Whether every stage completed
    pub fn passed(&self) -> bool {
        self.failure.is_none() && self.state == ScenarioState::WarmAssertionsPassed
    }

    pub fn outcome(&self) -> Outcome {
        Outcome {
            passed: self.passed(),
            state: self.state,
            failure_kind: self.failure.as_ref().map(HarnessError::kind),
        }
    }

    /// Convert into a plain result, surfacing the failure
    pub fn into_result(self) -> HarnessResult<()> {
        match self.failure {
            Some(err) => Err(err),
            None if self.passed() => Ok(()),
            None => Err(HarnessError::Internal(format!(
                "scenario {} stopped at {}",
                self.scenario, self.state
            ))),
        }
    }

    fn advance(&mut self, to: ScenarioState) {
        debug_assert_eq!(self.state.next(), Some(to), "out-of-order transition");
        debug!("{}: {} -> {}", self.scenario, self.state, to);
        self.state = to;
    }

    fn fail(mut self, err: HarnessError) -> Self {
        warn!("{} failed after {}: {}", self.scenario, self.state, err);
        self.failure = Some(err);
        self
    }
}

/// A cold-then-warm configuration-cache check against one fixture
#[derive(Debug, Clone)]
pub struct ConfigCacheScenario {
    pub name: String,
    pub fixture: FixtureSpec,
    pub tasks: Vec<String>,
    pub flags: Vec<String>,
    pub cold: ExpectationSet,
    pub warm: ExpectationSet,
    pub timeout: Option<Duration>,
}

impl ConfigCacheScenario {
    /// Scenario with the contract's cold/warm rules and `--configuration-cache`
    pub fn new(name: impl Into<String>, fixture: FixtureSpec, contract: &DiagnosticContract) -> Self {
        Self {
            name: name.into(),
            fixture,
            tasks: Vec::new(),
            flags: vec![CONFIGURATION_CACHE_FLAG.to_string()],
            cold: contract.cold(),
            warm: contract.warm(),
            timeout: None,
        }
    }

    pub fn task(mut self, task: impl Into<String>) -> Self {
        self.tasks.push(task.into());
        self
    }

    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    /// Extra rules for the cold run
    pub fn cold_rules(mut self, rules: ExpectationSet) -> Self {
        self.cold = self.cold.merge(rules);
        self
    }

    /// Extra rules for the warm run
    pub fn warm_rules(mut self, rules: ExpectationSet) -> Self {
        self.warm = self.warm.merge(rules);
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run against a fresh temporary fixture
    pub async fn run(&self, tool: &dyn BuildTool) -> ScenarioReport {
        let report = ScenarioReport::new(&self.name);

        // Reject bad task lists before anything touches disk
        if let Err(err) = self.invocation(std::path::Path::new(".")).validate() {
            return report.fail(err);
        }

        match ProjectFixture::create(&self.fixture).await {
            Ok(fixture) => self.run_in(tool, fixture).await,
            Err(err) => report.fail(err),
        }
    }

    /// Run against an already-written fixture
    pub async fn run_in(&self, tool: &dyn BuildTool, fixture: ProjectFixture) -> ScenarioReport {
        let mut report = ScenarioReport::new(&self.name);
        report.fingerprint = fixture.fingerprint();
        report.advance(ScenarioState::FixtureBuilt);

        info!(
            "{}: running {} in {}",
            self.name,
            tool.describe(fixture.root()),
            fixture.root().display()
        );

        let invocation = self.invocation(fixture.root());
        report.fixture = Some(fixture);

        // Cold
        let cold = match tool.invoke(&invocation).await {
            Ok(run) => run,
            Err(err) => return report.fail(err),
        };
        report.advance(ScenarioState::ColdRunExecuted);
        let checked = self.cold.check("cold", &cold);
        report.cold = Some(cold);
        if let Err(err) = checked {
            return report.fail(err);
        }
        report.advance(ScenarioState::ColdAssertionsPassed);

        // Warm: same fixture, same arguments, fresh process
        let warm = match tool.invoke(&invocation).await {
            Ok(run) => run,
            Err(err) => return report.fail(err),
        };
        report.advance(ScenarioState::WarmRunExecuted);
        let checked = self.warm.check("warm", &warm);
        report.warm = Some(warm);
        if let Err(err) = checked {
            return report.fail(err);
        }
        report.advance(ScenarioState::WarmAssertionsPassed);

        info!("{}: passed", self.name);
        report
    }

    fn invocation(&self, workdir: &std::path::Path) -> Invocation {
        Invocation::new(workdir)
            .tasks(self.tasks.iter().cloned())
            .flags(self.flags.iter().cloned())
            .timeout(self.timeout)
    }
}
