//! Scenario files
//!
//! A scenario file is TOML describing the fixture, the tasks to run and
//! the scenario-specific lines each run must (or must not) print.

use super::{ConfigCacheScenario, CONFIGURATION_CACHE_FLAG};
use crate::error::{HarnessError, HarnessResult};
use crate::expect::{DiagnosticContract, ExpectationSet};
use crate::fixture::{
    FixtureSpec, Properties, BUILD_FILE, CONFIGURATION_CACHE_KEY, CONFIGURATION_CACHE_PROBLEMS_KEY,
    PROPERTIES_FILE, SETTINGS_FILE,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Parsed scenario file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioSpec {
    /// Scenario name used in reports
    pub name: String,

    /// Tasks to run on both invocations
    pub tasks: Vec<String>,

    /// Flags passed after the tasks on both invocations
    #[serde(default = "default_flags")]
    pub flags: Vec<String>,

    /// Per-invocation timeout in seconds (0 or absent = runner default)
    #[serde(default)]
    pub timeout_secs: u64,

    /// Build descriptor content
    pub build_file: String,

    /// Settings descriptor content
    #[serde(default)]
    pub settings_file: Option<String>,

    /// Property overrides written to `gradle.properties`
    #[serde(default)]
    pub properties: BTreeMap<String, String>,

    /// Auxiliary files, relative path to content
    #[serde(default)]
    pub files: BTreeMap<PathBuf, String>,

    /// Extra rules for the cold run
    #[serde(default)]
    pub cold: RunRules,

    /// Extra rules for the warm run
    #[serde(default)]
    pub warm: RunRules,
}

/// Scenario-specific substrings for one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunRules {
    pub contains: Vec<String>,
    pub absent: Vec<String>,
}

impl RunRules {
    fn to_expectations(&self) -> ExpectationSet {
        let set = self
            .contains
            .iter()
            .fold(ExpectationSet::new(), |set, text| set.contains(text));
        self.absent
            .iter()
            .fold(set, |set, text| set.does_not_contain(text))
    }
}

fn default_flags() -> Vec<String> {
    vec![CONFIGURATION_CACHE_FLAG.to_string()]
}

impl ScenarioSpec {
    /// Load and validate a scenario file
    pub async fn load(path: &Path) -> HarnessResult<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| HarnessError::io(format!("reading scenario {}", path.display()), e))?;
        Self::parse(path, &content)
    }

    /// Parse and validate scenario text; `origin` is used in error messages
    pub fn parse(origin: &Path, content: &str) -> HarnessResult<Self> {
        let spec: Self = toml::from_str(content).map_err(|e| HarnessError::ScenarioInvalid {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;

        let invalid = |reason: &str| HarnessError::ScenarioInvalid {
            path: origin.to_path_buf(),
            reason: reason.to_string(),
        };

        if spec.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if spec.tasks.is_empty() {
            return Err(invalid("tasks must list at least one task"));
        }
        for reserved in [BUILD_FILE, SETTINGS_FILE, PROPERTIES_FILE] {
            if spec.files.contains_key(Path::new(reserved)) {
                return Err(invalid(&format!(
                    "{} is generated from its own key, not [files]",
                    reserved
                )));
            }
        }

        Ok(spec)
    }

    /// Property overrides written to `gradle.properties`
    pub fn properties(&self) -> Properties {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    /// Settings that make the scenario check less than it appears to.
    /// These do not stop a run.
    pub fn warnings(&self) -> Vec<String> {
        let properties = self.properties();
        let flag_enabled = self.flags.iter().any(|f| f == CONFIGURATION_CACHE_FLAG);
        let mut warnings = Vec::new();

        match properties.configuration_cache_enabled() {
            Some(false) if !flag_enabled => warnings.push(format!(
                "{} is false and {} is not passed; the configuration cache is never used",
                CONFIGURATION_CACHE_KEY, CONFIGURATION_CACHE_FLAG
            )),
            None if !flag_enabled => warnings.push(format!(
                "neither {} nor {} enables the configuration cache",
                CONFIGURATION_CACHE_KEY, CONFIGURATION_CACHE_FLAG
            )),
            _ => {}
        }

        if properties
            .get(CONFIGURATION_CACHE_PROBLEMS_KEY)
            .is_some_and(|v| v.trim() == "warn")
        {
            warnings.push(format!(
                "{}=warn lets a build with cache problems exit 0; only the wording rules catch them",
                CONFIGURATION_CACHE_PROBLEMS_KEY
            ));
        }

        warnings
    }

    /// The fixture this scenario writes
    pub fn fixture(&self) -> FixtureSpec {
        let mut fixture = FixtureSpec::new().build_file(&self.build_file);
        if let Some(ref settings) = self.settings_file {
            fixture = fixture.settings_file(settings);
        }
        let properties = self.properties();
        if !properties.is_empty() {
            fixture = fixture.properties(&properties);
        }
        self.files
            .iter()
            .fold(fixture, |fixture, (path, content)| fixture.file(path, content))
    }

    /// Build the runnable scenario on top of the diagnostic contract
    pub fn into_scenario(self, contract: &DiagnosticContract) -> ConfigCacheScenario {
        let fixture = self.fixture();
        let timeout = (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs));

        let mut scenario = ConfigCacheScenario::new(self.name, fixture, contract)
            .cold_rules(self.cold.to_expectations())
            .warm_rules(self.warm.to_expectations())
            .timeout(timeout);
        scenario.tasks = self.tasks;
        scenario.flags = self.flags;
        scenario
    }
}
