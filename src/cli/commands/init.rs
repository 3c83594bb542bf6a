//! Init command - write a sample scenario file

use crate::cli::args::InitArgs;
use crate::error::{HarnessError, HarnessResult};
use crate::ui::{self, UiContext};
use std::path::Path;
use tokio::fs;

/// File name written by `cachecheck init`
pub const SCENARIO_FILE: &str = "cachecheck.toml";

/// Template for a scenario file
const INIT_TEMPLATE: &str = r#"# cachecheck scenario
# Run with: cachecheck run cachecheck.toml

name = "my-plugin"
tasks = ["check"]
# flags = ["--configuration-cache"]
# timeout_secs = 600

settings_file = """
pluginManagement {
    repositories {
        mavenLocal()
        gradlePluginPortal()
    }
}
rootProject.name = "fixture"
"""

build_file = """
plugins {
    id("com.example.my-plugin")
}

tasks.register("check") {
    doLast {
        println("check ran")
    }
}
"""

[properties]
"org.gradle.configuration-cache" = "true"

# [files]
# "src/main/java/App.java" = "class App {}"

[cold]
contains = ["check ran"]
# absent = []

[warm]
# contains = []
# absent = []
"#;

/// Execute the init command
pub async fn execute(args: InitArgs) -> HarnessResult<()> {
    let ctx = UiContext::detect();

    let target_dir = match args.path {
        Some(ref p) => p.clone(),
        None => std::env::current_dir()
            .map_err(|e| HarnessError::io("getting current directory", e))?,
    };

    let scenario_path = target_dir.join(SCENARIO_FILE);

    if scenario_path.exists() && !args.force {
        return Err(HarnessError::User(format!(
            "{} already exists. Use --force to overwrite.",
            scenario_path.display()
        )));
    }

    ensure_dir(&target_dir).await?;

    fs::write(&scenario_path, INIT_TEMPLATE)
        .await
        .map_err(|e| HarnessError::io(format!("writing {}", scenario_path.display()), e))?;

    ui::step_ok_detail(
        &ctx,
        "Created scenario",
        &scenario_path.display().to_string(),
    );

    Ok(())
}

async fn ensure_dir(dir: &Path) -> HarnessResult<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| HarnessError::io(format!("creating directory {}", dir.display()), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioSpec;
    use tempfile::TempDir;

    #[tokio::test]
    async fn init_creates_scenario() {
        let temp = TempDir::new().unwrap();
        let args = InitArgs {
            force: false,
            path: Some(temp.path().to_path_buf()),
        };
        execute(args).await.unwrap();

        let content = std::fs::read_to_string(temp.path().join(SCENARIO_FILE)).unwrap();
        assert!(content.contains("build_file"));
        assert!(content.contains("[properties]"));
    }

    #[tokio::test]
    async fn init_refuses_overwrite_without_force() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(SCENARIO_FILE), "existing").unwrap();

        let args = InitArgs {
            force: false,
            path: Some(temp.path().to_path_buf()),
        };
        let err = execute(args).await.unwrap_err().to_string();
        assert!(err.contains("already exists"));
    }

    #[tokio::test]
    async fn init_overwrites_with_force() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(SCENARIO_FILE), "old content").unwrap();

        let args = InitArgs {
            force: true,
            path: Some(temp.path().to_path_buf()),
        };
        execute(args).await.unwrap();

        let content = std::fs::read_to_string(temp.path().join(SCENARIO_FILE)).unwrap();
        assert!(content.contains("[cold]"));
    }

    #[test]
    fn template_is_a_valid_scenario() {
        let spec = ScenarioSpec::parse(Path::new(SCENARIO_FILE), INIT_TEMPLATE).unwrap();
        assert_eq!(spec.tasks, vec!["check"]);
        assert_eq!(spec.flags, vec!["--configuration-cache"]);
        assert_eq!(spec.fixture().files().count(), 3);
    }
}
