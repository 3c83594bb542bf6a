//! Integration tests for cachecheck

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn cachecheck() -> Command {
        let mut cmd = cargo_bin_cmd!("cachecheck");
        cmd.arg("--no-local");
        cmd
    }

    #[test]
    fn help_displays() {
        cachecheck()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("configuration cache"));
    }

    #[test]
    fn version_displays() {
        cachecheck()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("cachecheck"));
    }

    #[test]
    fn config_path() {
        cachecheck()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        cachecheck()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[diagnostics]"))
            .stdout(predicate::str::contains("Reusing configuration cache"));
    }

    #[test]
    fn run_requires_a_source() {
        cachecheck().arg("run").assert().failure();
    }

    #[test]
    fn run_rejects_unknown_preset() {
        cachecheck()
            .args(["run", "--preset", "does-not-exist"])
            .assert()
            .failure();
    }

    #[test]
    fn run_missing_scenario_file() {
        cachecheck()
            .args(["run", "/nonexistent/scenario.toml"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn init_writes_scenario() {
        let temp = tempfile::TempDir::new().unwrap();
        cachecheck()
            .args(["init", "--path"])
            .arg(temp.path())
            .assert()
            .success();
        assert!(temp.path().join("cachecheck.toml").exists());

        cachecheck()
            .args(["init", "--path"])
            .arg(temp.path())
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));
    }
}

#[cfg(unix)]
mod scenario_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Stand-in build tool: stores an entry on the first run in a
    /// directory and reuses it afterwards.
    const FAKE_GRADLE: &str = r#"#!/bin/sh
echo "> Task :check"
echo "check ran"
if [ -f .cc-entry ]; then
    echo "Reusing configuration cache."
else
    touch .cc-entry
    echo "Configuration cache entry stored."
fi
"#;

    /// Takes longer than a one second limit
    const SLOW_GRADLE: &str = r#"#!/bin/sh
sleep 2
echo "check ran"
if [ -f .cc-entry ]; then
    echo "Reusing configuration cache."
else
    touch .cc-entry
    echo "Configuration cache entry stored."
fi
"#;

    /// Never reuses the entry
    const NO_REUSE_GRADLE: &str = r#"#!/bin/sh
echo "> Task :check"
echo "check ran"
echo "Configuration cache entry stored."
"#;

    /// Reports problems on every run
    const PROBLEMS_GRADLE: &str = r#"#!/bin/sh
echo "1 problem was found storing the configuration cache."
echo "Configuration cache problems found in this build." >&2
exit 1
"#;

    const SCENARIO: &str = r#"
name = "fake-plugin"
tasks = ["check"]
build_file = """
tasks.register("check") { doLast { println("check ran") } }
"""

[properties]
"org.gradle.configuration-cache" = "true"

[cold]
contains = ["check ran"]
"#;

    struct Workspace {
        dir: TempDir,
    }

    impl Workspace {
        fn new(script: &str) -> Self {
            let dir = TempDir::new().unwrap();
            let exe = dir.path().join("fake-gradle");
            std::fs::write(&exe, script).unwrap();
            std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
            std::fs::write(
                dir.path().join("config.toml"),
                "[general]\njournal = false\n",
            )
            .unwrap();
            std::fs::write(dir.path().join("scenario.toml"), SCENARIO).unwrap();
            Self { dir }
        }

        fn with_config(self, config: &str) -> Self {
            std::fs::write(self.path("config.toml"), config).unwrap();
            self
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn run(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("cachecheck");
            cmd.current_dir(self.dir.path())
                .arg("--no-local")
                .arg("--config")
                .arg(self.path("config.toml"))
                .arg("run")
                .arg(self.path("scenario.toml"))
                .arg("--executable")
                .arg(self.path("fake-gradle"));
            cmd
        }
    }

    fn json(stdout: &[u8]) -> serde_json::Value {
        serde_json::from_slice(stdout).unwrap()
    }

    #[test]
    fn cold_then_warm_passes() {
        let ws = Workspace::new(FAKE_GRADLE);
        let out = ws
            .run()
            .args(["--format", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let report = json(&out);
        assert_eq!(report["passed"], true);
        assert_eq!(report["state"], "warm_assertions_passed");
        assert_eq!(report["cold"]["exit_code"], 0);
        assert_eq!(report["warm"]["exit_code"], 0);
        assert!(report["failure"].is_null());
    }

    #[test]
    fn text_output_reports_pass() {
        let ws = Workspace::new(FAKE_GRADLE);
        ws.run()
            .assert()
            .success()
            .stdout(predicate::str::contains("PASSED fake-plugin"));
    }

    #[test]
    fn warm_run_without_reuse_fails() {
        let ws = Workspace::new(NO_REUSE_GRADLE);
        let out = ws
            .run()
            .args(["--format", "json"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Reusing configuration cache"))
            .get_output()
            .stdout
            .clone();

        let report = json(&out);
        assert_eq!(report["passed"], false);
        assert_eq!(report["state"], "warm_run_executed");
        assert_eq!(report["failure"]["kind"], "expectation");
    }

    #[test]
    fn cold_run_with_problems_fails() {
        let ws = Workspace::new(PROBLEMS_GRADLE);
        let out = ws
            .run()
            .args(["--format", "json"])
            .assert()
            .failure()
            .get_output()
            .stdout
            .clone();

        let report = json(&out);
        assert_eq!(report["state"], "cold_run_executed");
        assert_eq!(report["failure"]["kind"], "non_zero_exit");
        assert!(report["warm"].is_null());
    }

    const ONE_SECOND_LIMIT: &str = "[general]\njournal = false\n\n[runner]\ntimeout_secs = 1\n";

    #[test]
    fn configured_timeout_stops_slow_run() {
        let ws = Workspace::new(SLOW_GRADLE).with_config(ONE_SECOND_LIMIT);
        let out = ws
            .run()
            .args(["--format", "json"])
            .assert()
            .failure()
            .get_output()
            .stdout
            .clone();

        assert_eq!(json(&out)["failure"]["kind"], "timeout");
    }

    #[test]
    fn zero_timeout_overrides_configured_timeout() {
        let ws = Workspace::new(SLOW_GRADLE).with_config(ONE_SECOND_LIMIT);
        let out = ws
            .run()
            .args(["--timeout", "0", "--format", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let report = json(&out);
        assert_eq!(report["passed"], true);
        assert!(report["failure"].is_null());
    }

    #[test]
    fn keep_leaves_fixture_on_disk() {
        let ws = Workspace::new(FAKE_GRADLE);
        let out = ws
            .run()
            .args(["--format", "json", "--keep"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let report = json(&out);
        let fixture = Path::new(report["fixture"].as_str().unwrap()).to_path_buf();
        assert!(fixture.join("build.gradle.kts").exists());
        assert!(fixture.join("gradle.properties").exists());
        assert!(fixture.join(".cc-entry").exists());
        std::fs::remove_dir_all(fixture).unwrap();
    }

    #[test]
    fn missing_executable_is_a_launch_failure() {
        let ws = Workspace::new(FAKE_GRADLE);
        let mut cmd = cargo_bin_cmd!("cachecheck");
        cmd.current_dir(ws.dir.path())
            .arg("--no-local")
            .arg("--config")
            .arg(ws.path("config.toml"))
            .arg("run")
            .arg(ws.path("scenario.toml"))
            .arg("--executable")
            .arg(ws.path("no-such-gradle"))
            .args(["--format", "json"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("\"launch\""));
    }
}
