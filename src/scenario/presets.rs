//! Built-in scenarios

use super::ConfigCacheScenario;
use crate::expect::{DiagnosticContract, ExpectationSet};
use crate::fixture::{FixtureSpec, Properties};

/// Plugin exercised by [`rewrite_dry_run`] unless overridden
pub const REWRITE_PLUGIN_ID: &str = "org.openrewrite.rewrite";

/// Names accepted by `--preset`
pub const PRESETS: &[&str] = &["rewrite-dry-run"];

/// Look up a preset by name
pub fn by_name(
    name: &str,
    plugin_id: Option<&str>,
    plugin_version: Option<&str>,
    contract: &DiagnosticContract,
) -> Option<ConfigCacheScenario> {
    match name {
        "rewrite-dry-run" => Some(rewrite_dry_run(
            plugin_id.unwrap_or(REWRITE_PLUGIN_ID),
            plugin_version,
            contract,
        )),
        _ => None,
    }
}

/// `check` depends on two plain tasks and the plugin's `rewriteDryRun`.
///
/// Without `plugin_version` the plugin must already be resolvable, e.g.
/// published to Maven local.
pub fn rewrite_dry_run(
    plugin_id: &str,
    plugin_version: Option<&str>,
    contract: &DiagnosticContract,
) -> ConfigCacheScenario {
    let fixture = FixtureSpec::new()
        .settings_file(settings_file())
        .build_file(build_file(plugin_id, plugin_version))
        .properties(&Properties::new().with_configuration_cache(true));

    ConfigCacheScenario::new("rewrite-dry-run", fixture, contract)
        .task("check")
        .cold_rules(
            ExpectationSet::new()
                .contains("Running unit tests...")
                .contains("Integration tests succeeded"),
        )
}

fn settings_file() -> String {
    r#"pluginManagement {
    repositories {
        mavenLocal()
        gradlePluginPortal()
    }
}

rootProject.name = "cachecheck-fixture"
"#
    .to_string()
}

fn build_file(plugin_id: &str, plugin_version: Option<&str>) -> String {
    let plugin = match plugin_version {
        Some(version) => format!("id(\"{}\") version \"{}\"", plugin_id, version),
        None => format!("id(\"{}\")", plugin_id),
    };

    format!(
        r#"plugins {{
    {plugin}
}}

group = "org.example"
version = "1.0-SNAPSHOT"

repositories {{
    mavenLocal()
    mavenCentral()
    maven {{
        url = uri("https://central.sonatype.com/repository/maven-snapshots")
    }}
}}

tasks.register("test") {{
    doLast {{
        println("Running unit tests...")
        Thread.sleep(1_000L)
        println("Unit tests succeeded")
    }}
}}

tasks.register("integrationTest") {{
    doLast {{
        println("Running integration tests...")
        Thread.sleep(1_000L)
        println("Integration tests succeeded")
    }}
}}

tasks.register("check") {{
    dependsOn("test", "integrationTest", "rewriteDryRun")
}}
"#
    )
}
