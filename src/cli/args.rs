//! CLI argument definitions using clap derive

use clap::{ArgAction, ArgGroup, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// cachecheck - configuration cache checks for build-tool plugins
///
/// Builds a throwaway project, runs the build tool twice with the
/// configuration cache enabled and checks that the first run stores a clean
/// cache entry and the second run reuses it.
#[derive(Parser, Debug)]
#[command(name = "cachecheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CACHECHECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .cachecheck.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a cold/warm configuration cache scenario
    Run(RunArgs),

    /// Write a sample scenario file
    Init(InitArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["scenario", "preset"])))]
pub struct RunArgs {
    /// Scenario file (TOML)
    pub scenario: Option<PathBuf>,

    /// Built-in scenario to run instead of a file
    #[arg(long, value_parser = clap::builder::PossibleValuesParser::new(crate::scenario::presets::PRESETS.iter().copied()))]
    pub preset: Option<String>,

    /// Plugin id for the preset's build file
    #[arg(long, requires = "preset")]
    pub plugin_id: Option<String>,

    /// Plugin version for the preset's build file
    #[arg(long, requires = "preset")]
    pub plugin_version: Option<String>,

    /// Build tool executable (overrides runner.executable)
    #[arg(long)]
    pub executable: Option<PathBuf>,

    /// Per-invocation timeout in seconds (0 = none)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Additional environment variables for the build tool (KEY=VALUE)
    #[arg(short, long, value_parser = parse_env_var)]
    pub env: Vec<(String, String)>,

    /// Keep the fixture directory after the run
    #[arg(short, long)]
    pub keep: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Overwrite an existing scenario file
    #[arg(short, long)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(short, long)]
    pub path: Option<PathBuf>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for the run report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable steps
    Text,
    /// JSON report on stdout
    Json,
}

/// Parse environment variable in KEY=VALUE format
fn parse_env_var(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE format: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}
