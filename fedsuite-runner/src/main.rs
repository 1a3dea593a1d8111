//! Federation suite runner
//!
//! Prepares the five instances, runs the scenario catalog sequentially,
//! prints a report and exits non-zero on regressions or when a known bug
//! stops reproducing.

use anyhow::Context;
use clap::Parser;
use fedsuite_core::config::LoggingConfig;
use fedsuite_core::SuiteConfig;
use fedsuite_harness::teardown::suite_teardown;
use fedsuite_harness::{ConvergenceWaiter, InstanceRegistry, ScenarioFilter, ScenarioRunner};
use fedsuite_runner::{catalog, setup_suite};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Federation consistency suite
#[derive(Parser)]
#[command(name = "fedsuite")]
#[command(about = "Run federation scenarios against a set of forum instances")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long)]
    config: Option<String>,

    /// Override the log level (e.g. debug, info)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Only run scenarios carrying this tag (repeatable)
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Only run the scenario with this id (repeatable)
    #[arg(long = "scenario")]
    scenarios: Vec<String>,

    /// List the selected scenarios and exit
    #[arg(long)]
    list: bool,

    /// Print the suite result as JSON instead of the text report
    #[arg(long)]
    json: bool,

    /// Skip the unfollow and purge sweep after the run
    #[arg(long)]
    skip_teardown: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => SuiteConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => SuiteConfig::load().context("Failed to load configuration")?,
    };
    apply_cli_overrides(&mut config, &cli);
    init_tracing(&config.logging);

    info!(instances = config.instances.len(), "Configuration loaded successfully");

    let filter = ScenarioFilter {
        ids: cli.scenarios.clone(),
        tags: cli.tags.clone(),
    };

    if cli.list {
        for scenario in catalog().iter().filter(|s| filter.matches(s)) {
            println!("{:<36} [{}] {}", scenario.id, scenario.tags.join(","), scenario.description);
        }
        return Ok(());
    }

    let mut registry = InstanceRegistry::from_config(&config)?;
    let setup = setup_suite(&mut registry, &config).await.map_err(|e| {
        error!("Suite setup failed: {}", e);
        e
    })?;

    let mut runner = ScenarioRunner::new(setup.sessions.clone(), &config);
    runner.add_scenarios(catalog());
    let suite = runner.run(&filter).await;

    if cli.skip_teardown {
        info!("Skipping suite teardown");
    } else {
        let errors = suite_teardown(&ConvergenceWaiter::propagation(&config), &setup.sessions).await;
        if !errors.is_empty() {
            warn!(failures = errors.len(), "Suite teardown left state behind");
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&suite)?);
    } else {
        println!("{}", suite);
    }

    std::process::exit(suite.exit_code());
}

fn apply_cli_overrides(config: &mut SuiteConfig, cli: &Cli) {
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.format = "json".to_string();
    }
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.level.as_str().into());
    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    fn test_cli_filters() {
        let cli = Cli::parse_from([
            "fedsuite",
            "--tag",
            "post",
            "--tag",
            "comment",
            "--scenario",
            "post_create",
            "--list",
        ]);
        assert_eq!(cli.tags, vec!["post", "comment"]);
        assert_eq!(cli.scenarios, vec!["post_create"]);
        assert!(cli.list);
        assert!(!cli.json);
    }

    #[test]
    #[serial]
    fn test_cli_overrides_environment() {
        env::set_var("FEDSUITE_LOGGING__LEVEL", "warn");
        let mut config = SuiteConfig::load().unwrap();
        env::remove_var("FEDSUITE_LOGGING__LEVEL");
        assert_eq!(config.logging.level, "warn");

        let cli = Cli::parse_from(["fedsuite", "--log-level", "debug", "--json-logs"]);
        apply_cli_overrides(&mut config, &cli);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    #[serial]
    fn test_config_level_kept_without_flag() {
        let mut config = SuiteConfig::default();
        let cli = Cli::parse_from(["fedsuite"]);
        apply_cli_overrides(&mut config, &cli);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
    }
}
