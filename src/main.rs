//! clustermon - check which nodes of a cluster are running
//!
//! Quick start:
//!   clustermon -c cluster.toml monitor all
//!   clustermon -c cluster.toml coordinator master coord1
//!   clustermon -c cluster.toml             # read commands from stdin

use anyhow::{Context, Result};
use clap::Parser;
use clustermon::logging::{self, LogConfig};
use clustermon::{shell, ClusterConfig, ConsoleReporter, Monitor, NetworkProbe};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use tracing::info;

const PROMPT: &str = "clustermon> ";

/// Liveness monitor for GTM, GTM proxies, coordinators and data nodes
#[derive(Parser)]
#[command(name = "clustermon")]
#[command(author = "Jerry")]
#[command(version)]
#[command(about = "Check which nodes of a cluster are running", long_about = None)]
struct Cli {
    /// Path to the cluster configuration file (TOML format)
    #[arg(short, long, env = "CLUSTERMON_CONFIG", default_value = "cluster.toml")]
    config: PathBuf,

    /// Log level, overrides the configuration file
    #[arg(long)]
    log_level: Option<String>,

    /// Monitor command, e.g. `monitor datanode slave dn1`. Reads commands
    /// from stdin when omitted.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn main() -> Result<()> {
    better_panic::install();

    let cli = Cli::parse();

    let config = ClusterConfig::from_file(&cli.config).with_context(|| {
        format!(
            "Failed to load cluster configuration '{}'",
            cli.config.display()
        )
    })?;

    logging::init(&LogConfig::from_config(
        config.logging(),
        cli.log_level.as_deref(),
    ));
    info!("Using configuration {}", cli.config.display());

    let probe = NetworkProbe::new(config.probe().clone());
    let mut reporter = ConsoleReporter::stdout();
    let mut monitor = Monitor::new(&config, &probe, &mut reporter);

    if !cli.command.is_empty() {
        monitor.execute(&cli.command.join(" "));
        return Ok(());
    }

    let stdin = io::stdin();
    let prompt = if stdin.is_terminal() {
        Some((PROMPT, io::stdout()))
    } else {
        None
    };
    shell::run(&mut monitor, stdin.lock(), prompt)?;

    Ok(())
}
