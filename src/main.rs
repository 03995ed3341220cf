//! Pathweave CLI - replay packet-arrival traces through the adaptive router.

use clap::Parser;
use colored::Colorize;

use pathweave::cli::*;
use pathweave::config::{init_logging, Config, LoggingConfig};
use pathweave::engine::{Engine, NullTransmitter};
use pathweave::error::Result;
use pathweave::metrics::RunSummary;
use pathweave::trace::{last_arrival, load_trace};
use pathweave::types::SimTime;
use pathweave::VERSION;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Initialize logging
    let log_config = LoggingConfig {
        level: cli.log_level.clone(),
        color: !cli.no_color,
        ..Default::default()
    };
    init_logging(&log_config)?;

    match cli.command {
        Commands::Run(args) => run_trace(args, load_config(cli.config.as_ref())?),
        Commands::Config(args) => run_config(args),
        Commands::Validate => run_validate(cli.config.as_ref()),
    }
}

/// Load the configuration from an explicit path, the default location, or
/// built-in defaults.
fn load_config(path: Option<&std::path::PathBuf>) -> Result<Config> {
    if let Some(path) = path {
        Config::load(path)
    } else if Config::default_path().exists() {
        Config::load(Config::default_path())
    } else {
        Ok(Config::default())
    }
}

/// Replay a trace
fn run_trace(args: RunArgs, mut config: Config) -> Result<()> {
    if let Some(paths) = args.paths {
        config.router.paths = paths;
    }
    if args.seed.is_some() {
        config.router.seed = args.seed;
    }

    let records = load_trace(&args.trace)?;
    let end = args
        .until
        .map(SimTime::from_duration)
        .or_else(|| last_arrival(&records))
        .unwrap_or(SimTime::ZERO);

    let mut engine = Engine::new(config.router, NullTransmitter)?;
    for record in records {
        engine.schedule(record.at, record.packet);
    }
    let summary = engine.run_until(end)?;

    if args.json {
        println!("{}", summary.to_json()?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{}",
        "╔══════════════════════════════════════════╗".bright_cyan()
    );
    println!(
        "{}",
        format!("║     PATHWEAVE RUN SUMMARY  v{VERSION:<13}║").bright_cyan()
    );
    println!(
        "{}",
        "╚══════════════════════════════════════════╝".bright_cyan()
    );
    println!();

    let c = &summary.counters;
    println!("  {} {}", "Ended at:".bright_white(), summary.ended_at);
    println!(
        "  {} {} observed, {} active",
        "Flows:".bright_white(),
        summary.flows_observed,
        summary.active_flows
    );
    println!("  {} {}", "Routed:".bright_white(), c.routed.to_string().green());

    let dropped = c.dropped().to_string();
    let dropped = if c.dropped() > 0 { dropped.red() } else { dropped.normal() };
    println!("  {} {}", "Dropped:".bright_white(), dropped);
    println!(
        "  {} {} packets, {} bytes",
        "Trimmed:".bright_white(),
        c.trimmed,
        c.trimmed_bytes
    );
    println!(
        "  {} adaptive {}, round-robin {}, load-balanced {}",
        "Decisions:".bright_white(),
        c.adaptive_decisions,
        c.round_robin_decisions,
        c.load_balanced_decisions
    );
    println!();

    println!("{}", "Paths:".bright_white().bold());
    for p in &summary.paths {
        let failures = if p.failure_count > 0 {
            p.failure_count.to_string().yellow()
        } else {
            p.failure_count.to_string().green()
        };
        println!(
            "  {} {:>3}  utilization {:>7.4}  failures {}",
            "●".cyan(),
            p.path,
            p.final_utilization,
            failures
        );
    }
}

/// Show example configuration
fn run_config(args: ConfigArgs) -> Result<()> {
    let config = Config::example();

    if let Some(ref path) = args.output {
        config.save(path)?;
        println!(
            "{} Configuration written to {}",
            "✓".green(),
            path.display()
        );
    } else {
        let output = toml::to_string_pretty(&config)
            .map_err(|e| pathweave::Error::Config(e.to_string()))?;
        println!("{output}");
    }

    Ok(())
}

/// Validate a configuration file
fn run_validate(path: Option<&std::path::PathBuf>) -> Result<()> {
    let config = load_config(path)?;
    config.validate()?;
    println!(
        "{} Configuration valid ({} paths)",
        "✓".green(),
        config.router.paths
    );
    Ok(())
}
