//! cadsim CLI - Run and inspect synthetic patient simulations
//!
//! Runs are rule-only unless a recorded oracle transcript is supplied with
//! `--replay`; every day is written to `<log_dir>/<run_id>/day_<N>.json`.

mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use cadsim::config::{EventsPerDay, LlmSettings};
use cadsim::{
    parse_transcript, DailySnapshot, DepressionLevel, FileSnapshotRepository, FinalReport,
    LlmOracle, ReplayOracle, RunStatus, Scenario, SimulationDriver, SnapshotRepository,
};
use config::Config;

#[derive(Parser)]
#[command(name = "cadsim")]
#[command(about = "cadsim - Cognitive-affective dynamics simulation", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.config/cadsim/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario
    Run {
        /// Scenario JSON (falls back to default_scenario from config)
        scenario: Option<PathBuf>,
        /// RNG seed
        #[arg(short, long)]
        seed: Option<u64>,
        /// Number of simulated days
        #[arg(short, long)]
        days: Option<u32>,
        /// Generated events per day, as "N" or "MIN-MAX"
        #[arg(short, long)]
        events: Option<String>,
        /// Directory for run logs
        #[arg(short, long)]
        log_dir: Option<PathBuf>,
        /// Oracle transcript to replay for the LLM subsystems
        #[arg(short, long)]
        replay: Option<PathBuf>,
        /// Remove stochastic noise (personality term only)
        #[arg(long)]
        deterministic: bool,
    },

    /// Validate a scenario file
    Validate {
        /// Scenario JSON
        scenario: PathBuf,
    },

    /// Show a finished run
    Show {
        /// Run id
        run_id: Uuid,
        /// Print the full snapshot of one day
        #[arg(short, long)]
        day: Option<u32>,
        /// Directory for run logs
        #[arg(short, long)]
        log_dir: Option<PathBuf>,
    },

    /// Show current configuration
    Config {
        /// Write the defaults to the config file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            scenario,
            seed,
            days,
            events,
            log_dir,
            replay,
            deterministic,
        } => {
            let options = RunOptions {
                seed,
                days,
                events,
                log_dir,
                replay,
                deterministic,
            };
            cmd_run(config, scenario, options).await
        }
        Commands::Validate { scenario } => cmd_validate(&scenario),
        Commands::Show { run_id, day, log_dir } => cmd_show(config, run_id, day, log_dir).await,
        Commands::Config { init } => cmd_config(config, cli.config.as_deref(), init),
    }
}

// ============================================
// Command Implementations
// ============================================

struct RunOptions {
    seed: Option<u64>,
    days: Option<u32>,
    events: Option<String>,
    log_dir: Option<PathBuf>,
    replay: Option<PathBuf>,
    deterministic: bool,
}

async fn cmd_run(config: Config, scenario: Option<PathBuf>, options: RunOptions) -> Result<()> {
    let scenario_path = config
        .scenario_path(scenario)
        .context("No scenario given and no default_scenario configured")?;
    let scenario = load_scenario(&scenario_path)?;

    let mut sim = config.simulation;
    if let Some(seed) = options.seed {
        sim.seed = seed;
    }
    if let Some(days) = options.days {
        sim.total_days = days;
    }
    if let Some(events) = options.events.as_deref() {
        sim.events_per_day = parse_events(events)?;
    }
    if let Some(log_dir) = options.log_dir {
        sim.log_dir = log_dir;
    }
    if options.deterministic {
        sim = sim.deterministic();
    }

    let oracle: Option<Arc<dyn LlmOracle>> = match &options.replay {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read transcript: {:?}", path))?;
            let entries = parse_transcript(&text)
                .with_context(|| format!("Invalid transcript: {:?}", path))?;
            println!("{} Replaying {} oracle responses", "↺".cyan(), entries.len());
            Some(Arc::new(ReplayOracle::new(entries)))
        }
        None => {
            if sim.llm.any_enabled() {
                println!("{}", "No oracle transcript given; running rule-only.".dimmed());
            }
            sim.llm = LlmSettings::disabled();
            None
        }
    };

    let repository = Arc::new(FileSnapshotRepository::new(&sim.log_dir));
    let log_dir = sim.log_dir.clone();
    let driver = SimulationDriver::new(Arc::new(scenario), sim, repository, oracle)
        .context("Could not start the simulation")?;
    let run_id = driver.run_id();

    println!(
        "{} Run {} -> {}",
        "▶".green(),
        run_id.to_string().cyan(),
        log_dir.join(run_id.to_string()).display()
    );

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Interrupt received, stopping after the current step");
            let _ = cancel_tx.send(true);
        }
    });

    let outcome = driver.run(Some(cancel_rx)).await?;

    for snapshot in &outcome.snapshots {
        print_day(snapshot);
    }
    println!();

    match &outcome.status {
        RunStatus::Completed => println!("{} {}", "✓".green(), outcome.status),
        RunStatus::Incomplete { .. } => println!("{} {}", "!".yellow(), outcome.status),
        RunStatus::Cancelled { .. } => println!("{} {}", "✗".red(), outcome.status),
    }
    if let Some(report) = &outcome.final_report {
        print_report(report);
    }
    if outcome.llm_failures.total() > 0 {
        println!(
            "  LLM fallbacks: {} (assessor {}, timeouts {}, generator {}, analysis {})",
            outcome.llm_failures.total().to_string().yellow(),
            outcome.llm_failures.assessor_degraded,
            outcome.llm_failures.assessor_timeouts,
            outcome.llm_failures.generator_fallbacks,
            outcome.llm_failures.analysis_failures
        );
    }

    Ok(())
}

fn cmd_validate(path: &Path) -> Result<()> {
    let scenario = load_scenario(path)?;

    println!("{} {} is valid", "✓".green(), path.display());
    println!("  Scenario: {}", scenario.scenario_name.cyan().bold());
    if let Some(protagonist) = scenario.protagonist() {
        println!(
            "  Protagonist: {} ({}, {})",
            protagonist.name.cyan(),
            protagonist.age,
            protagonist.role.dimmed()
        );
    }
    println!(
        "  Characters: {}, relationships: {}",
        scenario.characters.len(),
        scenario.relationships.len()
    );
    let stages: Vec<&str> = scenario.stage_config.iter().map(|s| s.name.as_str()).collect();
    println!("  Stages: {}", stages.join(" → "));
    println!(
        "  Templates: {} categories, {} conditional rules",
        scenario.event_templates.len(),
        scenario.conditional_events.len()
    );

    Ok(())
}

async fn cmd_show(
    config: Config,
    run_id: Uuid,
    day: Option<u32>,
    log_dir: Option<PathBuf>,
) -> Result<()> {
    let log_dir = log_dir.unwrap_or(config.simulation.log_dir);
    let repository = FileSnapshotRepository::new(&log_dir);

    if let Some(day) = day {
        let snapshot = repository
            .load_snapshot(run_id, day)
            .await?
            .with_context(|| format!("Day {} of run {} not found", day, run_id))?;
        println!("{}", snapshot.to_json_pretty()?);
        return Ok(());
    }

    let days = repository.list_days(run_id).await?;
    if days.is_empty() {
        bail!("No snapshots for run {} under {:?}", run_id, log_dir);
    }

    println!("{} {}", "Run".bold(), run_id.to_string().cyan());
    for day in days {
        if let Some(snapshot) = repository.load_snapshot(run_id, day).await? {
            print_day(&snapshot);
        }
    }

    match repository.load_final_report(run_id).await? {
        Some(report) => {
            println!();
            println!("{} {}", "Status:".bold(), report.simulation_metadata.status);
            print_report(&report);
        }
        None => println!("\n{}", "No final report (run unfinished or cancelled)".yellow()),
    }

    Ok(())
}

fn cmd_config(config: Config, path: Option<&Path>, init: bool) -> Result<()> {
    if init {
        let written = config.save()?;
        println!("{} Config written to {:?}", "✓".green(), written);
        return Ok(());
    }

    let path = match path {
        Some(p) => p.to_path_buf(),
        None => Config::config_path()?,
    };
    let sim = &config.simulation;

    println!("{}", "Configuration:".bold());
    println!(
        "  Path: {:?}{}",
        path,
        if path.exists() {
            String::new()
        } else {
            " (not found, using defaults)".dimmed().to_string()
        }
    );
    println!(
        "  Default scenario: {}",
        config
            .default_scenario
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "None".to_string())
            .cyan()
    );
    println!("  Seed: {}, days: {}", sim.seed, sim.total_days);
    println!(
        "  Events per day: {}-{}",
        sim.events_per_day.min, sim.events_per_day.max
    );
    println!(
        "  LLM: assessor {}, generator {}, analysis {} (timeout {}s)",
        on_off(sim.llm.assessor_enabled),
        on_off(sim.llm.generator_enabled),
        on_off(sim.llm.analysis_enabled),
        sim.llm.timeout_secs
    );
    println!(
        "  Fusion: w_rule {}, w_llm {}, nonlinear {}",
        sim.fusion.w_rule,
        sim.fusion.w_llm,
        on_off(sim.fusion.nonlinear_enabled)
    );
    println!(
        "  Stochastic: sigma {}, p_extreme {}",
        sim.stochastic.sigma, sim.stochastic.p_extreme
    );
    println!("  Log dir: {:?}", sim.log_dir);

    Ok(())
}

// ============================================
// Helpers
// ============================================

fn load_scenario(path: &Path) -> Result<Scenario> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario: {:?}", path))?;
    Scenario::from_json_str(&text).with_context(|| format!("Invalid scenario: {:?}", path))
}

/// Parse "N" or "MIN-MAX"
fn parse_events(value: &str) -> Result<EventsPerDay> {
    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .with_context(|| format!("Invalid event count: '{}'", s))
    };
    let range = match value.split_once('-') {
        Some((min, max)) => EventsPerDay { min: parse(min)?, max: parse(max)? },
        None => EventsPerDay::fixed(parse(value)?),
    };
    if range.min > range.max {
        bail!("Event range {}-{} is empty", range.min, range.max);
    }
    Ok(range)
}

fn level_colored(level: DepressionLevel) -> ColoredString {
    let name = level.to_string();
    if level <= DepressionLevel::MinimalSymptoms {
        name.green()
    } else if level <= DepressionLevel::Moderate {
        name.yellow()
    } else {
        name.red()
    }
}

fn on_off(enabled: bool) -> ColoredString {
    if enabled { "on".green() } else { "off".dimmed() }
}

fn print_day(snapshot: &DailySnapshot) {
    let m = &snapshot.protagonist.current_mental_state;
    println!(
        "  {} {} {} / {} stress {} events {}",
        format!("day {:>2}", snapshot.day).bold(),
        format!("[{}]", snapshot.stage).dimmed(),
        level_colored(m.depression_level),
        m.emotion,
        m.stress_level,
        snapshot.events.len()
    );
}

fn print_report(report: &FinalReport) {
    let journey = &report.protagonist_journey;
    println!("  {} {}", "Start:".dimmed(), journey.initial_state);
    println!("  {} {}", "End:".dimmed(), journey.final_state);
    if !journey.symptoms.is_empty() {
        println!("  {} {}", "Symptoms:".dimmed(), journey.symptoms.join(", "));
    }
    if !journey.risk_factors.is_empty() {
        println!("  {} {}", "Risk factors:".dimmed(), journey.risk_factors.join(", ").red());
    }
    println!(
        "  {} {}",
        "Significant events:".dimmed(),
        report.significant_events.len()
    );
    if let Some(analysis) = &report.ai_analysis {
        println!("\n{}\n{}", "Analysis:".bold(), analysis);
    }
}
