//! pu - refresh security prices from rate-limited feeds
//!
//! CLI entry point for planning and running refreshes.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use eyre::{Context, Result};
use serde::Serialize;
use tracing::info;

use priceupdate::cli::{Cli, Command, OutputFormat, get_log_path};
use priceupdate::config::Config;
use priceupdate::domain::{UpdateRequest, UpdateStatus};
use priceupdate::plan::{TaskOutcome, UpdatePlan};
use priceupdate::scheduler::GroupSnapshot;
use priceupdate::worker::{UpdateSummary, run_update};

fn setup_logging(verbose: bool) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Write to the log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        "Loaded config: feeds={}, max-parallel={}",
        config.feeds.len(),
        config.scheduler.max_parallel
    );

    match cli.command {
        Some(Command::Plan { format }) => cmd_plan(&config, format).await,
        Some(Command::Run { rounds, format }) => cmd_run(&config, rounds, format).await,
        Some(Command::Config) => cmd_config(&config),
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Show groups and capacity
async fn cmd_plan(config: &Config, format: OutputFormat) -> Result<()> {
    let plan = UpdatePlan::from_config(config);
    let scheduler = plan.scheduler();
    let groups = scheduler.snapshot().await;

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "tasks": plan.len(),
                "capacity": scheduler.total_capacity(),
                "groups": groups,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("{} tasks in {} groups", plan.len(), groups.len());
            println!("Worker capacity: {}", scheduler.total_capacity());
            println!();
            for group in &groups {
                println!(
                    "  {:<16} tasks: {:>4}  max workers: {}  rate-limit attempts: {}",
                    group.id, group.total, group.max_worker, group.attempts_left
                );
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct RoundReport {
    round: u32,
    summary: UpdateSummary,
    tasks: Vec<TaskOutcome>,
}

/// Execute one or more refreshes
async fn cmd_run(config: &Config, rounds: u32, format: OutputFormat) -> Result<()> {
    let plan = UpdatePlan::from_config(config);
    let mut reports = Vec::new();

    for round in 1..=rounds.max(1) {
        info!(round, tasks = plan.len(), "Starting round");
        let scheduler = Arc::new(plan.scheduler());
        let request = Arc::new(UpdateRequest::new());
        let summary = run_update(scheduler, request)
            .await
            .context(format!("Refresh round {} failed", round))?;

        let report = RoundReport {
            round,
            summary,
            tasks: plan.outcomes(),
        };
        if format == OutputFormat::Text {
            print_round(&report);
        }
        reports.push(report);
    }

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    Ok(())
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}

fn print_round(report: &RoundReport) {
    let summary = &report.summary;
    println!(
        "{} {} ({} tasks, {} workers, {})",
        "Round".bold(),
        report.round,
        report.tasks.len(),
        summary.workers.len(),
        format_duration(Some(summary.elapsed))
    );

    for task in &report.tasks {
        let status = match task.status {
            UpdateStatus::Modified => task.status.to_string().green(),
            UpdateStatus::Error => task.status.to_string().red(),
            status if !status.is_terminal() => status.to_string().yellow(),
            status => status.to_string().normal(),
        };
        let message = task.message.as_deref().unwrap_or("");
        println!(
            "  {:<10} {:<10} {:<24} {:<10} {:>9}  {}",
            task.group,
            task.kind,
            task.name,
            status,
            format_duration(task.duration),
            message
        );
    }

    println!();
    for group in &summary.groups {
        print_group(group);
    }
    println!(
        "  rate limited: {}  abandoned: {}  drained workers: {}  data changed: {}",
        summary.stats.total_rate_limited,
        summary.stats.total_abandoned,
        summary.stats.drained_workers,
        if summary.dirty { "yes".green() } else { "no".normal() }
    );
    println!();
}

fn print_group(group: &GroupSnapshot) {
    let name = if group.abandoned > 0 {
        group.id.red()
    } else {
        group.id.cyan()
    };
    println!(
        "  {:<16} finished: {}/{}  abandoned: {}  in progress: {}  max: {}  mean: {}  attempts left: {}",
        name,
        group.finished,
        group.total,
        group.abandoned,
        group.in_progress(),
        format_duration(group.max_duration),
        format_duration(group.mean_duration),
        group.attempts_left
    );
}

fn format_duration(duration: Option<Duration>) -> String {
    match duration {
        Some(d) if d.as_secs() > 0 => format!("{:.2}s", d.as_secs_f64()),
        Some(d) => format!("{}ms", d.as_millis()),
        None => "-".to_string(),
    }
}
