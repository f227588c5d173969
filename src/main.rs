use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;

use line_runner_rs::drivers::AbortChannel;
use line_runner_rs::report::{Delivery, ReportTarget};
use line_runner_rs::sim::{SimConfig, SimPlatform};
use line_runner_rs::{ChallengeLayout, Outcome, Program, Robot, RunnerConfig, Session};

#[derive(Parser, Debug)]
#[command(name = "line_runner")]
#[command(about = "Grid route runner for a line-following robot (simulated platform)", long_about = None)]
struct Args {
    /// Challenge layout JSON
    #[arg(long)]
    layout: PathBuf,

    /// Route program JSON
    #[arg(long)]
    program: PathBuf,

    /// Tuning overrides (JSON, any subset of sections)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of runs to execute back to back
    #[arg(long, default_value = "1")]
    runs: u32,

    /// Fire the abort signal this many ms into the simulation
    #[arg(long)]
    abort_after_ms: Option<u64>,

    /// Pace the simulation to the wall clock
    #[arg(long)]
    realtime: bool,

    /// Write each run report here (.gz to compress)
    #[arg(long, conflicts_with = "report_url")]
    report_file: Option<PathBuf>,

    /// POST each run report to this URL
    #[arg(long)]
    report_url: Option<String>,

    /// Room identifier sent with reports
    #[arg(long)]
    room: Option<String>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S%.3f").to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let config = match &args.config {
        Some(path) => RunnerConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RunnerConfig::default(),
    };
    let layout = ChallengeLayout::from_file(&args.layout)
        .with_context(|| format!("loading layout {}", args.layout.display()))?;
    let program = Program::from_file(&args.program)
        .with_context(|| format!("loading program {}", args.program.display()))?;

    for issue in program.validate_against(&layout) {
        log::warn!("[route] {}", issue);
    }

    let room = args.room.clone().unwrap_or_else(|| config.report.room.clone());
    let target = match (&args.report_file, &args.report_url) {
        (Some(path), _) => ReportTarget::File(path.clone()),
        (None, Some(url)) => {
            ReportTarget::http(url.clone(), Duration::from_secs(config.report.http_timeout_secs))?
        }
        (None, None) => ReportTarget::None,
    };

    println!("[{}] Line Runner Starting", ts_now());
    println!("  Layout: {}", args.layout.display());
    println!("  Program: {} ({} steps)", args.program.display(), program.steps.len());
    println!("  Runs: {}", args.runs);
    println!("  Room: {}", room);

    let abort = AbortChannel::new();
    let trigger = abort.trigger();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if trigger.is_pending() {
                log::warn!("[main] Second Ctrl-C before the abort was handled, exiting");
                std::process::exit(130);
            }
            log::warn!("[main] Ctrl-C, aborting current run");
            trigger.fire();
        }
    });

    let sim = SimPlatform::new(SimConfig {
        abort_at_ms: args.abort_after_ms,
        realtime: args.realtime,
        ..SimConfig::default()
    })
    .with_abort_channel(abort);
    let mut session = Session::new(Robot::new(sim, config), layout, program);

    session = tokio::task::spawn_blocking(move || {
        session.power_on();
        session
    })
    .await
    .context("power-on task failed")?;

    let mut tally = [0u32; 3];
    for _ in 0..args.runs {
        let (returned, outcome) = tokio::task::spawn_blocking(move || {
            let outcome = session.run_once();
            (session, outcome)
        })
        .await
        .context("run task failed")?;
        session = returned;

        println!(
            "[{}] Run {}: {:?} at {:?}",
            ts_now(),
            session.runs_started(),
            outcome,
            session.run_state().pose
        );
        match outcome {
            Outcome::Victory => tally[0] += 1,
            Outcome::Defeat => tally[1] += 1,
            Outcome::Aborted | Outcome::Continue => tally[2] += 1,
        }

        // Aborted runs keep their actions for the next successful delivery.
        if outcome == Outcome::Aborted {
            continue;
        }
        if let Some(report) = session.pending_report(&room) {
            match target.deliver(&report).await {
                Ok(Delivery::Delivered) => session.confirm_delivery(),
                Ok(Delivery::Retained) => {}
                Err(e) => log::warn!("[report] {}; keeping {} actions", e, report.actions.len()),
            }
        }
    }

    println!(
        "[{}] Done: {} victory, {} defeat, {} aborted",
        ts_now(),
        tally[0],
        tally[1],
        tally[2]
    );
    Ok(())
}
