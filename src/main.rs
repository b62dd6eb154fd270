use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use workout_autopilot::config::MAX_WINDOW_DAYS;
use workout_autopilot::{
  db, ClaudeClient, Engine, EngineConfig, EngineError, GoogleCalendar, Wearables,
};

#[derive(Parser)]
#[command(name = "autopilot", version, about = "Plans workouts into your calendar and keeps them honest")]
struct Cli {
  /// Run every decision but make no calendar or audit-store writes
  #[arg(long, global = true)]
  dry_run: bool,

  /// Also write the JSON report to this file
  #[arg(long, global = true)]
  report: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Plan upcoming days
  Plan {
    #[arg(long, default_value_t = 3, value_parser = day_count())]
    days: u32,
  },
  /// Reconcile past workouts, clear upcoming conflicts, then adapt today
  Reconcile {
    #[arg(long, default_value_t = 7, value_parser = day_count())]
    days: u32,
    /// Reprocess workouts that were already reconciled
    #[arg(long)]
    force: bool,
  },
  /// Delete upcoming workouts that overlap other events
  Conflicts {
    #[arg(long, default_value_t = 7, value_parser = day_count())]
    days: u32,
  },
  /// Flag today's workouts for the backup plan if health is poor
  Adapt,
}

fn day_count() -> clap::builder::RangedI64ValueParser<u32> {
  clap::value_parser!(u32).range(1..=i64::from(MAX_WINDOW_DAYS))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  match run(cli).await {
    Ok(code) => code,
    Err(e) => {
      tracing::error!(error = %e, "autopilot failed");
      ExitCode::FAILURE
    }
  }
}

async fn run(cli: Cli) -> Result<ExitCode, EngineError> {
  let config = EngineConfig::from_env()?;
  let now = config.local_now();

  let calendar = GoogleCalendar::from_env(config.timezone)?;
  let tracker = Wearables::from_env(config.timezone)?;
  let mut engine = Engine::new(Box::new(calendar), Box::new(tracker), config.clone()).dry_run(cli.dry_run);

  if let Command::Plan { .. } = cli.command {
    engine = engine.with_generator(Box::new(ClaudeClient::from_env()?));
  }
  if !cli.dry_run {
    engine = engine.with_audit(db::initialize_db(Path::new(&config.db_path)).await?);
  }

  tracing::info!(now = %now.format("%Y-%m-%d %H:%M"), timezone = %config.timezone, dry_run = cli.dry_run, "Starting");

  let report_path = cli.report.as_deref();
  let code = match cli.command {
    Command::Plan { days } => emit(&engine.plan(now, days).await?, report_path),
    Command::Reconcile { days, force } => {
      let report = engine.maintenance(now, days, force).await;
      let code = emit(&report, report_path);
      if report.errors.is_empty() {
        code
      } else {
        ExitCode::FAILURE
      }
    }
    Command::Conflicts { days } => emit(&engine.conflicts(now, days).await?, report_path),
    Command::Adapt => emit(&engine.adapt(now).await?, report_path),
  };

  Ok(code)
}

/// Print the report to stdout and optionally save it
fn emit<T: Serialize>(report: &T, path: Option<&Path>) -> ExitCode {
  let json = match serde_json::to_string_pretty(report) {
    Ok(json) => json,
    Err(e) => {
      tracing::error!(error = %e, "Failed to serialize report");
      return ExitCode::FAILURE;
    }
  };

  println!("{}", json);

  if let Some(path) = path {
    if let Err(e) = std::fs::write(path, &json) {
      tracing::error!(path = %path.display(), error = %e, "Failed to write report");
      return ExitCode::FAILURE;
    }
    tracing::info!(path = %path.display(), "Report saved");
  }

  ExitCode::SUCCESS
}
