//! Engine configuration
//!
//! Every knob is read once from the environment (after `.env` is loaded) into
//! a typed struct that is handed to the engine. Provider credentials are not
//! part of it; each adapter loads its own.

use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

use crate::models::WorkoutType;

/// ---------------------------------------------------------------------------
/// Defaults
/// ---------------------------------------------------------------------------

const DEFAULT_TIMEZONE: &str = "America/Chicago";
const DEFAULT_RECENT_ACTIVITY_LIMIT: usize = 10;
const DEFAULT_RECONCILE_ACTIVITY_LIMIT: usize = 50;
const DEFAULT_MATCH_WINDOW_HOURS: i64 = 4;
const DEFAULT_DB_PATH: &str = "autopilot.db";

/// Longest planning or lookback window an engine pass accepts
pub const MAX_WINDOW_DAYS: u32 = 366;
const MAX_MATCH_WINDOW_HOURS: i64 = 72;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Invalid value for {name}: {value}")]
  Invalid { name: String, value: String },

  #[error("Unknown timezone: {0}")]
  Timezone(String),
}

/// ---------------------------------------------------------------------------
/// Weekly Targets
/// ---------------------------------------------------------------------------

/// Desired sessions per Monday-anchored week, keyed by workout type.
/// Types without an entry are not part of the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyTargets(BTreeMap<WorkoutType, u32>);

impl WeeklyTargets {
  pub fn new(targets: impl IntoIterator<Item = (WorkoutType, u32)>) -> Self {
    Self(targets.into_iter().collect())
  }

  pub fn get(&self, kind: WorkoutType) -> Option<u32> {
    self.0.get(&kind).copied()
  }

  pub fn iter(&self) -> impl Iterator<Item = (WorkoutType, u32)> + '_ {
    self.0.iter().map(|(k, v)| (*k, *v))
  }
}

impl Default for WeeklyTargets {
  fn default() -> Self {
    Self::new([
      (WorkoutType::Run, 3),
      (WorkoutType::Bike, 2),
      (WorkoutType::Swim, 2),
      (WorkoutType::Strength, 3),
    ])
  }
}

/// ---------------------------------------------------------------------------
/// Health Thresholds
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthThresholds {
  /// Recovery score strictly below this triggers adaptation
  pub low_recovery: f64,
  /// Sleep hours strictly below this triggers adaptation
  pub low_sleep_hours: f64,
  /// Average stress strictly above this triggers adaptation
  pub high_stress: f64,
}

impl Default for HealthThresholds {
  fn default() -> Self {
    Self {
      low_recovery: 50.0,
      low_sleep_hours: 5.5,
      high_stress: 60.0,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Engine Configuration
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EngineConfig {
  pub timezone: Tz,
  pub weekly_targets: WeeklyTargets,
  pub thresholds: HealthThresholds,
  /// Activities kept in the planning context
  pub recent_activity_limit: usize,
  /// Activities fetched for a reconciliation pass
  pub reconcile_activity_limit: usize,
  /// Proximity window used when several same-day activities compete
  pub match_window_hours: i64,
  /// Move a reconciled event to the actual activity's time
  pub move_on_reconcile: bool,
  pub db_path: String,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      timezone: chrono_tz::America::Chicago,
      weekly_targets: WeeklyTargets::default(),
      thresholds: HealthThresholds::default(),
      recent_activity_limit: DEFAULT_RECENT_ACTIVITY_LIMIT,
      reconcile_activity_limit: DEFAULT_RECONCILE_ACTIVITY_LIMIT,
      match_window_hours: DEFAULT_MATCH_WINDOW_HOURS,
      move_on_reconcile: true,
      db_path: DEFAULT_DB_PATH.to_string(),
    }
  }
}

impl EngineConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    dotenvy::dotenv().ok();

    let tz_name = env::var("USER_TIMEZONE").unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string());
    let timezone = tz_name
      .parse::<Tz>()
      .map_err(|_| ConfigError::Timezone(tz_name.clone()))?;

    let defaults = HealthThresholds::default();
    let thresholds = HealthThresholds {
      low_recovery: env_or("LOW_RECOVERY_THRESHOLD", defaults.low_recovery)?,
      low_sleep_hours: env_or("LOW_SLEEP_THRESHOLD", defaults.low_sleep_hours)?,
      high_stress: env_or("HIGH_STRESS_THRESHOLD", defaults.high_stress)?,
    };

    let weekly_targets = WeeklyTargets::new([
      (WorkoutType::Run, env_or("WEEKLY_RUN_SESSIONS", 3)?),
      (WorkoutType::Bike, env_or("WEEKLY_BIKE_SESSIONS", 2)?),
      (WorkoutType::Swim, env_or("WEEKLY_SWIM_SESSIONS", 2)?),
      (WorkoutType::Strength, env_or("WEEKLY_STRENGTH_SESSIONS", 3)?),
    ]);

    let match_window_hours = env_or("MATCH_WINDOW_HOURS", DEFAULT_MATCH_WINDOW_HOURS)?;
    if !(1..=MAX_MATCH_WINDOW_HOURS).contains(&match_window_hours) {
      return Err(ConfigError::Invalid {
        name: "MATCH_WINDOW_HOURS".to_string(),
        value: match_window_hours.to_string(),
      });
    }

    Ok(Self {
      timezone,
      weekly_targets,
      thresholds,
      recent_activity_limit: env_or("RECENT_ACTIVITY_LIMIT", DEFAULT_RECENT_ACTIVITY_LIMIT)?,
      reconcile_activity_limit: env_or("RECONCILE_ACTIVITY_LIMIT", DEFAULT_RECONCILE_ACTIVITY_LIMIT)?,
      match_window_hours,
      move_on_reconcile: env_flag("RECONCILE_MOVES_EVENT", true)?,
      db_path: env::var("AUTOPILOT_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string()),
    })
  }

  /// Current wall-clock time in the user's timezone
  pub fn local_now(&self) -> NaiveDateTime {
    Utc::now().with_timezone(&self.timezone).naive_local()
  }
}

fn env_or<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
  match env::var(name) {
    Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| ConfigError::Invalid {
      name: name.to_string(),
      value: raw,
    }),
    _ => Ok(default),
  }
}

fn env_flag(name: &str, default: bool) -> Result<bool, ConfigError> {
  match env::var(name) {
    Ok(raw) => match raw.trim().to_lowercase().as_str() {
      "" => Ok(default),
      "1" | "true" | "yes" | "on" => Ok(true),
      "0" | "false" | "no" | "off" => Ok(false),
      _ => Err(ConfigError::Invalid {
        name: name.to_string(),
        value: raw,
      }),
    },
    Err(_) => Ok(default),
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
