use thiserror::Error;

use crate::calendar::CalendarError;
use crate::config::ConfigError;
use crate::llm::LlmError;
use crate::tracker::TrackerError;

/// Errors that abort a whole engine operation
#[derive(Error, Debug)]
pub enum EngineError {
  #[error("Calendar unavailable: {0}")]
  CalendarUnavailable(String),

  #[error("Configuration error: {0}")]
  Config(#[from] ConfigError),

  #[error("Calendar setup failed: {0}")]
  Calendar(#[from] CalendarError),

  #[error("Tracker setup failed: {0}")]
  Tracker(#[from] TrackerError),

  #[error("Plan generator setup failed: {0}")]
  Llm(#[from] LlmError),

  #[error("No plan generator configured")]
  NoGenerator,

  #[error("Day count {days} exceeds the limit of {max}")]
  DayRange { days: u32, max: u32 },

  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Migration error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),
}
