//! Calendar collaborator
//!
//! The engine only ever talks to the calendar through the `Calendar` trait.
//! Everything the engine persists about its own events lives in their titles
//! and descriptions; `codec` is the one place that reads or writes that text.

pub mod codec;
pub mod google;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};

use crate::models::{CalendarEvent, EventPatch, NewEvent, ScheduledWorkout};

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("Calendar API error {status}: {message}")]
  Api { status: u16, message: String },

  #[error("Malformed calendar event: {0}")]
  Parse(String),

  #[error("Event not found: {0}")]
  NotFound(String),

  #[error("Window of {0} days is outside the representable calendar")]
  Window(i64),
}

/// ---------------------------------------------------------------------------
/// Collaborator Contract
/// ---------------------------------------------------------------------------

#[async_trait]
pub trait Calendar: Send + Sync {
  /// Events overlapping `[from, to)`, local wall-clock times
  async fn list_events(
    &self,
    from: NaiveDateTime,
    to: NaiveDateTime,
  ) -> Result<Vec<CalendarEvent>, CalendarError>;

  async fn create_event(&self, event: &NewEvent) -> Result<CalendarEvent, CalendarError>;

  async fn update_event(&self, id: &str, patch: &EventPatch) -> Result<CalendarEvent, CalendarError>;

  async fn delete_event(&self, id: &str) -> Result<(), CalendarError>;
}

/// `at` moved by a signed number of whole days
pub fn shift_days(at: NaiveDateTime, days: i64) -> Result<NaiveDateTime, CalendarError> {
  Duration::try_days(days)
    .and_then(|delta| at.checked_add_signed(delta))
    .ok_or(CalendarError::Window(days))
}

/// Split raw events into engine-owned workouts and everything else
pub fn split_workouts(events: Vec<CalendarEvent>) -> (Vec<ScheduledWorkout>, Vec<CalendarEvent>) {
  let mut workouts = Vec::new();
  let mut others = Vec::new();

  for event in events {
    match codec::decode_workout(&event) {
      Some(workout) => workouts.push(workout),
      None => others.push(event),
    }
  }

  (workouts, others)
}
