use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::workout::WorkoutType;

/// Any event on the external calendar, in local wall-clock time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub description: String,
  pub start: NaiveDateTime,
  pub end: NaiveDateTime,
  /// All-day events have no real interval and never conflict
  #[serde(default)]
  pub all_day: bool,
}

impl CalendarEvent {
  pub fn date(&self) -> NaiveDate {
    self.start.date()
  }
}

/// Event to be created
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEvent {
  pub title: String,
  pub start: NaiveDateTime,
  pub end: NaiveDateTime,
  pub description: String,
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventPatch {
  pub title: Option<String>,
  pub start: Option<NaiveDateTime>,
  pub end: Option<NaiveDateTime>,
  pub description: Option<String>,
}

/// Which of the two same-slot alternatives an event carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionLabel {
  A,
  B,
  None,
}

/// Engine-owned lifecycle of a workout event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkoutState {
  /// Written by the planner, untouched since
  Planned,
  /// Annotated by the health adaptation trigger
  Adapted,
  /// Rewritten from an actual activity
  Reconciled { actual: WorkoutType },
}

/// An engine-owned workout event with its state decoded from the title
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledWorkout {
  pub id: String,
  pub date: NaiveDate,
  pub start: NaiveDateTime,
  pub end: NaiveDateTime,
  pub option: OptionLabel,
  pub planned_type: WorkoutType,
  /// Title text after the engine prefix, without markers
  pub headline: String,
  pub state: WorkoutState,
  pub description: String,
}

impl ScheduledWorkout {
  pub fn is_reconciled(&self) -> bool {
    matches!(self.state, WorkoutState::Reconciled { .. })
  }

  pub fn is_adapted(&self) -> bool {
    self.state == WorkoutState::Adapted
  }

  pub fn duration_minutes(&self) -> i64 {
    (self.end - self.start).num_minutes()
  }
}
