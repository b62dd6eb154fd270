//! Test utilities shared by the unit tests
//!
//! This module provides common test infrastructure including:
//! - In-memory collaborator fakes (calendar, tracker, plan generator)
//! - Database setup/teardown
//! - Data factories and time helpers
//! - Helper assertions

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::calendar::{Calendar, CalendarError};
use crate::llm::{LlmError, PlanGenerator};
use crate::models::{
  ActualActivity, CalendarEvent, EventPatch, NewEvent, SleepSummary, StressSummary,
};
use crate::oura::OuraError;
use crate::strava::StravaError;
use crate::tracker::{FitnessTracker, TrackerError};

/// ---------------------------------------------------------------------------
/// Time Helpers
/// ---------------------------------------------------------------------------

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn at(y: i32, m: u32, d: u32, hour: u32, minute: u32) -> NaiveDateTime {
  date(y, m, d).and_hms_opt(hour, minute, 0).expect("valid time")
}

/// ---------------------------------------------------------------------------
/// Data Factories
/// ---------------------------------------------------------------------------

pub fn calendar_event(id: &str, title: &str, start: NaiveDateTime, minutes: i64) -> CalendarEvent {
  CalendarEvent {
    id: id.to_string(),
    title: title.to_string(),
    description: String::new(),
    start,
    end: start + Duration::minutes(minutes),
    all_day: false,
  }
}

/// Completed activity starting on the hour
pub fn activity(label: &str, day: NaiveDate, hour: u32, minutes: i64) -> ActualActivity {
  let start = day.and_hms_opt(hour, 0, 0);
  ActualActivity::new(label, day, start, minutes, None)
}

pub fn activity_at(label: &str, start: NaiveDateTime, minutes: i64) -> ActualActivity {
  ActualActivity::new(label, start.date(), Some(start), minutes, None)
}

/// ---------------------------------------------------------------------------
/// Fake Calendar
/// ---------------------------------------------------------------------------

#[derive(Default)]
struct CalendarState {
  events: Vec<CalendarEvent>,
  created: Vec<CalendarEvent>,
  deleted: Vec<String>,
  updates: usize,
  next_id: usize,
  unreachable: bool,
  reject_creates: bool,
}

/// In-memory calendar. Clones share state, so a test can hand one clone to
/// the engine and inspect the other.
#[derive(Clone, Default)]
pub struct FakeCalendar {
  state: Arc<Mutex<CalendarState>>,
}

impl FakeCalendar {
  pub fn with_events(events: Vec<CalendarEvent>) -> Self {
    let calendar = Self::default();
    calendar.state().events = events;
    calendar
  }

  /// Every call fails as if the API were down
  pub fn unreachable() -> Self {
    let calendar = Self::default();
    calendar.state().unreachable = true;
    calendar
  }

  pub fn failing_creates(self) -> Self {
    self.state().reject_creates = true;
    self
  }

  fn state(&self) -> MutexGuard<'_, CalendarState> {
    self.state.lock().expect("calendar state poisoned")
  }

  pub fn events(&self) -> Vec<CalendarEvent> {
    self.state().events.clone()
  }

  pub fn event(&self, id: &str) -> Option<CalendarEvent> {
    self.state().events.iter().find(|e| e.id == id).cloned()
  }

  pub fn created(&self) -> Vec<CalendarEvent> {
    self.state().created.clone()
  }

  pub fn deleted_ids(&self) -> Vec<String> {
    self.state().deleted.clone()
  }

  pub fn update_count(&self) -> usize {
    self.state().updates
  }

  fn check_reachable(state: &CalendarState) -> Result<(), CalendarError> {
    if state.unreachable {
      return Err(CalendarError::Api {
        status: 503,
        message: "calendar unavailable".to_string(),
      });
    }
    Ok(())
  }
}

#[async_trait]
impl Calendar for FakeCalendar {
  async fn list_events(
    &self,
    from: NaiveDateTime,
    to: NaiveDateTime,
  ) -> Result<Vec<CalendarEvent>, CalendarError> {
    let state = self.state();
    Self::check_reachable(&state)?;
    let mut events: Vec<CalendarEvent> = state
      .events
      .iter()
      .filter(|e| e.start < to && e.end > from)
      .cloned()
      .collect();
    events.sort_by_key(|e| e.start);
    Ok(events)
  }

  async fn create_event(&self, event: &NewEvent) -> Result<CalendarEvent, CalendarError> {
    let mut state = self.state();
    Self::check_reachable(&state)?;
    if state.reject_creates {
      return Err(CalendarError::Api {
        status: 403,
        message: "insufficient permissions".to_string(),
      });
    }

    state.next_id += 1;
    let created = CalendarEvent {
      id: format!("created-{}", state.next_id),
      title: event.title.clone(),
      description: event.description.clone(),
      start: event.start,
      end: event.end,
      all_day: false,
    };
    state.events.push(created.clone());
    state.created.push(created.clone());
    Ok(created)
  }

  async fn update_event(&self, id: &str, patch: &EventPatch) -> Result<CalendarEvent, CalendarError> {
    let mut state = self.state();
    Self::check_reachable(&state)?;

    let event = state
      .events
      .iter_mut()
      .find(|e| e.id == id)
      .ok_or_else(|| CalendarError::NotFound(id.to_string()))?;
    if let Some(title) = &patch.title {
      event.title = title.clone();
    }
    if let Some(description) = &patch.description {
      event.description = description.clone();
    }
    if let Some(start) = patch.start {
      event.start = start;
    }
    if let Some(end) = patch.end {
      event.end = end;
    }
    let updated = event.clone();
    state.updates += 1;
    Ok(updated)
  }

  async fn delete_event(&self, id: &str) -> Result<(), CalendarError> {
    let mut state = self.state();
    Self::check_reachable(&state)?;

    let before = state.events.len();
    state.events.retain(|e| e.id != id);
    if state.events.len() == before {
      return Err(CalendarError::NotFound(id.to_string()));
    }
    state.deleted.push(id.to_string());
    Ok(())
  }
}

/// ---------------------------------------------------------------------------
/// Fake Tracker
/// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeTracker {
  activities: Vec<ActualActivity>,
  recovery: Option<f64>,
  sleep_hours: Option<f64>,
  stress: Option<f64>,
  unavailable: bool,
}

impl FakeTracker {
  pub fn with_activities(activities: Vec<ActualActivity>) -> Self {
    Self {
      activities,
      ..Default::default()
    }
  }

  pub fn unavailable() -> Self {
    Self {
      unavailable: true,
      ..Default::default()
    }
  }

  pub fn with_health(mut self, recovery: Option<f64>, sleep_hours: Option<f64>, stress: Option<f64>) -> Self {
    self.recovery = recovery;
    self.sleep_hours = sleep_hours;
    self.stress = stress;
    self
  }

  fn check_strava(&self) -> Result<(), TrackerError> {
    if self.unavailable {
      return Err(StravaError::Api {
        status: 503,
        message: "Service Unavailable".to_string(),
      }
      .into());
    }
    Ok(())
  }

  fn check_oura(&self) -> Result<(), TrackerError> {
    if self.unavailable {
      return Err(OuraError::Api("503 Service Unavailable".to_string()).into());
    }
    Ok(())
  }
}

#[async_trait]
impl FitnessTracker for FakeTracker {
  async fn list_activities(&self, limit: usize) -> Result<Vec<ActualActivity>, TrackerError> {
    self.check_strava()?;
    Ok(self.activities.iter().take(limit).cloned().collect())
  }

  async fn recovery_score(&self, _date: NaiveDate) -> Result<Option<f64>, TrackerError> {
    self.check_oura()?;
    Ok(self.recovery)
  }

  async fn sleep(&self, _date: NaiveDate) -> Result<Option<SleepSummary>, TrackerError> {
    self.check_oura()?;
    Ok(self.sleep_hours.map(|duration_hours| SleepSummary {
      duration_hours,
      quality_score: None,
    }))
  }

  async fn stress(&self, _date: NaiveDate) -> Result<Option<StressSummary>, TrackerError> {
    self.check_oura()?;
    Ok(self.stress.map(|avg_level| StressSummary { avg_level }))
  }
}

/// ---------------------------------------------------------------------------
/// Scripted Plan Generator
/// ---------------------------------------------------------------------------

/// Returns a fixed response per date; unscripted dates fail like an API error
#[derive(Default)]
pub struct ScriptedPlanner {
  responses: HashMap<NaiveDate, String>,
  prompts: Mutex<Vec<(NaiveDate, String)>>,
}

impl ScriptedPlanner {
  pub fn respond(mut self, date: NaiveDate, text: &str) -> Self {
    self.responses.insert(date, text.to_string());
    self
  }

  /// Prompts received so far, in call order
  pub fn prompts(&self) -> Vec<(NaiveDate, String)> {
    self.prompts.lock().expect("prompt log poisoned").clone()
  }
}

#[async_trait]
impl PlanGenerator for ScriptedPlanner {
  async fn generate(&self, context_json: &str, date: NaiveDate) -> Result<String, LlmError> {
    self
      .prompts
      .lock()
      .expect("prompt log poisoned")
      .push((date, context_json.to_string()));
    self
      .responses
      .get(&date)
      .cloned()
      .ok_or_else(|| LlmError::Api(format!("no scripted response for {}", date)))
  }
}

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// ---------------------------------------------------------------------------
/// Test Macros
/// ---------------------------------------------------------------------------

/// Assert two floats are approximately equal within a tolerance
#[macro_export]
macro_rules! assert_approx_eq {
  ($left:expr, $right:expr, $tolerance:expr) => {
    let diff = ($left - $right).abs();
    assert!(
      diff < $tolerance,
      "Values not approximately equal: {} vs {} (diff: {}, tolerance: {})",
      $left,
      $right,
      diff,
      $tolerance
    );
  };
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('workout_discrepancies', 'plan_issues')",
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert_eq!(tables.len(), 2);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_fake_calendar_lists_overlapping_events_in_order() {
    let calendar = FakeCalendar::with_events(vec![
      calendar_event("b", "Late", at(2026, 1, 5, 15, 0), 60),
      calendar_event("a", "Early", at(2026, 1, 5, 8, 0), 60),
      calendar_event("c", "Tomorrow", at(2026, 1, 6, 8, 0), 60),
    ]);

    let events = calendar
      .list_events(at(2026, 1, 5, 0, 0), at(2026, 1, 6, 0, 0))
      .await
      .unwrap();
    let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);

    assert!(matches!(
      calendar.delete_event("missing").await,
      Err(CalendarError::NotFound(_))
    ));
  }

  #[test]
  fn test_factories_produce_consistent_data() {
    let run = activity("Morning Run", date(2026, 1, 5), 7, 40);
    assert_eq!(run.start, Some(at(2026, 1, 5, 7, 0)));
    assert_eq!(run.duration_minutes, 40);

    let event = calendar_event("e1", "Standup", at(2026, 1, 5, 9, 0), 15);
    assert_eq!(event.end, at(2026, 1, 5, 9, 15));
  }
}
