//! Conflict detection and resolution for future workouts
//!
//! A workout that overlaps any other commitment is deleted, never moved.
//! The planning pass regenerates the day on its next run.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashSet;

use crate::calendar::{shift_days, split_workouts, Calendar, CalendarError};
use crate::models::{CalendarEvent, ScheduledWorkout};

/// Half-open interval overlap: `[s1, e1)` and `[s2, e2)` conflict iff
/// `s1 < e2 && s2 < e1`. Touching boundaries do not conflict.
pub fn overlaps(
  s1: NaiveDateTime,
  e1: NaiveDateTime,
  s2: NaiveDateTime,
  e2: NaiveDateTime,
) -> bool {
  s1 < e2 && s2 < e1
}

/// A workout and the first commitment it collides with
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictRecord {
  pub workout: ScheduledWorkout,
  pub other: CalendarEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictAction {
  Deleted,
  WouldDelete,
  DeleteFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflictDetail {
  pub workout: String,
  pub workout_time: NaiveDateTime,
  pub conflict_with: String,
  pub action: ConflictAction,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConflictReport {
  pub total_conflicts: usize,
  pub deleted: usize,
  pub details: Vec<ConflictDetail>,
}

/// One record per conflicting workout, keyed on its first collision.
/// Reconciled workouts are history and all-day events have no interval,
/// so neither takes part.
pub fn find_conflicts(workouts: &[ScheduledWorkout], others: &[CalendarEvent]) -> Vec<ConflictRecord> {
  let mut seen = HashSet::new();

  workouts
    .iter()
    .filter(|w| !w.is_reconciled())
    .filter(|w| seen.insert(w.id.clone()))
    .filter_map(|workout| {
      others
        .iter()
        .filter(|e| !e.all_day)
        .find(|e| overlaps(workout.start, workout.end, e.start, e.end))
        .map(|other| ConflictRecord {
          workout: workout.clone(),
          other: other.clone(),
        })
    })
    .collect()
}

/// Delete each conflicting workout once. `deleted_ids` spans the whole run
/// so a workout already removed by an earlier step is not deleted twice.
pub async fn resolve_conflicts(
  calendar: &dyn Calendar,
  conflicts: &[ConflictRecord],
  dry_run: bool,
  deleted_ids: &mut HashSet<String>,
) -> ConflictReport {
  let mut report = ConflictReport {
    total_conflicts: conflicts.len(),
    ..Default::default()
  };

  for conflict in conflicts {
    let workout = &conflict.workout;
    let other = &conflict.other;

    tracing::info!(
      event_id = %workout.id,
      workout = %workout.headline,
      start = %workout.start.format("%a %H:%M"),
      conflict_with = %other.title,
      "Workout overlaps {}-{}",
      other.start.format("%H:%M"),
      other.end.format("%H:%M")
    );

    let action = if deleted_ids.contains(&workout.id) {
      tracing::debug!(event_id = %workout.id, "Already deleted this run");
      continue;
    } else if dry_run {
      tracing::info!(event_id = %workout.id, "[dry-run] Would delete conflicting workout");
      ConflictAction::WouldDelete
    } else {
      match calendar.delete_event(&workout.id).await {
        Ok(()) | Err(CalendarError::NotFound(_)) => {
          deleted_ids.insert(workout.id.clone());
          report.deleted += 1;
          tracing::info!(event_id = %workout.id, "Deleted conflicting workout; it will be replanned");
          ConflictAction::Deleted
        }
        Err(e) => {
          tracing::error!(event_id = %workout.id, error = %e, "Failed to delete conflicting workout");
          ConflictAction::DeleteFailed
        }
      }
    };

    report.details.push(ConflictDetail {
      workout: workout.headline.clone(),
      workout_time: workout.start,
      conflict_with: other.title.clone(),
      action,
    });
  }

  report
}

/// Detect and resolve conflicts over `[now, now + days)`
pub async fn check_future_conflicts(
  calendar: &dyn Calendar,
  now: NaiveDateTime,
  days: u32,
  dry_run: bool,
  deleted_ids: &mut HashSet<String>,
) -> Result<ConflictReport, CalendarError> {
  let end = shift_days(now, i64::from(days))?;
  let events = calendar.list_events(now, end).await?;
  let (workouts, others) = split_workouts(events);

  tracing::info!(
    workouts = workouts.len(),
    other_events = others.len(),
    "Checking next {} days for conflicts",
    days
  );

  let conflicts = find_conflicts(&workouts, &others);
  if conflicts.is_empty() {
    tracing::info!("No conflicts found");
    return Ok(ConflictReport::default());
  }

  let report = resolve_conflicts(calendar, &conflicts, dry_run, deleted_ids).await;
  tracing::info!(
    found = report.total_conflicts,
    deleted = report.deleted,
    "Conflict resolution finished"
  );
  Ok(report)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
