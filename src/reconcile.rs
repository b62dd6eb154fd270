//! Reconciliation of past workouts against completed activities
//!
//! Each scheduled workout in the lookback window is paired with the activity
//! that actually happened that day, and the calendar event is rewritten to
//! record it. Reconciled events carry a marker and are skipped on later runs
//! unless `force` is set. The A and B options of one slot are reconciled as a
//! unit: the option that was done is rewritten and the other is removed.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::calendar::codec::{reconciled_title, reconciliation_block};
use crate::calendar::{shift_days, split_workouts, Calendar, CalendarError};
use crate::models::{ActualActivity, EventPatch, OptionLabel, ScheduledWorkout, WorkoutType};
use crate::tracker::FitnessTracker;

/// ---------------------------------------------------------------------------
/// Matching
/// ---------------------------------------------------------------------------

/// Pick the activity that best explains a scheduled workout.
///
/// Same-day activities only. A lone candidate always matches. With several,
/// the one starting closest to the workout wins if it is inside `window`;
/// otherwise the first same-day activity is used.
pub fn match_activity<'a>(
  workout: &ScheduledWorkout,
  activities: &'a [ActualActivity],
  window: Duration,
) -> Option<&'a ActualActivity> {
  let same_day: Vec<&ActualActivity> = activities.iter().filter(|a| a.date == workout.date).collect();

  match same_day.as_slice() {
    [] => None,
    [only] => Some(*only),
    candidates => {
      let closest = candidates
        .iter()
        .filter_map(|a| a.start.map(|start| (*a, (start - workout.start).abs())))
        .min_by_key(|(_, gap)| *gap);

      match closest {
        Some((activity, gap)) if gap < window => Some(activity),
        _ => candidates.first().copied(),
      }
    }
  }
}

/// ---------------------------------------------------------------------------
/// Report Types
/// ---------------------------------------------------------------------------

/// Planned-vs-actual difference kept for later pattern analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discrepancy {
  pub date: NaiveDate,
  pub planned_type: WorkoutType,
  /// Normalized actual type, or "skipped" when nothing was done
  pub actual_type: String,
  pub actual_duration: i64,
  pub matched: bool,
  pub types_matched: bool,
  pub recorded_at: NaiveDateTime,
}

impl Discrepancy {
  pub fn skipped(workout: &ScheduledWorkout, recorded_at: NaiveDateTime) -> Self {
    Self {
      date: workout.date,
      planned_type: workout.planned_type,
      actual_type: "skipped".to_string(),
      actual_duration: 0,
      matched: false,
      types_matched: false,
      recorded_at,
    }
  }

  pub fn mismatch(
    workout: &ScheduledWorkout,
    activity: &ActualActivity,
    recorded_at: NaiveDateTime,
  ) -> Self {
    Self {
      date: workout.date,
      planned_type: workout.planned_type,
      actual_type: activity.workout_type.as_str().to_string(),
      actual_duration: activity.duration_minutes,
      matched: true,
      types_matched: false,
      recorded_at,
    }
  }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
  pub total_scheduled: usize,
  pub already_reconciled: usize,
  pub matched: usize,
  pub type_mismatch: usize,
  pub no_activity: usize,
  pub updated: usize,
  /// Option events dropped because the other option of the slot was done
  pub alternatives_removed: usize,
  /// False when the tracker could not be read; nothing was matched
  pub activities_available: bool,
  pub discrepancies: Vec<Discrepancy>,
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
  pub force: bool,
  pub dry_run: bool,
  /// Move the event to the activity's actual start and duration
  pub move_event: bool,
  pub match_window: Duration,
  pub activity_limit: usize,
}

/// ---------------------------------------------------------------------------
/// Event Rewrite
/// ---------------------------------------------------------------------------

/// Calendar patch recording `activity` against `workout`
pub fn reconciliation_patch(
  workout: &ScheduledWorkout,
  activity: &ActualActivity,
  reconciled_at: NaiveDateTime,
  move_event: bool,
) -> EventPatch {
  let mut description = workout.description.clone();
  description.push_str(&reconciliation_block(activity, workout.planned_type, reconciled_at));

  let mut patch = EventPatch {
    title: Some(reconciled_title(activity.workout_type, workout.planned_type)),
    description: Some(description),
    ..Default::default()
  };

  if move_event {
    if let Some(start) = activity.start {
      let minutes = if activity.duration_minutes > 0 {
        activity.duration_minutes
      } else {
        workout.duration_minutes()
      };
      patch.start = Some(start);
      patch.end = Some(start + Duration::minutes(minutes));
    }
  }

  patch
}

/// ---------------------------------------------------------------------------
/// Reconciliation Pass
/// ---------------------------------------------------------------------------

/// Group A/B alternatives sharing a day and start time into one slot.
/// Unlabelled workouts stand alone.
fn group_slots(workouts: &[ScheduledWorkout]) -> Vec<Vec<&ScheduledWorkout>> {
  let mut slots: Vec<Vec<&ScheduledWorkout>> = Vec::new();

  for workout in workouts {
    let position = if workout.option == OptionLabel::None {
      None
    } else {
      slots
        .iter()
        .position(|slot| slot[0].option != OptionLabel::None && slot[0].start == workout.start)
    };

    match position {
      Some(i) => slots[i].push(workout),
      None => slots.push(vec![workout]),
    }
  }

  slots
}

/// Drop the option that was not done once its sibling has been reconciled
async fn remove_alternative(
  calendar: &dyn Calendar,
  alternative: &ScheduledWorkout,
  dry_run: bool,
  report: &mut ReconcileReport,
) {
  if dry_run {
    tracing::info!(event_id = %alternative.id, "[dry-run] Would remove unused alternative");
    report.alternatives_removed += 1;
    return;
  }

  match calendar.delete_event(&alternative.id).await {
    Ok(()) | Err(CalendarError::NotFound(_)) => {
      tracing::info!(event_id = %alternative.id, "Removed unused alternative");
      report.alternatives_removed += 1;
    }
    Err(e) => tracing::error!(event_id = %alternative.id, error = %e, "Failed to remove unused alternative"),
  }
}

/// Reconcile workouts in `[now - days, now)`. Fails only if the calendar
/// cannot be listed.
pub async fn reconcile_workouts(
  calendar: &dyn Calendar,
  tracker: &dyn FitnessTracker,
  now: NaiveDateTime,
  days: u32,
  options: ReconcileOptions,
) -> Result<ReconcileReport, CalendarError> {
  let from = shift_days(now, -i64::from(days))?;
  let events = calendar.list_events(from, now).await?;
  let (workouts, _) = split_workouts(events);
  let workouts: Vec<ScheduledWorkout> = workouts.into_iter().filter(|w| w.start < now).collect();

  let mut report = ReconcileReport {
    total_scheduled: workouts.len(),
    ..Default::default()
  };

  let activities = match tracker.list_activities(options.activity_limit).await {
    Ok(activities) => {
      report.activities_available = true;
      activities
    }
    Err(e) => {
      tracing::warn!(error = %e, "Activities unavailable; skipping matching");
      Vec::new()
    }
  };

  tracing::info!(
    scheduled = workouts.len(),
    activities = activities.len(),
    "Reconciling past {} days",
    days
  );

  for slot in group_slots(&workouts) {
    let reconciled = slot.iter().filter(|w| w.is_reconciled()).count();
    if reconciled > 0 {
      if !options.force {
        tracing::debug!(event_id = %slot[0].id, "Already reconciled, skipping");
        report.already_reconciled += reconciled;
        continue;
      }
      tracing::info!(event_id = %slot[0].id, "Already reconciled, reprocessing (force)");
    }

    if !report.activities_available {
      continue;
    }

    let primary = slot
      .iter()
      .copied()
      .find(|w| w.option == OptionLabel::A)
      .unwrap_or(slot[0]);

    let Some(activity) = match_activity(primary, &activities, options.match_window) else {
      tracing::info!(event_id = %primary.id, date = %primary.date, "No activity found");
      report.no_activity += 1;
      report.discrepancies.push(Discrepancy::skipped(primary, now));
      continue;
    };

    // The option the user actually did represents the slot
    let workout = slot
      .iter()
      .copied()
      .find(|w| w.planned_type == activity.workout_type)
      .unwrap_or(primary);

    report.matched += 1;
    if activity.workout_type == workout.planned_type {
      tracing::info!(event_id = %workout.id, kind = %activity.workout_type, "Matched");
    } else {
      tracing::info!(
        event_id = %workout.id,
        planned = %workout.planned_type,
        actual = %activity.workout_type,
        "Matched with type mismatch"
      );
      report.type_mismatch += 1;
      report.discrepancies.push(Discrepancy::mismatch(workout, activity, now));
    }

    let patch = reconciliation_patch(workout, activity, now, options.move_event);
    let title = patch.title.clone().unwrap_or_default();

    if options.dry_run {
      tracing::info!(event_id = %workout.id, %title, "[dry-run] Would update event");
      if let Some(start) = patch.start {
        tracing::info!(event_id = %workout.id, "[dry-run] Would move to {}", start.format("%Y-%m-%d %H:%M"));
      }
      report.updated += 1;
    } else {
      match calendar.update_event(&workout.id, &patch).await {
        Ok(_) => {
          tracing::info!(event_id = %workout.id, %title, "Updated event");
          report.updated += 1;
        }
        Err(e) => {
          tracing::error!(event_id = %workout.id, error = %e, "Failed to update event");
          continue;
        }
      }
    }

    for alternative in slot.iter().filter(|w| w.id != workout.id) {
      remove_alternative(calendar, alternative, options.dry_run, &mut report).await;
    }
  }

  tracing::info!(
    scheduled = report.total_scheduled,
    already_reconciled = report.already_reconciled,
    matched = report.matched,
    type_mismatch = report.type_mismatch,
    no_activity = report.no_activity,
    updated = report.updated,
    alternatives_removed = report.alternatives_removed,
    "Reconciliation summary"
  );

  Ok(report)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
