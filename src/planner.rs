//! Per-day planning pass
//!
//! Days are planned strictly in order. Each day first drops existing
//! future workouts that collide with a commitment or whose type already met
//! its weekly target, then either keeps what is left or asks the generator
//! for a fresh plan, validates it and writes it to the calendar.

use chrono::{Days, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::HashSet;

use crate::calendar::codec::{planned_headline, planned_title, workout_description};
use crate::calendar::{Calendar, CalendarError};
use crate::conflicts::overlaps;
use crate::context::{ContextSource, PlanningContext};
use crate::error::EngineError;
use crate::llm::PlanGenerator;
use crate::models::{DayPlan, NewEvent, OptionLabel, ScheduledWorkout, WorkoutOption};
use crate::progress::WeeklyProgress;
use crate::sanitize::sanitize_response;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
  Created,
  AlreadyScheduled,
  RestDay,
  LlmError,
  SanitizationError,
  CalendarError,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayResult {
  pub date: NaiveDate,
  pub status: DayStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub option_a: Option<WorkoutOption>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub option_b: Option<WorkoutOption>,
  pub event_ids: Vec<String>,
  /// Existing workouts removed before planning this day
  pub evicted: Vec<String>,
  pub issues: Vec<String>,
  pub dry_run: bool,
}

impl DayResult {
  fn new(date: NaiveDate, status: DayStatus, dry_run: bool) -> Self {
    Self {
      date,
      status,
      reason: None,
      option_a: None,
      option_b: None,
      event_ids: Vec::new(),
      evicted: Vec::new(),
      issues: Vec::new(),
      dry_run,
    }
  }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlanReport {
  pub days_planned: u32,
  pub created: usize,
  pub rest_days: usize,
  pub results: Vec<DayResult>,
  pub degraded: Vec<ContextSource>,
}

/// Why an existing workout is dropped before its day is planned
fn eviction_reason(
  workout: &ScheduledWorkout,
  context: &PlanningContext,
  progress: &WeeklyProgress,
) -> Option<String> {
  if let Some(other) = context
    .other_events
    .iter()
    .filter(|e| !e.all_day)
    .find(|e| overlaps(workout.start, workout.end, e.start, e.end))
  {
    return Some(format!("conflicts with {}", other.title));
  }

  if progress.dropped_from_program(workout.planned_type) {
    return Some(format!("{} is no longer in the weekly program", workout.planned_type));
  }

  if progress.should_evict(workout.planned_type) {
    return Some(format!(
      "{} already at weekly target ({}/{})",
      workout.planned_type,
      progress.count(workout.planned_type),
      progress.targets.get(workout.planned_type).unwrap_or(0)
    ));
  }

  None
}

fn draft_event(date: NaiveDate, option: &WorkoutOption, label: OptionLabel) -> NewEvent {
  let start = date.and_time(option.start_time);
  NewEvent {
    title: planned_title(label, &planned_headline(option.workout_type, &option.title)),
    start,
    end: start + Duration::minutes(option.duration_minutes),
    description: workout_description(option, label),
  }
}

pub async fn plan_days(
  calendar: &dyn Calendar,
  generator: &dyn PlanGenerator,
  context: &PlanningContext,
  now: NaiveDateTime,
  days: u32,
  dry_run: bool,
) -> Result<PlanReport, EngineError> {
  if context.is_degraded(ContextSource::Calendar) {
    return Err(EngineError::CalendarUnavailable(
      "could not list calendar events".to_string(),
    ));
  }

  let mut report = PlanReport {
    days_planned: days,
    degraded: context.degraded.clone(),
    ..Default::default()
  };
  let mut progress = context.progress.clone();
  let mut deleted_ids: HashSet<String> = HashSet::new();
  let today = now.date();

  for offset in 0..days {
    let Some(date) = today.checked_add_days(Days::new(u64::from(offset))) else {
      tracing::warn!(offset, "Planning horizon past the end of the calendar");
      break;
    };
    tracing::info!(%date, weekday = %date.format("%A"), "Planning day");
    progress.advance_to(date);

    let mut evicted = Vec::new();
    let mut kept = 0;
    for workout in context.scheduled_workouts.iter().filter(|w| w.date == date) {
      if deleted_ids.contains(&workout.id) {
        continue;
      }
      // Past and reconciled workouts are history
      if workout.is_reconciled() || workout.start < now {
        kept += 1;
        continue;
      }

      let Some(reason) = eviction_reason(workout, context, &progress) else {
        kept += 1;
        continue;
      };

      if dry_run {
        tracing::info!(%date, event_id = %workout.id, %reason, "[dry-run] Would remove scheduled workout");
        deleted_ids.insert(workout.id.clone());
        evicted.push(workout.id.clone());
        continue;
      }

      match calendar.delete_event(&workout.id).await {
        Ok(()) | Err(CalendarError::NotFound(_)) => {
          tracing::info!(%date, event_id = %workout.id, %reason, "Removed scheduled workout");
          deleted_ids.insert(workout.id.clone());
          evicted.push(workout.id.clone());
        }
        Err(e) => {
          tracing::error!(%date, event_id = %workout.id, error = %e, "Failed to remove scheduled workout");
          kept += 1;
        }
      }
    }

    if kept > 0 {
      tracing::info!(%date, "Already has a workout scheduled, skipping");
      let mut result = DayResult::new(date, DayStatus::AlreadyScheduled, dry_run);
      result.evicted = evicted;
      report.results.push(result);
      continue;
    }

    let prompt = context.prompt_json(date, &progress);
    let text = match generator.generate(&prompt, date).await {
      Ok(text) => text,
      Err(e) => {
        tracing::error!(%date, error = %e, "Plan generation failed");
        let mut result = DayResult::new(date, DayStatus::LlmError, dry_run);
        result.reason = Some(e.to_string());
        result.evicted = evicted;
        report.results.push(result);
        continue;
      }
    };

    let Some(plan) = sanitize_response(&text, date) else {
      tracing::error!(%date, "Generator output could not be salvaged");
      let mut result = DayResult::new(date, DayStatus::SanitizationError, dry_run);
      result.evicted = evicted;
      report.results.push(result);
      continue;
    };
    for issue in &plan.issues {
      tracing::warn!(%date, %issue, "Plan corrected");
    }

    let (option_a, option_b, b_duplicated) = match plan.plan {
      DayPlan::Rest { reason } => {
        tracing::info!(%date, %reason, "Rest day");
        let mut result = DayResult::new(date, DayStatus::RestDay, dry_run);
        result.reason = Some(reason);
        result.evicted = evicted;
        result.issues = plan.issues;
        report.rest_days += 1;
        report.results.push(result);
        continue;
      }
      DayPlan::Workout {
        option_a,
        option_b,
        b_duplicated,
      } => (option_a, option_b, b_duplicated),
    };

    let drafts = if b_duplicated {
      vec![draft_event(date, &option_a, OptionLabel::None)]
    } else {
      vec![
        draft_event(date, &option_a, OptionLabel::A),
        draft_event(date, &option_b, OptionLabel::B),
      ]
    };

    let mut event_ids = Vec::new();
    if dry_run {
      for draft in &drafts {
        tracing::info!(
          %date,
          title = %draft.title,
          start = %draft.start.format("%H:%M"),
          "[dry-run] Would create workout event"
        );
      }
    } else {
      for draft in &drafts {
        match calendar.create_event(draft).await {
          Ok(event) => {
            tracing::info!(%date, event_id = %event.id, title = %draft.title, "Created workout event");
            event_ids.push(event.id);
          }
          Err(e) => {
            tracing::error!(%date, title = %draft.title, error = %e, "Failed to create workout event");
          }
        }
      }
    }

    let status = if dry_run || !event_ids.is_empty() {
      DayStatus::Created
    } else {
      DayStatus::CalendarError
    };

    if status == DayStatus::Created {
      // Two options fill one slot; only A counts toward the week
      progress.record_planned(option_a.workout_type);
      report.created += 1;
    }

    report.results.push(DayResult {
      date,
      status,
      reason: None,
      option_a: Some(option_a),
      option_b: Some(option_b),
      event_ids,
      evicted,
      issues: plan.issues,
      dry_run,
    });
  }

  tracing::info!(
    created = report.created,
    rest_days = report.rest_days,
    "Planning finished"
  );
  Ok(report)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
