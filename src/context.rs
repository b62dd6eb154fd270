//! Context Aggregator
//!
//! Builds the `PlanningContext` a planning run works from. Every source is
//! best-effort: a failed fetch leaves its field empty and is listed in
//! `degraded`, so building a context never fails.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

use crate::calendar::{shift_days, split_workouts, Calendar};
use crate::config::{EngineConfig, WeeklyTargets};
use crate::models::{ActualActivity, CalendarEvent, HealthSnapshot, ScheduledWorkout};
use crate::progress::WeeklyProgress;
use crate::tracker::FitnessTracker;

/// Calendar lookahead never shrinks below a week
const MIN_CALENDAR_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
  Recovery,
  Sleep,
  Stress,
  Activities,
  Calendar,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanningContext {
  pub generated_at: NaiveDateTime,
  pub health: HealthSnapshot,
  pub recent_activities: Vec<ActualActivity>,
  /// Rendered "HH:MM–HH:MM: title" blocks per day
  pub busy_by_day: BTreeMap<NaiveDate, Vec<String>>,
  pub scheduled_workouts: Vec<ScheduledWorkout>,
  #[serde(skip)]
  pub other_events: Vec<CalendarEvent>,
  pub weekly_targets: WeeklyTargets,
  /// Progress as of context construction, before this run plans anything
  pub progress: WeeklyProgress,
  pub degraded: Vec<ContextSource>,
}

impl PlanningContext {
  pub fn today(&self) -> NaiveDate {
    self.generated_at.date()
  }

  pub fn is_degraded(&self, source: ContextSource) -> bool {
    self.degraded.contains(&source)
  }

  /// Prompt payload for one day, using the run's current in-memory progress
  pub fn prompt_json(&self, date: NaiveDate, progress: &WeeklyProgress) -> String {
    let payload = json!({
      "plan_date": date,
      "weekday": date.format("%A").to_string(),
      "health": self.health,
      "recent_activities": self.recent_activities,
      "calendar": self.busy_by_day,
      "existing_workouts": self.scheduled_workouts.len(),
      "week_progress": {
        "week_start": progress.week_start,
        "completed": progress.completed,
        "targets": progress.targets,
        "at_or_over_target": progress.over_represented(),
        "under_target": progress.under_target(),
      },
      "unavailable_data": self.degraded,
    });
    serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string())
  }
}

/// "HH:MM–HH:MM: title", or "All day: title"
pub fn render_busy_block(event: &CalendarEvent) -> String {
  if event.all_day {
    format!("All day: {}", event.title)
  } else {
    format!(
      "{}–{}: {}",
      event.start.format("%H:%M"),
      event.end.format("%H:%M"),
      event.title
    )
  }
}

/// Recovery, last night's sleep and stress for `today`; failed fetches are
/// reported back as degraded sources.
pub async fn fetch_health(
  tracker: &dyn FitnessTracker,
  today: NaiveDate,
) -> (HealthSnapshot, Vec<ContextSource>) {
  let mut health = HealthSnapshot {
    date: Some(today),
    ..Default::default()
  };
  let mut degraded = Vec::new();

  match tracker.recovery_score(today).await {
    Ok(score) => health.recovery_score = score,
    Err(e) => {
      tracing::warn!(error = %e, "Recovery score unavailable");
      degraded.push(ContextSource::Recovery);
    }
  }

  match tracker.sleep(today).await {
    Ok(sleep) => {
      if let Some(sleep) = sleep {
        health.sleep_hours = Some(sleep.duration_hours);
        health.sleep_quality = sleep.quality_score;
      }
    }
    Err(e) => {
      tracing::warn!(error = %e, "Sleep data unavailable");
      degraded.push(ContextSource::Sleep);
    }
  }

  match tracker.stress(today).await {
    Ok(stress) => health.avg_stress = stress.map(|s| s.avg_level),
    Err(e) => {
      tracing::warn!(error = %e, "Stress data unavailable");
      degraded.push(ContextSource::Stress);
    }
  }

  (health, degraded)
}

pub async fn build_context(
  calendar: &dyn Calendar,
  tracker: &dyn FitnessTracker,
  config: &EngineConfig,
  now: NaiveDateTime,
  days: u32,
) -> PlanningContext {
  let today = now.date();
  let (health, mut degraded) = fetch_health(tracker, today).await;
  tracing::info!(
    recovery = ?health.recovery_score,
    sleep_hours = ?health.sleep_hours,
    stress = ?health.avg_stress,
    "Health snapshot"
  );

  // Fetch extra so the week's progress sees more than the prompt does
  let fetch_limit = config.recent_activity_limit * 2;
  let mut activities = match tracker.list_activities(fetch_limit).await {
    Ok(activities) => activities,
    Err(e) => {
      tracing::warn!(error = %e, "Recent activities unavailable");
      degraded.push(ContextSource::Activities);
      Vec::new()
    }
  };
  activities.sort_by(|a, b| (b.date, b.start).cmp(&(a.date, a.start)));

  let progress = WeeklyProgress::from_activities(today, &activities, config.weekly_targets.clone());
  activities.truncate(config.recent_activity_limit);
  tracing::info!(recent = activities.len(), completed = ?progress.completed, "Activity history");

  let window_start = today.and_time(NaiveTime::MIN);
  let events = match shift_days(window_start, i64::from(days.max(MIN_CALENDAR_DAYS))) {
    Ok(window_end) => calendar.list_events(window_start, window_end).await,
    Err(e) => Err(e),
  };
  let events = match events {
    Ok(events) => events,
    Err(e) => {
      tracing::error!(error = %e, "Calendar unavailable");
      degraded.push(ContextSource::Calendar);
      Vec::new()
    }
  };

  let (scheduled_workouts, mut other_events) = split_workouts(events);
  other_events.sort_by_key(|e| e.start);

  let mut busy_by_day: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();
  for event in &other_events {
    busy_by_day.entry(event.date()).or_default().push(render_busy_block(event));
  }
  tracing::info!(
    events = other_events.len(),
    workouts = scheduled_workouts.len(),
    "Calendar window"
  );

  PlanningContext {
    generated_at: now,
    health,
    recent_activities: activities,
    busy_by_day,
    scheduled_workouts,
    other_events,
    weekly_targets: config.weekly_targets.clone(),
    progress,
    degraded,
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
