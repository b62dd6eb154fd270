//! Health Adaptation Trigger
//!
//! Checks today's health against the configured thresholds and, when any
//! rule fires, flags today's planned workouts to use their backup plan. The
//! events stay where they are; only the title and description change.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::fmt;

use crate::calendar::codec::{adaptation_note, adapted_title};
use crate::calendar::{split_workouts, Calendar, CalendarError};
use crate::config::HealthThresholds;
use crate::context::fetch_health;
use crate::models::{EventPatch, HealthSnapshot, WorkoutState};
use crate::tracker::FitnessTracker;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdaptationReason {
  LowRecovery { score: f64 },
  PoorSleep { hours: f64 },
  HighStress { level: f64 },
}

impl fmt::Display for AdaptationReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AdaptationReason::LowRecovery { score } => write!(f, "Low recovery ({:.0}/100)", score),
      AdaptationReason::PoorSleep { hours } => write!(f, "Poor sleep ({:.1} hours)", hours),
      AdaptationReason::HighStress { level } => write!(f, "High stress ({:.0}/100)", level),
    }
  }
}

/// Each rule fires independently; missing readings never fire.
pub fn evaluate(health: &HealthSnapshot, thresholds: &HealthThresholds) -> Vec<AdaptationReason> {
  let mut reasons = Vec::new();

  if let Some(score) = health.recovery_score {
    if score < thresholds.low_recovery {
      reasons.push(AdaptationReason::LowRecovery { score });
    }
  }
  if let Some(hours) = health.sleep_hours {
    if hours < thresholds.low_sleep_hours {
      reasons.push(AdaptationReason::PoorSleep { hours });
    }
  }
  if let Some(level) = health.avg_stress {
    if level > thresholds.high_stress {
      reasons.push(AdaptationReason::HighStress { level });
    }
  }

  reasons
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AdaptationReport {
  pub health_checked: bool,
  pub health: HealthSnapshot,
  pub adaptation_needed: bool,
  pub reasons: Vec<String>,
  /// Event ids that were (or in a dry run, would be) annotated
  pub adapted: Vec<String>,
}

pub async fn check_health_adaptation(
  calendar: &dyn Calendar,
  tracker: &dyn FitnessTracker,
  now: NaiveDateTime,
  thresholds: &HealthThresholds,
  dry_run: bool,
) -> Result<AdaptationReport, CalendarError> {
  let today = now.date();
  let (health, degraded) = fetch_health(tracker, today).await;
  if !degraded.is_empty() {
    tracing::warn!(?degraded, "Health data partially unavailable");
  }

  let mut report = AdaptationReport {
    health_checked: health.has_data(),
    health: health.clone(),
    ..Default::default()
  };

  let reasons: Vec<String> = evaluate(&health, thresholds)
    .iter()
    .map(|r| r.to_string())
    .collect();
  if reasons.is_empty() {
    tracing::info!(%today, "Health looks fine, no adaptation needed");
    return Ok(report);
  }

  report.adaptation_needed = true;
  report.reasons = reasons.clone();
  tracing::info!(%today, reasons = %reasons.join(", "), "Adaptation needed");

  let day_start = today.and_time(NaiveTime::MIN);
  let events = calendar
    .list_events(day_start, day_start + Duration::days(1))
    .await?;
  let (workouts, _) = split_workouts(events);

  let note = adaptation_note(&reasons);
  for workout in workouts
    .iter()
    .filter(|w| w.date == today && w.state == WorkoutState::Planned)
  {
    let patch = EventPatch {
      title: Some(adapted_title(workout)),
      description: Some(format!("{}{}", note, workout.description)),
      ..Default::default()
    };

    if dry_run {
      tracing::info!(event_id = %workout.id, title = ?patch.title, "[dry-run] Would flag workout for backup plan");
      report.adapted.push(workout.id.clone());
      continue;
    }

    match calendar.update_event(&workout.id, &patch).await {
      Ok(_) => {
        tracing::info!(event_id = %workout.id, headline = %workout.headline, "Flagged workout for backup plan");
        report.adapted.push(workout.id.clone());
      }
      Err(e) => {
        tracing::warn!(event_id = %workout.id, error = %e, "Failed to flag workout");
      }
    }
  }

  if report.adapted.is_empty() {
    tracing::info!(%today, "No planned workout today to adapt");
  }

  Ok(report)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
