//! Engine facade
//!
//! Holds the injected collaborators and configuration and runs the passes.
//! Nothing in here reads the environment or the clock; callers pass `now`.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::collections::HashSet;

use crate::adaptation::{check_health_adaptation, AdaptationReport};
use crate::calendar::Calendar;
use crate::config::{ConfigError, EngineConfig, MAX_WINDOW_DAYS};
use crate::conflicts::{check_future_conflicts, ConflictReport};
use crate::context::build_context;
use crate::db::{record_discrepancies, record_plan_issues, DbPool};
use crate::error::EngineError;
use crate::llm::PlanGenerator;
use crate::planner::{plan_days, PlanReport};
use crate::reconcile::{reconcile_workouts, ReconcileOptions, ReconcileReport};
use crate::tracker::FitnessTracker;

/// Result of the scheduled maintenance job; each pass runs even if an
/// earlier one failed.
#[derive(Debug, Default, Serialize)]
pub struct MaintenanceReport {
  pub reconciliation: Option<ReconcileReport>,
  pub conflicts: Option<ConflictReport>,
  pub adaptation: Option<AdaptationReport>,
  pub errors: Vec<String>,
}

pub struct Engine {
  calendar: Box<dyn Calendar>,
  tracker: Box<dyn FitnessTracker>,
  generator: Option<Box<dyn PlanGenerator>>,
  config: EngineConfig,
  audit: Option<DbPool>,
  dry_run: bool,
}

impl Engine {
  pub fn new(
    calendar: Box<dyn Calendar>,
    tracker: Box<dyn FitnessTracker>,
    config: EngineConfig,
  ) -> Self {
    Self {
      calendar,
      tracker,
      generator: None,
      config,
      audit: None,
      dry_run: false,
    }
  }

  pub fn with_generator(mut self, generator: Box<dyn PlanGenerator>) -> Self {
    self.generator = Some(generator);
    self
  }

  pub fn with_audit(mut self, pool: DbPool) -> Self {
    self.audit = Some(pool);
    self
  }

  pub fn dry_run(mut self, dry_run: bool) -> Self {
    self.dry_run = dry_run;
    self
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Plan `days` days starting today
  pub async fn plan(&self, now: NaiveDateTime, days: u32) -> Result<PlanReport, EngineError> {
    let generator = self.generator.as_deref().ok_or(EngineError::NoGenerator)?;
    check_days(days)?;

    tracing::info!(days, dry_run = self.dry_run, "Workout planning started");
    let context = build_context(
      self.calendar.as_ref(),
      self.tracker.as_ref(),
      &self.config,
      now,
      days,
    )
    .await;

    let report = plan_days(
      self.calendar.as_ref(),
      generator,
      &context,
      now,
      days,
      self.dry_run,
    )
    .await?;

    if let Some(pool) = self.audit_pool() {
      for result in report.results.iter().filter(|r| !r.issues.is_empty()) {
        if let Err(e) = record_plan_issues(pool, result.date, &result.issues, now).await {
          tracing::warn!(date = %result.date, error = %e, "Failed to record plan issues");
        }
      }
    }

    Ok(report)
  }

  /// Reconcile the past `days` days against completed activities
  pub async fn reconcile(
    &self,
    now: NaiveDateTime,
    days: u32,
    force: bool,
  ) -> Result<ReconcileReport, EngineError> {
    check_days(days)?;
    let match_window = Duration::try_hours(self.config.match_window_hours).ok_or_else(|| ConfigError::Invalid {
      name: "MATCH_WINDOW_HOURS".to_string(),
      value: self.config.match_window_hours.to_string(),
    })?;

    let options = ReconcileOptions {
      force,
      dry_run: self.dry_run,
      move_event: self.config.move_on_reconcile,
      match_window,
      activity_limit: self.config.reconcile_activity_limit,
    };

    let report = reconcile_workouts(
      self.calendar.as_ref(),
      self.tracker.as_ref(),
      now,
      days,
      options,
    )
    .await
    .map_err(|e| EngineError::CalendarUnavailable(e.to_string()))?;

    if let Some(pool) = self.audit_pool() {
      if !report.discrepancies.is_empty() {
        match record_discrepancies(pool, &report.discrepancies).await {
          Ok(rows) => tracing::info!(rows, "Recorded discrepancies"),
          Err(e) => tracing::warn!(error = %e, "Failed to record discrepancies"),
        }
      }
    }

    Ok(report)
  }

  /// Delete future workouts that overlap other commitments
  pub async fn conflicts(&self, now: NaiveDateTime, days: u32) -> Result<ConflictReport, EngineError> {
    check_days(days)?;
    let mut deleted_ids = HashSet::new();
    check_future_conflicts(self.calendar.as_ref(), now, days, self.dry_run, &mut deleted_ids)
      .await
      .map_err(|e| EngineError::CalendarUnavailable(e.to_string()))
  }

  /// Flag today's planned workouts when health is poor
  pub async fn adapt(&self, now: NaiveDateTime) -> Result<AdaptationReport, EngineError> {
    check_health_adaptation(
      self.calendar.as_ref(),
      self.tracker.as_ref(),
      now,
      &self.config.thresholds,
      self.dry_run,
    )
    .await
    .map_err(|e| EngineError::CalendarUnavailable(e.to_string()))
  }

  /// Reconciliation, then conflict resolution over the same day count,
  /// then health adaptation
  pub async fn maintenance(&self, now: NaiveDateTime, days: u32, force: bool) -> MaintenanceReport {
    let mut report = MaintenanceReport::default();

    match self.reconcile(now, days, force).await {
      Ok(r) => report.reconciliation = Some(r),
      Err(e) => {
        tracing::error!(error = %e, "Reconciliation failed");
        report.errors.push(format!("reconciliation: {}", e));
      }
    }

    match self.conflicts(now, days).await {
      Ok(r) => report.conflicts = Some(r),
      Err(e) => {
        tracing::error!(error = %e, "Conflict check failed");
        report.errors.push(format!("conflicts: {}", e));
      }
    }

    match self.adapt(now).await {
      Ok(r) => report.adaptation = Some(r),
      Err(e) => {
        tracing::error!(error = %e, "Health adaptation failed");
        report.errors.push(format!("adaptation: {}", e));
      }
    }

    report
  }

  /// Audit writes are skipped entirely on dry runs
  fn audit_pool(&self) -> Option<&DbPool> {
    if self.dry_run {
      None
    } else {
      self.audit.as_ref()
    }
  }
}

fn check_days(days: u32) -> Result<(), EngineError> {
  if days > MAX_WINDOW_DAYS {
    return Err(EngineError::DayRange {
      days,
      max: MAX_WINDOW_DAYS,
    });
  }
  Ok(())
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use crate::planner::DayStatus;
  use crate::test_utils::*;

  fn engine(calendar: &FakeCalendar, tracker: FakeTracker) -> Engine {
    Engine::new(
      Box::new(calendar.clone()),
      Box::new(tracker),
      EngineConfig::default(),
    )
  }

  async fn count_rows(pool: &DbPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
      .fetch_one(pool)
      .await
      .expect("Failed to count rows")
  }

  #[tokio::test]
  async fn test_plan_requires_generator() {
    let calendar = FakeCalendar::default();
    let result = engine(&calendar, FakeTracker::default())
      .plan(at(2026, 1, 5, 5, 0), 3)
      .await;
    assert!(matches!(result, Err(EngineError::NoGenerator)));
  }

  #[tokio::test]
  async fn test_plan_records_issues_unless_dry_run() {
    let pool = setup_test_db().await;
    let calendar = FakeCalendar::default();
    let response = r#"{"should_schedule": true, "option_a": {"type": "Run", "duration_minutes": 5, "time_suggestion": "4:00 AM", "intensity": "easy"}}"#;
    let now = at(2026, 1, 5, 5, 0);

    let dry = engine(&calendar, FakeTracker::default())
      .with_generator(Box::new(ScriptedPlanner::default().respond(date(2026, 1, 5), response)))
      .with_audit(pool.clone())
      .dry_run(true);
    dry.plan(now, 1).await.unwrap();
    assert_eq!(count_rows(&pool, "plan_issues").await, 0);

    let live = engine(&calendar, FakeTracker::default())
      .with_generator(Box::new(ScriptedPlanner::default().respond(date(2026, 1, 5), response)))
      .with_audit(pool.clone());
    let report = live.plan(now, 1).await.unwrap();

    assert_eq!(report.results[0].status, DayStatus::Created);
    let option = report.results[0].option_a.as_ref().unwrap();
    assert_eq!(option.duration_minutes, 20);
    assert_eq!(option.time_suggestion(), "6:00 AM");
    assert_eq!(
      count_rows(&pool, "plan_issues").await,
      report.results[0].issues.len() as i64
    );

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_maintenance_runs_all_passes() {
    let pool = setup_test_db().await;
    let calendar = FakeCalendar::with_events(vec![
      calendar_event("w-past", "Workout: Run - Easy", at(2026, 1, 6, 7, 0), 45),
      calendar_event("w-skip", "Workout: Swim - Drills", at(2026, 1, 5, 12, 0), 40),
      calendar_event("w-today", "Workout: Strength - Full Body", at(2026, 1, 7, 17, 0), 45),
      calendar_event("w-future", "Workout: Bike - Endurance", at(2026, 1, 8, 9, 0), 60),
      calendar_event("m1", "Planning", at(2026, 1, 8, 9, 30), 60),
    ]);
    let tracker = FakeTracker::with_activities(vec![activity_at("Run", at(2026, 1, 6, 7, 5), 42)])
      .with_health(Some(35.0), Some(7.0), Some(30.0));

    let report = engine(&calendar, tracker)
      .with_audit(pool.clone())
      .maintenance(at(2026, 1, 7, 6, 0), 7, false)
      .await;

    assert!(report.errors.is_empty());
    let reconciliation = report.reconciliation.unwrap();
    assert_eq!(reconciliation.matched, 1);
    assert_eq!(reconciliation.no_activity, 1);
    assert_eq!(report.conflicts.unwrap().deleted, 1);
    assert_eq!(report.adaptation.unwrap().adapted, vec!["w-today".to_string()]);

    assert_eq!(calendar.event("w-past").unwrap().title, "Workout: Run \u{2713}");
    assert_eq!(calendar.deleted_ids(), vec!["w-future".to_string()]);
    assert_eq!(count_rows(&pool, "workout_discrepancies").await, 1);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_maintenance_collects_errors() {
    let calendar = FakeCalendar::unreachable();
    let report = engine(&calendar, FakeTracker::default())
      .maintenance(at(2026, 1, 7, 6, 0), 7, false)
      .await;

    assert!(report.reconciliation.is_none());
    assert!(report.conflicts.is_none());
    assert_eq!(report.errors.len(), 2);
    // Health checks out fine, so adaptation never needs the calendar
    assert!(report.adaptation.is_some());
  }

  #[tokio::test]
  async fn test_oversized_day_counts_are_rejected() {
    let calendar = FakeCalendar::with_events(vec![calendar_event(
      "w1",
      "Workout: Run",
      at(2026, 1, 8, 9, 0),
      30,
    )]);
    let engine = engine(&calendar, FakeTracker::default())
      .with_generator(Box::new(ScriptedPlanner::default()));
    let now = at(2026, 1, 7, 6, 0);

    assert!(matches!(
      engine.plan(now, u32::MAX).await,
      Err(EngineError::DayRange { days: u32::MAX, .. })
    ));
    assert!(matches!(
      engine.conflicts(now, MAX_WINDOW_DAYS + 1).await,
      Err(EngineError::DayRange { .. })
    ));

    let report = engine.maintenance(now, u32::MAX, false).await;
    assert_eq!(report.errors.len(), 2);
    assert!(calendar.deleted_ids().is_empty());
  }

  #[tokio::test]
  async fn test_unrepresentable_match_window_is_a_config_error() {
    let calendar = FakeCalendar::default();
    let config = EngineConfig {
      match_window_hours: i64::MAX,
      ..EngineConfig::default()
    };
    let engine = Engine::new(Box::new(calendar), Box::new(FakeTracker::default()), config);

    let result = engine.reconcile(at(2026, 1, 7, 6, 0), 7, false).await;
    assert!(matches!(result, Err(EngineError::Config(_))));
  }
}
