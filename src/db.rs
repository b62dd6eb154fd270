use chrono::{NaiveDate, NaiveDateTime};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;

use crate::error::EngineError;
use crate::reconcile::Discrepancy;

pub type DbPool = SqlitePool;

/// Open (creating if needed) the audit store and run migrations
pub async fn initialize_db(path: &Path) -> Result<DbPool, EngineError> {
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent).map_err(|e| EngineError::Database(sqlx::Error::Io(e)))?;
  }
  let db_url = format!("sqlite://{}?mode=rwc", path.display());

  tracing::debug!(path = %path.display(), "Initializing audit store");

  let pool = SqlitePoolOptions::new()
    .max_connections(5)
    .connect(&db_url)
    .await?;

  sqlx::migrate!("./migrations").run(&pool).await?;

  tracing::info!(path = %path.display(), "Audit store ready");

  Ok(pool)
}

/// Append reconciliation discrepancies; returns the number of rows written
pub async fn record_discrepancies(
  pool: &DbPool,
  discrepancies: &[Discrepancy],
) -> Result<usize, sqlx::Error> {
  let mut tx = pool.begin().await?;

  for d in discrepancies {
    sqlx::query(
      r#"
      INSERT INTO workout_discrepancies (
        workout_date, planned_type, actual_type, actual_duration_minutes,
        matched, types_matched, recorded_at
      )
      VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
      "#,
    )
    .bind(d.date)
    .bind(d.planned_type.as_str())
    .bind(&d.actual_type)
    .bind(d.actual_duration)
    .bind(d.matched)
    .bind(d.types_matched)
    .bind(d.recorded_at)
    .execute(&mut *tx)
    .await?;
  }

  tx.commit().await?;
  Ok(discrepancies.len())
}

/// Append sanitization issues for one plan date
pub async fn record_plan_issues(
  pool: &DbPool,
  plan_date: NaiveDate,
  issues: &[String],
  recorded_at: NaiveDateTime,
) -> Result<usize, sqlx::Error> {
  let mut tx = pool.begin().await?;

  for issue in issues {
    sqlx::query("INSERT INTO plan_issues (plan_date, issue, recorded_at) VALUES (?1, ?2, ?3)")
      .bind(plan_date)
      .bind(issue)
      .bind(recorded_at)
      .execute(&mut *tx)
      .await?;
  }

  tx.commit().await?;
  Ok(issues.len())
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
