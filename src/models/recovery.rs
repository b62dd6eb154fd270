use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Prior night's sleep as reported by the tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepSummary {
  pub duration_hours: f64,
  pub quality_score: Option<f64>,
}

/// Daily stress on a 0-100 scale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressSummary {
  pub avg_level: f64,
}

/// Today's health signals; each field is absent when its fetch failed
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HealthSnapshot {
  pub date: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub recovery_score: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sleep_hours: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sleep_quality: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub avg_stress: Option<f64>,
}

impl HealthSnapshot {
  /// Check if any health data is present
  pub fn has_data(&self) -> bool {
    self.recovery_score.is_some() || self.sleep_hours.is_some() || self.avg_stress.is_some()
  }
}
