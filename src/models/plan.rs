use chrono::{NaiveDate, NaiveTime};
use serde::{Serialize, Serializer};

use super::workout::WorkoutType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
  Easy,
  Moderate,
  Hard,
}

impl Intensity {
  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_lowercase().as_str() {
      "easy" | "low" | "light" | "recovery" => Some(Intensity::Easy),
      "moderate" | "medium" | "steady" => Some(Intensity::Moderate),
      "hard" | "high" | "intense" | "threshold" => Some(Intensity::Hard),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Intensity::Easy => "Easy",
      Intensity::Moderate => "Moderate",
      Intensity::Hard => "Hard",
    }
  }
}

fn serialize_slot<S: Serializer>(time: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
  s.serialize_str(&format_slot(*time))
}

/// "6:30 AM" style rendering used in plans and reports
pub fn format_slot(time: NaiveTime) -> String {
  time.format("%-I:%M %p").to_string()
}

/// One fully validated workout alternative
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutOption {
  pub workout_type: WorkoutType,
  /// Type label as the generator wrote it
  pub type_label: String,
  pub title: String,
  pub duration_minutes: i64,
  #[serde(rename = "time_suggestion", serialize_with = "serialize_slot")]
  pub start_time: NaiveTime,
  pub intensity: Intensity,
  pub warmup: String,
  pub main_workout: String,
  pub cooldown: String,
  pub backup_plan: String,
  pub target_zone: Option<String>,
  pub rationale: String,
}

impl WorkoutOption {
  pub fn time_suggestion(&self) -> String {
    format_slot(self.start_time)
  }
}

/// Outcome of validating one day's candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DayPlan {
  Rest {
    reason: String,
  },
  Workout {
    option_a: WorkoutOption,
    option_b: WorkoutOption,
    /// B was filled by copying A; only one event is worth writing
    b_duplicated: bool,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SanitizedPlan {
  pub date: NaiveDate,
  pub plan: DayPlan,
  /// Every correction made, for the audit log
  pub issues: Vec<String>,
}
