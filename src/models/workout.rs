use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Closed workout taxonomy every free-text label is folded into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutType {
  Run,
  Bike,
  Swim,
  Strength,
  Yoga,
  Walk,
  Rest,
  Other,
}

/// Keyword table checked in order; first hit wins.
const KEYWORDS: &[(WorkoutType, &[&str])] = &[
  (WorkoutType::Run, &["run", "treadmill", "jog"]),
  (WorkoutType::Bike, &["bike", "cycling", "cycle", "ride", "spin"]),
  (WorkoutType::Swim, &["swim", "pool"]),
  (WorkoutType::Strength, &["strength", "weight", "lift", "gym"]),
  (WorkoutType::Yoga, &["yoga", "stretch", "mobility", "pilates"]),
  (WorkoutType::Walk, &["walk", "hike"]),
  (WorkoutType::Rest, &["rest", "recovery"]),
];

impl WorkoutType {
  pub const ALL: [WorkoutType; 8] = [
    WorkoutType::Run,
    WorkoutType::Bike,
    WorkoutType::Swim,
    WorkoutType::Strength,
    WorkoutType::Yoga,
    WorkoutType::Walk,
    WorkoutType::Rest,
    WorkoutType::Other,
  ];

  /// Fold a free-text label ("Treadmill Run", "VirtualRide", "Gym") into the taxonomy.
  /// Pure and idempotent: `normalize(normalize(x).as_str()) == normalize(x)`.
  pub fn normalize(label: &str) -> Self {
    let lower = label.to_lowercase();
    KEYWORDS
      .iter()
      .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
      .map(|(kind, _)| *kind)
      .unwrap_or(WorkoutType::Other)
  }

  /// Whether the label maps to a real taxonomy entry rather than falling through to `Other`
  pub fn is_recognized(label: &str) -> bool {
    let kind = Self::normalize(label);
    kind != WorkoutType::Other || label.trim().eq_ignore_ascii_case("other")
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      WorkoutType::Run => "run",
      WorkoutType::Bike => "bike",
      WorkoutType::Swim => "swim",
      WorkoutType::Strength => "strength",
      WorkoutType::Yoga => "yoga",
      WorkoutType::Walk => "walk",
      WorkoutType::Rest => "rest",
      WorkoutType::Other => "other",
    }
  }

  /// Title-case label used in calendar titles
  pub fn label(&self) -> &'static str {
    match self {
      WorkoutType::Run => "Run",
      WorkoutType::Bike => "Bike",
      WorkoutType::Swim => "Swim",
      WorkoutType::Strength => "Strength",
      WorkoutType::Yoga => "Yoga",
      WorkoutType::Walk => "Walk",
      WorkoutType::Rest => "Rest",
      WorkoutType::Other => "Other",
    }
  }
}

impl std::fmt::Display for WorkoutType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl std::str::FromStr for WorkoutType {
  type Err = String;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    WorkoutType::ALL
      .iter()
      .find(|t| t.as_str() == s)
      .copied()
      .ok_or_else(|| format!("Unknown workout type: {}", s))
  }
}

pub fn normalize_type(label: &str) -> WorkoutType {
  WorkoutType::normalize(label)
}

/// Symmetric comparison of two free-text labels after normalization
pub fn types_match(a: &str, b: &str) -> bool {
  normalize_type(a) == normalize_type(b)
}

/// A completed activity reported by the fitness tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActualActivity {
  pub date: NaiveDate,
  /// Local wall-clock start; absent when the provider timestamp didn't parse
  pub start: Option<NaiveDateTime>,
  /// Provider's own label, e.g. "VirtualRide"
  pub label: String,
  pub workout_type: WorkoutType,
  pub duration_minutes: i64,
  pub calories: Option<i64>,
}

impl ActualActivity {
  pub fn new(
    label: &str,
    date: NaiveDate,
    start: Option<NaiveDateTime>,
    duration_minutes: i64,
    calories: Option<i64>,
  ) -> Self {
    Self {
      date,
      start,
      label: label.to_string(),
      workout_type: WorkoutType::normalize(label),
      duration_minutes,
      calories,
    }
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_normalize_run_variations() {
    assert_eq!(normalize_type("Run"), WorkoutType::Run);
    assert_eq!(normalize_type("running"), WorkoutType::Run);
    assert_eq!(normalize_type("Treadmill Run"), WorkoutType::Run);
    assert_eq!(normalize_type("Easy Run"), WorkoutType::Run);
    assert_eq!(normalize_type("Recovery Run"), WorkoutType::Run);
  }

  #[test]
  fn test_normalize_bike_variations() {
    assert_eq!(normalize_type("Bike"), WorkoutType::Bike);
    assert_eq!(normalize_type("Cycling"), WorkoutType::Bike);
    assert_eq!(normalize_type("Indoor Bike"), WorkoutType::Bike);
    assert_eq!(normalize_type("cycle"), WorkoutType::Bike);
    assert_eq!(normalize_type("VirtualRide"), WorkoutType::Bike);
  }

  #[test]
  fn test_normalize_strength_and_swim() {
    assert_eq!(normalize_type("Weight Training"), WorkoutType::Strength);
    assert_eq!(normalize_type("WeightTraining"), WorkoutType::Strength);
    assert_eq!(normalize_type("Lifting"), WorkoutType::Strength);
    assert_eq!(normalize_type("Gym"), WorkoutType::Strength);
    assert_eq!(normalize_type("swimming"), WorkoutType::Swim);
    assert_eq!(normalize_type("Pool"), WorkoutType::Swim);
  }

  #[test]
  fn test_normalize_unknown_is_other() {
    assert_eq!(normalize_type("Rock Climbing"), WorkoutType::Other);
    assert_eq!(normalize_type(""), WorkoutType::Other);
    assert!(!WorkoutType::is_recognized("Rock Climbing"));
    assert!(WorkoutType::is_recognized("other"));
    assert!(WorkoutType::is_recognized("Hike"));
  }

  #[test]
  fn test_normalize_is_idempotent() {
    for label in ["Run", "Indoor Bike", "Open Water Swim", "Gym", "Stretch", "Hike", "Rest", "Kayak"] {
      let once = normalize_type(label);
      assert_eq!(normalize_type(once.as_str()), once, "label {}", label);
      assert_eq!(normalize_type(once.label()), once, "label {}", label);
    }
  }

  #[test]
  fn test_types_match() {
    assert!(types_match("Run", "Easy Run"));
    assert!(types_match("Easy Run", "Run"));
    assert!(types_match("Strength", "Weight Training"));
    assert!(!types_match("Run", "Bike"));
    assert!(!types_match("Bike", "Run"));
    assert!(!types_match("Strength", "Swim"));
  }

  #[test]
  fn test_workout_type_from_str_roundtrip() {
    for kind in WorkoutType::ALL {
      assert_eq!(kind.as_str().parse::<WorkoutType>().unwrap(), kind);
    }
    assert!("jogging".parse::<WorkoutType>().is_err());
  }
}
