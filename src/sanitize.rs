//! Plan validation and repair
//!
//! Generator output is untrusted. This module turns one raw day-plan into a
//! fully typed, already-defaulted `SanitizedPlan`, or gives up with `None`
//! when there is nothing usable. Every correction it makes is recorded as an
//! issue string so the caller can write it to the audit log.

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde_json::{Map, Value};

use crate::llm::extract_json;
use crate::models::{DayPlan, Intensity, SanitizedPlan, WorkoutOption, WorkoutType};

/// ---------------------------------------------------------------------------
/// Bounds & Defaults
/// ---------------------------------------------------------------------------

pub const MIN_DURATION_MINUTES: i64 = 15;
pub const MAX_DURATION_MINUTES: i64 = 180;
/// Replacement for durations under the minimum
const SHORT_DURATION_REPLACEMENT: i64 = 20;
/// Replacement for durations over the maximum
const LONG_DURATION_REPLACEMENT: i64 = 90;
const DEFAULT_DURATION_MINUTES: i64 = 45;

/// Earliest allowed start hour (inclusive)
pub const EARLIEST_HOUR: u32 = 5;
/// Latest allowed start hour (exclusive)
pub const LATEST_HOUR: u32 = 21;

const DEFAULT_REST_REASON: &str = "Rest recommended";
const DEFAULT_WARMUP: &str = "5-10 minutes of easy movement and dynamic stretching";
const DEFAULT_MAIN: &str = "Complete the planned workout at a comfortable, controlled effort";
const DEFAULT_COOLDOWN: &str = "5 minutes of easy movement followed by light stretching";
const DEFAULT_BACKUP: &str = "Reduce to 20-30 minutes at an easy effort, or take a brisk walk instead";
const DEFAULT_RATIONALE: &str = "Scheduled based on your training plan";

fn default_time() -> NaiveTime {
  NaiveTime::from_hms_opt(6, 30, 0).unwrap_or(NaiveTime::MIN)
}

fn early_clamp() -> NaiveTime {
  NaiveTime::from_hms_opt(6, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn late_clamp() -> NaiveTime {
  NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// ---------------------------------------------------------------------------
/// Entry Points
/// ---------------------------------------------------------------------------

/// Sanitize raw generator text: pull the JSON object out, then validate it
pub fn sanitize_response(text: &str, date: NaiveDate) -> Option<SanitizedPlan> {
  let json = match extract_json(text) {
    Ok(json) => json,
    Err(e) => {
      tracing::warn!(%date, error = %e, "No JSON object in generator output");
      return None;
    }
  };

  match serde_json::from_str::<Value>(&json) {
    Ok(value) => sanitize_plan(&value, date),
    Err(e) => {
      tracing::warn!(%date, error = %e, "Generator output is not valid JSON");
      None
    }
  }
}

/// Validate and repair one raw day-plan
pub fn sanitize_plan(raw: &Value, date: NaiveDate) -> Option<SanitizedPlan> {
  let root = raw.as_object()?;
  let mut issues = Vec::new();

  let should_schedule = root
    .get("should_schedule")
    .or_else(|| root.get("should_workout"))
    .map(|v| truthy(v, &mut issues))
    .unwrap_or(true);

  if !should_schedule {
    let reason = text_field(root, "reason_if_skip")
      .or_else(|| text_field(root, "reason"))
      .unwrap_or_else(|| DEFAULT_REST_REASON.to_string());
    return Some(SanitizedPlan {
      date,
      plan: DayPlan::Rest { reason },
      issues,
    });
  }

  let mut raw_a = object_field(root, "option_a");
  let mut raw_b = object_field(root, "option_b");

  if raw_a.is_none() && raw_b.is_none() {
    if let Some(legacy) = object_field(root, "workout") {
      issues.push("legacy single-workout shape; duplicated into option_a and option_b".to_string());
      raw_a = Some(legacy);
      raw_b = Some(legacy);
    }
  }

  let b_duplicated = match (raw_a, raw_b) {
    (Some(_), Some(_)) => raw_a == raw_b,
    (Some(a), None) => {
      issues.push("option_b missing; duplicated option_a".to_string());
      raw_b = Some(a);
      true
    }
    (None, Some(b)) => {
      issues.push("option_a missing; promoted option_b".to_string());
      raw_a = Some(b);
      true
    }
    (None, None) => {
      tracing::warn!(%date, "Plan has no workout option");
      return None;
    }
  };

  let (Some(raw_a), Some(raw_b)) = (raw_a, raw_b) else {
    return None;
  };

  let option_a = sanitize_option(raw_a, "option_a", &mut issues);
  let mut option_b = if b_duplicated {
    option_a.clone()
  } else {
    sanitize_option(raw_b, "option_b", &mut issues)
  };

  if option_b.start_time != option_a.start_time {
    issues.push(format!(
      "option_b time {} aligned to option_a time {}",
      option_b.time_suggestion(),
      option_a.time_suggestion()
    ));
    option_b.start_time = option_a.start_time;
  }

  if !b_duplicated && option_a.workout_type == option_b.workout_type {
    issues.push(format!(
      "both options are {}; expected two different alternatives",
      option_a.workout_type
    ));
  }

  Some(SanitizedPlan {
    date,
    plan: DayPlan::Workout {
      option_a,
      option_b,
      b_duplicated,
    },
    issues,
  })
}

/// ---------------------------------------------------------------------------
/// Per-Option Rules
/// ---------------------------------------------------------------------------

fn sanitize_option(raw: &Map<String, Value>, slot: &str, issues: &mut Vec<String>) -> WorkoutOption {
  let type_label = match text_field(raw, "type") {
    Some(label) => label,
    None => {
      issues.push(format!("{}: missing type", slot));
      text_field(raw, "title").unwrap_or_else(|| "Workout".to_string())
    }
  };
  if !WorkoutType::is_recognized(&type_label) {
    issues.push(format!("{}: unknown workout type '{}'", slot, type_label));
  }
  let workout_type = WorkoutType::normalize(&type_label);

  let title = text_field(raw, "title").unwrap_or_else(|| workout_type.label().to_string());

  let duration_minutes = sanitize_duration(raw.get("duration_minutes"), slot, issues);
  let start_time = sanitize_time(raw.get("time_suggestion"), slot, issues);

  let intensity = match text_field(raw, "intensity") {
    Some(label) => Intensity::parse(&label).unwrap_or_else(|| {
      issues.push(format!("{}: unknown intensity '{}', using moderate", slot, label));
      Intensity::Moderate
    }),
    None => {
      issues.push(format!("{}: missing intensity, using moderate", slot));
      Intensity::Moderate
    }
  };

  WorkoutOption {
    workout_type,
    type_label,
    title,
    duration_minutes,
    start_time,
    intensity,
    warmup: text_or_default(raw, "warmup", DEFAULT_WARMUP, slot, issues),
    main_workout: text_or_default(raw, "main_workout", DEFAULT_MAIN, slot, issues),
    cooldown: text_or_default(raw, "cooldown", DEFAULT_COOLDOWN, slot, issues),
    backup_plan: text_or_default(raw, "backup_plan", DEFAULT_BACKUP, slot, issues),
    target_zone: text_field(raw, "target_hr_zone"),
    rationale: text_field(raw, "why_this_workout").unwrap_or_else(|| DEFAULT_RATIONALE.to_string()),
  }
}

/// Bounded duration in minutes: under 15 becomes 20, over 180 becomes 90,
/// anything unreadable becomes 45.
pub fn sanitize_duration(raw: Option<&Value>, slot: &str, issues: &mut Vec<String>) -> i64 {
  let Some(minutes) = raw.and_then(read_minutes) else {
    issues.push(format!(
      "{}: unreadable duration, using {} minutes",
      slot, DEFAULT_DURATION_MINUTES
    ));
    return DEFAULT_DURATION_MINUTES;
  };

  if minutes < MIN_DURATION_MINUTES {
    issues.push(format!(
      "{}: duration {} too short, using {}",
      slot, minutes, SHORT_DURATION_REPLACEMENT
    ));
    SHORT_DURATION_REPLACEMENT
  } else if minutes > MAX_DURATION_MINUTES {
    issues.push(format!(
      "{}: duration {} too long, using {}",
      slot, minutes, LONG_DURATION_REPLACEMENT
    ));
    LONG_DURATION_REPLACEMENT
  } else {
    minutes
  }
}

fn read_minutes(value: &Value) -> Option<i64> {
  match value {
    Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
    Value::String(s) => {
      let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
      digits.parse().ok()
    }
    _ => None,
  }
}

/// Start time inside [05:00, 21:00); unreadable input becomes 6:30 AM
pub fn sanitize_time(raw: Option<&Value>, slot: &str, issues: &mut Vec<String>) -> NaiveTime {
  let text = raw.and_then(Value::as_str).unwrap_or("");

  let Some(time) = parse_time_suggestion(text) else {
    issues.push(format!("{}: unreadable time '{}', using 6:30 AM", slot, text));
    return default_time();
  };

  if time.hour() < EARLIEST_HOUR {
    issues.push(format!("{}: time {} too early, using 6:00 AM", slot, text));
    early_clamp()
  } else if time.hour() >= LATEST_HOUR {
    issues.push(format!("{}: time {} too late, using 6:00 PM", slot, text));
    late_clamp()
  } else {
    time
  }
}

/// Accepts "6:30 AM", "7 PM", "6:30am" and 24-hour "18:15"
pub fn parse_time_suggestion(text: &str) -> Option<NaiveTime> {
  let upper = text.trim().to_uppercase();
  if upper.is_empty() {
    return None;
  }

  let (clock, meridiem) = if let Some(rest) = upper.strip_suffix("AM") {
    (rest.trim(), Some(false))
  } else if let Some(rest) = upper.strip_suffix("PM") {
    (rest.trim(), Some(true))
  } else {
    (upper.as_str(), None)
  };

  let (hour_text, minute_text) = clock.split_once(':').unwrap_or((clock, "0"));
  let mut hour: u32 = hour_text.trim().parse().ok()?;
  let minute: u32 = minute_text.trim().parse().ok()?;

  match meridiem {
    Some(is_pm) => {
      if hour == 0 || hour > 12 {
        return None;
      }
      if is_pm && hour != 12 {
        hour += 12;
      } else if !is_pm && hour == 12 {
        hour = 0;
      }
    }
    None if !clock.contains(':') => return None,
    None => {}
  }

  NaiveTime::from_hms_opt(hour, minute, 0)
}

/// ---------------------------------------------------------------------------
/// Field Helpers
/// ---------------------------------------------------------------------------

fn object_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
  map.get(key).and_then(Value::as_object)
}

/// Non-empty trimmed string, or a number rendered as text
fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
  match map.get(key)? {
    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

fn text_or_default(
  map: &Map<String, Value>,
  key: &str,
  default: &str,
  slot: &str,
  issues: &mut Vec<String>,
) -> String {
  text_field(map, key).unwrap_or_else(|| {
    issues.push(format!("{}: empty {}, using default", slot, key));
    default.to_string()
  })
}

fn truthy(value: &Value, issues: &mut Vec<String>) -> bool {
  match value {
    Value::Bool(b) => *b,
    Value::String(s) => !matches!(s.trim().to_lowercase().as_str(), "false" | "no" | "0"),
    Value::Null => true,
    other => {
      issues.push(format!("unexpected should_schedule value {}, scheduling anyway", other));
      true
    }
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 6).unwrap()
  }

  fn option(kind: &str, time: &str, duration: Value) -> Value {
    json!({
      "type": kind,
      "title": format!("{} session", kind),
      "duration_minutes": duration,
      "intensity": "easy",
      "time_suggestion": time,
      "warmup": "10 min easy",
      "main_workout": "Main set",
      "cooldown": "5 min easy",
      "backup_plan": "Reduce to 20 minutes",
      "target_hr_zone": "Zone 2",
      "why_this_workout": "Aerobic base"
    })
  }

  fn workout(plan: &SanitizedPlan) -> (&WorkoutOption, &WorkoutOption, bool) {
    match &plan.plan {
      DayPlan::Workout {
        option_a,
        option_b,
        b_duplicated,
      } => (option_a, option_b, *b_duplicated),
      DayPlan::Rest { .. } => panic!("expected a workout plan"),
    }
  }

  fn slot_time(text: &str) -> String {
    let mut issues = Vec::new();
    let time = sanitize_time(Some(&json!(text)), "option_a", &mut issues);
    crate::models::plan::format_slot(time)
  }

  fn duration(value: Value) -> i64 {
    let mut issues = Vec::new();
    sanitize_duration(Some(&value), "option_a", &mut issues)
  }

  #[test]
  fn test_duration_bounds() {
    assert_eq!(duration(json!(5)), 20);
    assert_eq!(duration(json!(240)), 90);
    assert_eq!(duration(json!(45)), 45);
    assert_eq!(duration(json!(15)), 15);
    assert_eq!(duration(json!(180)), 180);
    assert_eq!(duration(json!("60 min")), 60);
    assert_eq!(duration(json!("about an hour")), 45);
    assert_eq!(duration(json!(null)), 45);

    for raw in [-30, 0, 1, 14, 16, 179, 181, 1000] {
      let d = duration(json!(raw));
      assert!((MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&d), "{} -> {}", raw, d);
    }
  }

  #[test]
  fn test_time_clamping() {
    assert_eq!(slot_time("4:00 AM"), "6:00 AM");
    assert_eq!(slot_time("10:30 PM"), "6:00 PM");
    assert_eq!(slot_time("whenever"), "6:30 AM");
    assert_eq!(slot_time(""), "6:30 AM");
    assert_eq!(slot_time("7:15 AM"), "7:15 AM");
    assert_eq!(slot_time("12:00 PM"), "12:00 PM");
    assert_eq!(slot_time("12:30 AM"), "6:00 AM");
    assert_eq!(slot_time("6 PM"), "6:00 PM");
    assert_eq!(slot_time("17:45"), "5:45 PM");
    assert_eq!(slot_time("21:00"), "6:00 PM");
    assert_eq!(slot_time("5:00 AM"), "5:00 AM");
  }

  #[test]
  fn test_sanitized_hour_always_in_range() {
    for hour in 0..24 {
      let text = format!("{:02}:10", hour);
      let mut issues = Vec::new();
      let time = sanitize_time(Some(&json!(text)), "option_a", &mut issues);
      assert!((EARLIEST_HOUR..LATEST_HOUR).contains(&time.hour()), "{} -> {}", text, time);
    }
  }

  #[test]
  fn test_options_share_time_slot() {
    let raw = json!({
      "should_schedule": true,
      "option_a": option("Run", "7:00 AM", json!(45)),
      "option_b": option("Strength", "5:30 PM", json!(50)),
    });

    let plan = sanitize_plan(&raw, day()).unwrap();
    let (a, b, duplicated) = workout(&plan);

    assert!(!duplicated);
    assert_eq!(a.time_suggestion(), "7:00 AM");
    assert_eq!(a.time_suggestion(), b.time_suggestion());
    assert_eq!(b.workout_type, WorkoutType::Strength);
    assert!(plan.issues.iter().any(|i| i.contains("aligned")));
  }

  #[test]
  fn test_legacy_workout_shape_is_duplicated() {
    let raw = json!({
      "should_workout": true,
      "workout": option("Bike", "6:00 AM", json!(60)),
    });

    let plan = sanitize_plan(&raw, day()).unwrap();
    let (a, b, duplicated) = workout(&plan);

    assert!(duplicated);
    assert_eq!(a, b);
    assert_eq!(a.workout_type, WorkoutType::Bike);
    assert!(plan.issues.iter().any(|i| i.contains("legacy")));
    // A duplicate is not a "same type" alternative
    assert!(!plan.issues.iter().any(|i| i.contains("two different")));
  }

  #[test]
  fn test_lone_option_fills_missing_slot() {
    let raw = json!({ "option_a": option("Swim", "6:30 AM", json!(40)) });
    let plan = sanitize_plan(&raw, day()).unwrap();
    let (a, b, duplicated) = workout(&plan);
    assert!(duplicated);
    assert_eq!(a.title, b.title);

    let raw = json!({ "option_b": option("Swim", "6:30 AM", json!(40)) });
    let plan = sanitize_plan(&raw, day()).unwrap();
    assert!(workout(&plan).2);
  }

  #[test]
  fn test_no_option_is_terminal() {
    assert!(sanitize_plan(&json!({ "should_schedule": true }), day()).is_none());
    assert!(sanitize_plan(&json!({ "option_a": "run please" }), day()).is_none());
    assert!(sanitize_plan(&json!(null), day()).is_none());
    assert!(sanitize_plan(&json!([1, 2]), day()).is_none());
  }

  #[test]
  fn test_rest_day() {
    let raw = json!({ "should_schedule": false, "reason_if_skip": "Recovery score is 28" });
    let plan = sanitize_plan(&raw, day()).unwrap();
    assert_eq!(
      plan.plan,
      DayPlan::Rest {
        reason: "Recovery score is 28".into()
      }
    );
  }

  #[test]
  fn test_unknown_type_and_same_type_are_warnings_only() {
    let raw = json!({
      "option_a": option("Crossfit", "6:30 AM", json!(45)),
      "option_b": option("Zumba", "6:30 AM", json!(45)),
    });

    let plan = sanitize_plan(&raw, day()).unwrap();
    let (a, b, _) = workout(&plan);

    assert_eq!(a.workout_type, WorkoutType::Other);
    assert_eq!(b.workout_type, WorkoutType::Other);
    assert_eq!(a.type_label, "Crossfit");
    assert!(plan.issues.iter().any(|i| i.contains("unknown workout type 'Crossfit'")));
    assert!(plan.issues.iter().any(|i| i.contains("two different")));
  }

  #[test]
  fn test_empty_text_fields_get_defaults() {
    let raw = json!({
      "option_a": {
        "type": "Run",
        "title": "Easy Run",
        "duration_minutes": 30,
        "time_suggestion": "6:30 AM",
        "intensity": "easy",
        "warmup": "",
        "main_workout": "   "
      }
    });

    let plan = sanitize_plan(&raw, day()).unwrap();
    let (a, _, _) = workout(&plan);

    assert_eq!(a.warmup, DEFAULT_WARMUP);
    assert_eq!(a.main_workout, DEFAULT_MAIN);
    assert_eq!(a.cooldown, DEFAULT_COOLDOWN);
    assert!(a.backup_plan.contains("Reduce") || a.backup_plan.contains("walk"));
    assert_eq!(a.target_zone, None);
    assert_eq!(a.rationale, DEFAULT_RATIONALE);
  }

  #[test]
  fn test_sanitize_response_extracts_fenced_json() {
    let text = format!(
      "Here is the plan:\n```json\n{}\n```",
      json!({ "option_a": option("Run", "6:00 AM", json!(30)) })
    );
    let plan = sanitize_response(&text, day()).unwrap();
    assert_eq!(workout(&plan).0.duration_minutes, 30);

    assert!(sanitize_response("I cannot plan today.", day()).is_none());
  }
}
