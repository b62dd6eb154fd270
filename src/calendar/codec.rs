//! Title and description encoding for engine-owned events
//!
//! Title grammar:
//!
//! ```text
//! [⚠️ ] [🅰️ |🅱️ ] Workout: <headline> [✓ [(Planned: <type>)]] [(Use Backup Plan)]
//! ```
//!
//! Core logic never looks at these strings; it works on `ScheduledWorkout`.

use chrono::NaiveDateTime;

use crate::models::{
  ActualActivity, CalendarEvent, OptionLabel, ScheduledWorkout, WorkoutOption, WorkoutState,
  WorkoutType,
};

pub const WORKOUT_PREFIX: &str = "Workout:";
const OPTION_A_GLYPH: &str = "\u{1F170}";
const OPTION_B_GLYPH: &str = "\u{1F171}";
const VARIATION_SELECTOR: char = '\u{FE0F}';
const RECONCILED_MARK: &str = "\u{2713}";
const ADAPTED_MARK: &str = "\u{26A0}";
const BACKUP_SUFFIX: &str = "(Use Backup Plan)";
const PLANNED_OPEN: &str = "(Planned:";

/// Decoded form of an engine-owned title
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTitle {
  pub option: OptionLabel,
  pub headline: String,
  pub planned_type: WorkoutType,
  pub state: WorkoutState,
}

/// ---------------------------------------------------------------------------
/// Decoding
/// ---------------------------------------------------------------------------

fn strip_glyph<'a>(text: &'a str, glyph: &str) -> Option<&'a str> {
  text
    .strip_prefix(glyph)
    .map(|rest| rest.strip_prefix(VARIATION_SELECTOR).unwrap_or(rest).trim_start())
}

fn strip_workout_prefix(text: &str) -> Option<&str> {
  let head = text.get(..WORKOUT_PREFIX.len())?;
  if head.eq_ignore_ascii_case(WORKOUT_PREFIX) {
    Some(text[WORKOUT_PREFIX.len()..].trim())
  } else {
    None
  }
}

/// Planned type from a headline like "Run - Easy Zone 2"
fn headline_type(headline: &str) -> WorkoutType {
  let lead = headline.split(" - ").next().unwrap_or(headline);
  match WorkoutType::normalize(lead) {
    WorkoutType::Other => WorkoutType::normalize(headline),
    kind => kind,
  }
}

/// Parse an event title; `None` when the event isn't engine-owned
pub fn decode_title(title: &str) -> Option<DecodedTitle> {
  let mut rest = title.trim();
  let mut adapted = false;

  if let Some(stripped) = strip_glyph(rest, ADAPTED_MARK) {
    adapted = true;
    rest = stripped;
  }
  if let Some(stripped) = rest.strip_suffix(BACKUP_SUFFIX) {
    adapted = true;
    rest = stripped.trim_end();
  }

  let option = if let Some(stripped) = strip_glyph(rest, OPTION_A_GLYPH) {
    rest = stripped;
    OptionLabel::A
  } else if let Some(stripped) = strip_glyph(rest, OPTION_B_GLYPH) {
    rest = stripped;
    OptionLabel::B
  } else {
    OptionLabel::None
  };

  let headline = strip_workout_prefix(rest)?;

  if let Some((actual_part, tail)) = headline.split_once(RECONCILED_MARK) {
    let actual = WorkoutType::normalize(actual_part);
    let planned = tail
      .find(PLANNED_OPEN)
      .map(|idx| {
        let inner = &tail[idx + PLANNED_OPEN.len()..];
        WorkoutType::normalize(inner.trim_end_matches(')').trim())
      })
      .unwrap_or(actual);

    return Some(DecodedTitle {
      option,
      headline: actual_part.trim().to_string(),
      planned_type: planned,
      state: WorkoutState::Reconciled { actual },
    });
  }

  Some(DecodedTitle {
    option,
    headline: headline.to_string(),
    planned_type: headline_type(headline),
    state: if adapted { WorkoutState::Adapted } else { WorkoutState::Planned },
  })
}

pub fn decode_workout(event: &CalendarEvent) -> Option<ScheduledWorkout> {
  let decoded = decode_title(&event.title)?;
  Some(ScheduledWorkout {
    id: event.id.clone(),
    date: event.date(),
    start: event.start,
    end: event.end,
    option: decoded.option,
    planned_type: decoded.planned_type,
    headline: decoded.headline,
    state: decoded.state,
    description: event.description.clone(),
  })
}

/// ---------------------------------------------------------------------------
/// Encoding
/// ---------------------------------------------------------------------------

fn option_prefix(option: OptionLabel) -> String {
  match option {
    OptionLabel::A => format!("{}{} ", OPTION_A_GLYPH, VARIATION_SELECTOR),
    OptionLabel::B => format!("{}{} ", OPTION_B_GLYPH, VARIATION_SELECTOR),
    OptionLabel::None => String::new(),
  }
}

/// Headline that keeps the planned type recoverable from the title alone
pub fn planned_headline(kind: WorkoutType, title: &str) -> String {
  let title = title.trim();
  if title.is_empty() || title.eq_ignore_ascii_case(kind.label()) {
    kind.label().to_string()
  } else {
    format!("{} - {}", kind.label(), title)
  }
}

pub fn planned_title(option: OptionLabel, headline: &str) -> String {
  format!("{}{} {}", option_prefix(option), WORKOUT_PREFIX, headline)
}

pub fn adapted_title(workout: &ScheduledWorkout) -> String {
  format!(
    "{}{} {} {}",
    ADAPTED_MARK,
    VARIATION_SELECTOR,
    planned_title(workout.option, &workout.headline),
    BACKUP_SUFFIX
  )
}

pub fn reconciled_title(actual: WorkoutType, planned: WorkoutType) -> String {
  if actual == planned {
    format!("{} {} {}", WORKOUT_PREFIX, actual.label(), RECONCILED_MARK)
  } else {
    format!(
      "{} {} {} {} {})",
      WORKOUT_PREFIX,
      actual.label(),
      RECONCILED_MARK,
      PLANNED_OPEN,
      planned.label()
    )
  }
}

/// Full description for a newly planned workout event
pub fn workout_description(option: &WorkoutOption, label: OptionLabel) -> String {
  let heading = match label {
    OptionLabel::A => "OPTION A",
    OptionLabel::B => "OPTION B",
    OptionLabel::None => "WORKOUT",
  };

  let mut text = format!(
    "{} - {} {} ({} intensity)\n\nDuration: {} minutes\n",
    heading,
    option.workout_type.label(),
    option.title,
    option.intensity.as_str(),
    option.duration_minutes
  );
  if let Some(zone) = &option.target_zone {
    text.push_str(&format!("Target: {}\n", zone));
  }
  text.push_str(&format!(
    "\nWARM-UP:\n{}\n\nMAIN WORKOUT:\n{}\n\nCOOL-DOWN:\n{}\n\nBACKUP PLAN:\n{}\n\nWHY THIS WORKOUT:\n{}\n",
    option.warmup, option.main_workout, option.cooldown, option.backup_plan, option.rationale
  ));
  if label != OptionLabel::None {
    text.push_str("\nOptions A and B share this time slot - do one of them.\n");
  }
  text.push_str("\n---\nAuto-scheduled by workout autopilot\n");
  text
}

/// Block appended to a reconciled event's description
pub fn reconciliation_block(
  activity: &ActualActivity,
  planned: WorkoutType,
  reconciled_at: NaiveDateTime,
) -> String {
  let mut block = format!(
    "\n---\n{} RECONCILED: actual workout recorded\n\nActual: {} ({})\nDuration: {} min\nCalories: {}\n",
    RECONCILED_MARK,
    activity.workout_type.label(),
    activity.label,
    activity.duration_minutes,
    activity
      .calories
      .map(|c| c.to_string())
      .unwrap_or_else(|| "N/A".to_string())
  );
  if activity.workout_type != planned {
    block.push_str(&format!("Planned: {}\n", planned.label()));
  }
  block.push_str(&format!("\nReconciled: {}\n", reconciled_at.format("%Y-%m-%d %H:%M")));
  block
}

/// Note prepended to an adapted event's description
pub fn adaptation_note(reasons: &[String]) -> String {
  format!(
    "{}{} LOW ENERGY ALERT\nYour body needs extra recovery today.\nReasons: {}\n\n\
     STRONGLY RECOMMEND using the BACKUP PLAN below instead of the full workout.\n\n{}\n\n",
    ADAPTED_MARK,
    VARIATION_SELECTOR,
    reasons.join(", "),
    "=".repeat(50)
  )
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
