//! Weekly Progress Tracker
//!
//! Per-type session counts for the Monday-anchored current week, compared
//! against configured targets. Counts start from completed activities and are
//! advanced in memory as a planning run creates new workouts, so a multi-day
//! run never piles up a type just because the tracker hasn't synced yet.
//!
//! Only the endurance/strength program types are tracked:
//! - run, bike, swim, strength
//! - everything else (yoga, walk, rest, other) is outside the program

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::WeeklyTargets;
use crate::models::{ActualActivity, WorkoutType};

// ---------------------------------------------------------------------------
/// Week Boundary
// ---------------------------------------------------------------------------

/// Monday of the week containing `day`
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(day.weekday().num_days_from_monday() as i64)
}

// ---------------------------------------------------------------------------
/// Weekly Progress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyProgress {
    pub week_start: NaiveDate,
    pub completed: BTreeMap<WorkoutType, u32>,
    pub targets: WeeklyTargets,
}

/// Sessions still needed for one type this week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Shortfall {
    pub workout_type: WorkoutType,
    pub remaining: u32,
}

impl WeeklyProgress {
    pub const TRACKED: [WorkoutType; 4] = [
        WorkoutType::Run,
        WorkoutType::Bike,
        WorkoutType::Swim,
        WorkoutType::Strength,
    ];

    pub fn is_tracked(kind: WorkoutType) -> bool {
        Self::TRACKED.contains(&kind)
    }

    /// Count activities that fall inside the week containing `today`
    pub fn from_activities(
        today: NaiveDate,
        activities: &[ActualActivity],
        targets: WeeklyTargets,
    ) -> Self {
        let start = week_start(today);
        let end = start + Duration::days(7);

        let mut completed = BTreeMap::new();
        for activity in activities {
            if activity.date < start || activity.date >= end {
                continue;
            }
            if Self::is_tracked(activity.workout_type) {
                *completed.entry(activity.workout_type).or_insert(0) += 1;
            }
        }

        Self {
            week_start: start,
            completed,
            targets,
        }
    }

    pub fn count(&self, kind: WorkoutType) -> u32 {
        self.completed.get(&kind).copied().unwrap_or(0)
    }

    /// A program type that was dropped from the targets (missing or zero).
    /// Recovery types such as yoga and walk are never part of the program.
    pub fn dropped_from_program(&self, kind: WorkoutType) -> bool {
        Self::is_tracked(kind) && matches!(self.targets.get(kind), None | Some(0))
    }

    /// Whether an already-scheduled workout of this type should be dropped:
    /// the type left the program, or its target is already met. Untracked
    /// types are never evicted.
    pub fn should_evict(&self, kind: WorkoutType) -> bool {
        if !Self::is_tracked(kind) {
            return false;
        }
        match self.targets.get(kind) {
            None | Some(0) => true,
            Some(target) => self.count(kind) >= target,
        }
    }

    /// Roll over to the week containing `day` once the run crosses Monday.
    /// A later week has no completed activities yet, so it starts from zero
    /// and only sees what this run records into it.
    pub fn advance_to(&mut self, day: NaiveDate) {
        let start = week_start(day);
        if start > self.week_start {
            self.week_start = start;
            self.completed.clear();
        }
    }

    /// Advance the in-memory count for a newly created day plan
    pub fn record_planned(&mut self, kind: WorkoutType) {
        if Self::is_tracked(kind) {
            *self.completed.entry(kind).or_insert(0) += 1;
        }
    }

    /// Types at or past their target, to steer generation away from them
    pub fn over_represented(&self) -> Vec<WorkoutType> {
        self.targets
            .iter()
            .filter(|(kind, target)| self.count(*kind) >= *target)
            .map(|(kind, _)| kind)
            .collect()
    }

    pub fn under_target(&self) -> Vec<Shortfall> {
        self.targets
            .iter()
            .filter_map(|(kind, target)| {
                let done = self.count(kind);
                (done < target).then(|| Shortfall {
                    workout_type: kind,
                    remaining: target - done,
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
/// Tests
// ---------------------------------------------------------------------------
