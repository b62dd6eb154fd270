pub mod event;
pub mod plan;
pub mod recovery;
pub mod workout;

pub use event::{CalendarEvent, EventPatch, NewEvent, OptionLabel, ScheduledWorkout, WorkoutState};
pub use plan::{DayPlan, Intensity, SanitizedPlan, WorkoutOption};
pub use recovery::{HealthSnapshot, SleepSummary, StressSummary};
pub use workout::{normalize_type, types_match, ActualActivity, WorkoutType};
