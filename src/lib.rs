pub mod adaptation;
pub mod calendar;
pub mod config;
pub mod conflicts;
pub mod context;
pub mod db;
pub mod engine;
pub mod error;
pub mod llm;
pub mod models;
pub mod oura;
pub mod planner;
pub mod progress;
pub mod reconcile;
pub mod sanitize;
pub mod strava;
pub mod tracker;

#[cfg(test)]
mod test_utils;

pub use calendar::google::GoogleCalendar;
pub use calendar::{Calendar, CalendarError};
pub use config::EngineConfig;
pub use engine::{Engine, MaintenanceReport};
pub use error::EngineError;
pub use llm::{ClaudeClient, PlanGenerator};
pub use tracker::{FitnessTracker, Wearables};
