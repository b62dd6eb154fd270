//! Fitness tracker collaborator
//!
//! Completed activities come from Strava; recovery, sleep and stress come
//! from Oura. The engine sees both through one `FitnessTracker`.

use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::models::{ActualActivity, SleepSummary, StressSummary};
use crate::oura::{OuraClient, OuraError};
use crate::strava::{StravaClient, StravaError};

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
  #[error("Strava: {0}")]
  Strava(#[from] StravaError),

  #[error("Oura: {0}")]
  Oura(#[from] OuraError),
}

#[async_trait]
pub trait FitnessTracker: Send + Sync {
  /// Most recent completed activities, newest first
  async fn list_activities(&self, limit: usize) -> Result<Vec<ActualActivity>, TrackerError>;

  /// Readiness/recovery score (0-100) for `date`, if one was recorded
  async fn recovery_score(&self, date: NaiveDate) -> Result<Option<f64>, TrackerError>;

  /// The night of sleep that ended on the morning of `date`
  async fn sleep(&self, date: NaiveDate) -> Result<Option<SleepSummary>, TrackerError>;

  async fn stress(&self, date: NaiveDate) -> Result<Option<StressSummary>, TrackerError>;
}

/// Strava activities plus Oura health data
pub struct Wearables {
  strava: StravaClient,
  oura: OuraClient,
}

impl Wearables {
  pub fn new(strava: StravaClient, oura: OuraClient) -> Self {
    Self { strava, oura }
  }

  pub fn from_env(timezone: Tz) -> Result<Self, TrackerError> {
    Ok(Self::new(StravaClient::from_env(timezone)?, OuraClient::from_env()?))
  }
}

#[async_trait]
impl FitnessTracker for Wearables {
  async fn list_activities(&self, limit: usize) -> Result<Vec<ActualActivity>, TrackerError> {
    Ok(self.strava.recent_activities(limit).await?)
  }

  async fn recovery_score(&self, date: NaiveDate) -> Result<Option<f64>, TrackerError> {
    Ok(self.oura.readiness_score(date).await?)
  }

  async fn sleep(&self, date: NaiveDate) -> Result<Option<SleepSummary>, TrackerError> {
    Ok(self.oura.sleep(date).await?)
  }

  async fn stress(&self, date: NaiveDate) -> Result<Option<StressSummary>, TrackerError> {
    Ok(self.oura.stress(date).await?)
  }
}
