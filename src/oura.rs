use chrono::{Duration, NaiveDate};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::env;

use crate::models::{SleepSummary, StressSummary};

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

const OURA_API_BASE: &str = "https://api.ouraring.com/v2/usercollection";

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum OuraError {
  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("API error: {0}")]
  Api(String),
}

/// ---------------------------------------------------------------------------
/// Oura API Data Structures
/// ---------------------------------------------------------------------------

/// Every usercollection endpoint wraps its rows in `data`
#[derive(Debug, Deserialize)]
pub struct Collection<T> {
  pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct DailyReadiness {
  pub day: NaiveDate,
  pub score: Option<f64>,
}

/// One sleep period; a night may contain naps as separate periods
#[derive(Debug, Deserialize)]
pub struct SleepPeriod {
  pub day: NaiveDate,
  #[serde(rename = "type", default)]
  pub period_type: Option<String>,
  pub total_sleep_duration: Option<i64>, // seconds
  pub efficiency: Option<f64>,           // percentage (0-100)
}

#[derive(Debug, Deserialize)]
pub struct DailyStress {
  pub day: NaiveDate,
  pub stress_high: Option<i64>,   // seconds
  pub recovery_high: Option<i64>, // seconds
}

impl DailyStress {
  /// Share of high-stress time among all flagged time, on a 0-100 scale
  pub fn level(&self) -> Option<f64> {
    let stress = self.stress_high.unwrap_or(0) as f64;
    let recovery = self.recovery_high.unwrap_or(0) as f64;
    let total = stress + recovery;
    (total > 0.0).then(|| stress / total * 100.0)
  }
}

/// ---------------------------------------------------------------------------
/// Oura API Client
/// ---------------------------------------------------------------------------

pub struct OuraClient {
  client: Client,
  access_token: String,
  api_base: String,
}

impl OuraClient {
  pub fn new(access_token: &str) -> Self {
    Self {
      client: Client::new(),
      access_token: access_token.to_string(),
      api_base: OURA_API_BASE.to_string(),
    }
  }

  pub fn from_env() -> Result<Self, OuraError> {
    let token = env::var("OURA_ACCESS_TOKEN")
      .map_err(|_| OuraError::MissingConfig("OURA_ACCESS_TOKEN".into()))?;
    Ok(Self::new(&token))
  }

  pub fn with_api_base(mut self, api_base: &str) -> Self {
    self.api_base = api_base.trim_end_matches('/').to_string();
    self
  }

  /// Fetch one day of a usercollection endpoint
  async fn fetch_day<T: DeserializeOwned>(&self, endpoint: &str, date: NaiveDate) -> Result<Vec<T>, OuraError> {
    let url = format!("{}/{}", self.api_base, endpoint);
    let end_date = date + Duration::days(1);

    let response = self
      .client
      .get(&url)
      .bearer_auth(&self.access_token)
      .query(&[
        ("start_date", date.to_string()),
        ("end_date", end_date.to_string()),
      ])
      .send()
      .await?;

    if !response.status().is_success() {
      let status = response.status();
      let error_text = response.text().await.unwrap_or_default();
      return Err(OuraError::Api(format!(
        "{} API error {}: {}",
        endpoint, status, error_text
      )));
    }

    let collection: Collection<T> = response.json().await?;
    Ok(collection.data)
  }

  pub async fn readiness_score(&self, date: NaiveDate) -> Result<Option<f64>, OuraError> {
    let days: Vec<DailyReadiness> = self.fetch_day("daily_readiness", date).await?;
    Ok(days.into_iter().find(|d| d.day == date).and_then(|d| d.score))
  }

  /// Main sleep period for the night ending on `date`
  pub async fn sleep(&self, date: NaiveDate) -> Result<Option<SleepSummary>, OuraError> {
    let periods: Vec<SleepPeriod> = self.fetch_day("sleep", date).await?;

    let main = periods
      .into_iter()
      .filter(|p| p.day == date && p.total_sleep_duration.is_some())
      .max_by_key(|p| {
        let is_long = p.period_type.as_deref() == Some("long_sleep");
        (is_long, p.total_sleep_duration.unwrap_or(0))
      });

    Ok(main.map(|p| SleepSummary {
      duration_hours: p.total_sleep_duration.unwrap_or(0) as f64 / 3600.0,
      quality_score: p.efficiency,
    }))
  }

  pub async fn stress(&self, date: NaiveDate) -> Result<Option<StressSummary>, OuraError> {
    let days: Vec<DailyStress> = self.fetch_day("daily_stress", date).await?;
    Ok(
      days
        .into_iter()
        .find(|d| d.day == date)
        .and_then(|d| d.level())
        .map(|avg_level| StressSummary { avg_level }),
    )
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
