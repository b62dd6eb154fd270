use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;

use crate::models::ActualActivity;

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

const STRAVA_API_BASE: &str = "https://www.strava.com/api/v3";
/// Strava caps page size at 200
const MAX_PER_PAGE: usize = 200;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StravaError {
  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  #[error("HTTP request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("Strava API error {status}: {message}")]
  Api { status: u16, message: String },

  #[error("Failed to parse activities: {0}")]
  Parse(String),

  #[error("Not authenticated with Strava")]
  NotAuthenticated,
}

/// ---------------------------------------------------------------------------
/// Strava API - Activity Fetching
/// ---------------------------------------------------------------------------

/// Activity summary from Strava API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StravaActivity {
  pub id: i64,
  pub name: String,
  /// Strava uses "type" for legacy and "sport_type" for newer activities
  #[serde(rename = "type", default)]
  pub activity_type: String,
  #[serde(default)]
  pub sport_type: Option<String>,
  pub start_date: DateTime<Utc>,
  /// Local wall clock, serialized with a misleading "Z" suffix
  #[serde(default)]
  pub start_date_local: Option<String>,
  #[serde(default)]
  pub elapsed_time: i64,
  #[serde(default)]
  pub moving_time: i64,
  #[serde(default)]
  pub calories: Option<f64>,
  #[serde(default)]
  pub kilojoules: Option<f64>,
}

impl StravaActivity {
  /// Label used for type normalization; sport_type is the more specific one
  pub fn label(&self) -> &str {
    match &self.sport_type {
      Some(sport) if !sport.is_empty() => sport,
      _ => &self.activity_type,
    }
  }

  /// Strava's own local start when present, else the UTC start shifted
  /// into the user's zone
  fn local_start(&self, timezone: Tz) -> NaiveDateTime {
    self
      .start_date_local
      .as_deref()
      .and_then(|raw| NaiveDateTime::parse_from_str(raw.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S").ok())
      .unwrap_or_else(|| self.start_date.with_timezone(&timezone).naive_local())
  }

  pub fn into_actual(self, timezone: Tz) -> ActualActivity {
    let start = self.local_start(timezone);
    let date = start.date();

    let seconds = if self.moving_time > 0 {
      self.moving_time
    } else {
      self.elapsed_time
    };

    // Rides report work in kJ rather than calories; the two are roughly equal
    let calories = self
      .calories
      .or(self.kilojoules)
      .map(|c| c.round() as i64);

    ActualActivity::new(self.label(), date, Some(start), (seconds as f64 / 60.0).round() as i64, calories)
  }
}

pub struct StravaClient {
  client: Client,
  access_token: String,
  api_base: String,
  timezone: Tz,
}

impl StravaClient {
  pub fn new(access_token: &str, timezone: Tz) -> Self {
    Self {
      client: Client::new(),
      access_token: access_token.to_string(),
      api_base: STRAVA_API_BASE.to_string(),
      timezone,
    }
  }

  pub fn from_env(timezone: Tz) -> Result<Self, StravaError> {
    let token = env::var("STRAVA_ACCESS_TOKEN")
      .map_err(|_| StravaError::MissingConfig("STRAVA_ACCESS_TOKEN".into()))?;
    Ok(Self::new(&token, timezone))
  }

  pub fn with_api_base(mut self, api_base: &str) -> Self {
    self.api_base = api_base.trim_end_matches('/').to_string();
    self
  }

  /// Fetch recent activities from Strava, newest first
  pub async fn fetch_activities(&self, per_page: usize) -> Result<Vec<StravaActivity>, StravaError> {
    let url = format!("{}/athlete/activities", self.api_base);

    let response = self
      .client
      .get(&url)
      .bearer_auth(&self.access_token)
      .query(&[("per_page", per_page.clamp(1, MAX_PER_PAGE).to_string())])
      .send()
      .await?;

    if response.status() == reqwest::StatusCode::UNAUTHORIZED {
      return Err(StravaError::NotAuthenticated);
    }

    if !response.status().is_success() {
      let status = response.status().as_u16();
      let message = response.text().await.unwrap_or_default();
      return Err(StravaError::Api { status, message });
    }

    let response_text = response.text().await?;

    let activities: Vec<StravaActivity> = serde_json::from_str(&response_text).map_err(|e| {
      tracing::debug!(
        body = %response_text.chars().take(1000).collect::<String>(),
        "Unparseable Strava response"
      );
      StravaError::Parse(e.to_string())
    })?;

    Ok(activities)
  }

  pub async fn recent_activities(&self, limit: usize) -> Result<Vec<ActualActivity>, StravaError> {
    let activities = self.fetch_activities(limit).await?;
    Ok(
      activities
        .into_iter()
        .take(limit)
        .map(|a| a.into_actual(self.timezone))
        .collect(),
    )
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
