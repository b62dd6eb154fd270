//! Google Calendar adapter
//!
//! Translates between the Calendar v3 REST shapes and local wall-clock
//! `CalendarEvent`s in the user's timezone. Token acquisition happens
//! elsewhere; this client is handed a bearer token.

use async_trait::async_trait;
use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

use super::{Calendar, CalendarError};
use crate::models::{CalendarEvent, EventPatch, NewEvent};

/// ---------------------------------------------------------------------------
/// Configuration Constants
/// ---------------------------------------------------------------------------

const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const DEFAULT_CALENDAR_ID: &str = "primary";
const MAX_RESULTS: &str = "250";

/// ---------------------------------------------------------------------------
/// Google Calendar API Types
/// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventList {
  #[serde(default)]
  items: Vec<GoogleEvent>,
  #[serde(default)]
  next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleEvent {
  id: String,
  #[serde(default)]
  summary: Option<String>,
  #[serde(default)]
  description: Option<String>,
  #[serde(default)]
  status: Option<String>,
  start: EventTime,
  end: EventTime,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  date_time: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  date: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  time_zone: Option<String>,
}

#[derive(Debug, Default, Serialize)]
struct EventBody {
  #[serde(skip_serializing_if = "Option::is_none")]
  summary: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  start: Option<EventTime>,
  #[serde(skip_serializing_if = "Option::is_none")]
  end: Option<EventTime>,
}

/// ---------------------------------------------------------------------------
/// Client
/// ---------------------------------------------------------------------------

pub struct GoogleCalendar {
  client: Client,
  access_token: String,
  calendar_id: String,
  api_base: String,
  timezone: Tz,
}

impl GoogleCalendar {
  pub fn new(access_token: &str, calendar_id: &str, timezone: Tz) -> Self {
    Self {
      client: Client::new(),
      access_token: access_token.to_string(),
      calendar_id: calendar_id.to_string(),
      api_base: GOOGLE_CALENDAR_API_BASE.to_string(),
      timezone,
    }
  }

  pub fn from_env(timezone: Tz) -> Result<Self, CalendarError> {
    let token = env::var("GOOGLE_CALENDAR_TOKEN")
      .map_err(|_| CalendarError::MissingConfig("GOOGLE_CALENDAR_TOKEN".into()))?;
    let calendar_id =
      env::var("GOOGLE_CALENDAR_ID").unwrap_or_else(|_| DEFAULT_CALENDAR_ID.to_string());
    Ok(Self::new(&token, &calendar_id, timezone))
  }

  /// Point the client at a different API root (used by tests)
  pub fn with_api_base(mut self, api_base: &str) -> Self {
    self.api_base = api_base.trim_end_matches('/').to_string();
    self
  }

  fn events_url(&self, event_id: Option<&str>) -> Result<Url, CalendarError> {
    let mut url = Url::parse(&self.api_base).map_err(|e| CalendarError::Parse(e.to_string()))?;
    {
      let mut segments = url
        .path_segments_mut()
        .map_err(|_| CalendarError::Parse(format!("Invalid API base: {}", self.api_base)))?;
      segments
        .pop_if_empty()
        .extend(["calendars", self.calendar_id.as_str(), "events"]);
      if let Some(id) = event_id {
        segments.push(id);
      }
    }
    Ok(url)
  }

  fn localize(&self, naive: NaiveDateTime) -> DateTime<Tz> {
    match self.timezone.from_local_datetime(&naive) {
      LocalResult::Single(dt) => dt,
      LocalResult::Ambiguous(earliest, _) => earliest,
      // Inside a DST gap; read the wall clock as UTC rather than fail
      LocalResult::None => self.timezone.from_utc_datetime(&naive),
    }
  }

  fn event_time(&self, naive: NaiveDateTime) -> EventTime {
    EventTime {
      date_time: Some(naive.format("%Y-%m-%dT%H:%M:%S").to_string()),
      date: None,
      time_zone: Some(self.timezone.name().to_string()),
    }
  }

  /// Returns (local time, is_all_day)
  fn parse_time(&self, time: &EventTime) -> Result<(NaiveDateTime, bool), CalendarError> {
    if let Some(date_time) = &time.date_time {
      let parsed = DateTime::parse_from_rfc3339(date_time)
        .map_err(|e| CalendarError::Parse(format!("{}: {}", date_time, e)))?;
      return Ok((parsed.with_timezone(&self.timezone).naive_local(), false));
    }
    if let Some(date) = &time.date {
      let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| CalendarError::Parse(format!("{}: {}", date, e)))?;
      return Ok((day.and_time(chrono::NaiveTime::MIN), true));
    }
    Err(CalendarError::Parse("Event time has neither dateTime nor date".into()))
  }

  fn into_event(&self, raw: GoogleEvent) -> Result<CalendarEvent, CalendarError> {
    let (start, all_day) = self.parse_time(&raw.start)?;
    let (end, _) = self.parse_time(&raw.end)?;
    Ok(CalendarEvent {
      id: raw.id,
      title: raw.summary.unwrap_or_else(|| "Busy".to_string()),
      description: raw.description.unwrap_or_default(),
      start,
      end,
      all_day,
    })
  }

  async fn check(response: Response, event_id: Option<&str>) -> Result<Response, CalendarError> {
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }
    if matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE) {
      if let Some(id) = event_id {
        return Err(CalendarError::NotFound(id.to_string()));
      }
    }
    let message = response.text().await.unwrap_or_default();
    Err(CalendarError::Api {
      status: status.as_u16(),
      message,
    })
  }
}

#[async_trait]
impl Calendar for GoogleCalendar {
  async fn list_events(
    &self,
    from: NaiveDateTime,
    to: NaiveDateTime,
  ) -> Result<Vec<CalendarEvent>, CalendarError> {
    let mut events = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
      let mut url = self.events_url(None)?;
      {
        let mut query = url.query_pairs_mut();
        query
          .append_pair("timeMin", &self.localize(from).to_rfc3339())
          .append_pair("timeMax", &self.localize(to).to_rfc3339())
          .append_pair("singleEvents", "true")
          .append_pair("orderBy", "startTime")
          .append_pair("maxResults", MAX_RESULTS);
        if let Some(token) = &page_token {
          query.append_pair("pageToken", token);
        }
      }

      let response = self
        .client
        .get(url)
        .bearer_auth(&self.access_token)
        .send()
        .await?;
      let list: EventList = Self::check(response, None).await?.json().await?;

      for raw in list.items {
        if raw.status.as_deref() == Some("cancelled") {
          continue;
        }
        let id = raw.id.clone();
        match self.into_event(raw) {
          Ok(event) => events.push(event),
          Err(e) => tracing::warn!(event_id = %id, error = %e, "Skipping unreadable calendar event"),
        }
      }

      match list.next_page_token {
        Some(token) if !token.is_empty() => {
          tracing::debug!(events = events.len(), "Fetching next calendar page");
          page_token = Some(token);
        }
        _ => break,
      }
    }

    Ok(events)
  }

  async fn create_event(&self, event: &NewEvent) -> Result<CalendarEvent, CalendarError> {
    let body = EventBody {
      summary: Some(event.title.clone()),
      description: Some(event.description.clone()),
      start: Some(self.event_time(event.start)),
      end: Some(self.event_time(event.end)),
    };

    let response = self
      .client
      .post(self.events_url(None)?)
      .bearer_auth(&self.access_token)
      .json(&body)
      .send()
      .await?;
    let raw: GoogleEvent = Self::check(response, None).await?.json().await?;
    self.into_event(raw)
  }

  async fn update_event(&self, id: &str, patch: &EventPatch) -> Result<CalendarEvent, CalendarError> {
    let body = EventBody {
      summary: patch.title.clone(),
      description: patch.description.clone(),
      start: patch.start.map(|t| self.event_time(t)),
      end: patch.end.map(|t| self.event_time(t)),
    };

    let response = self
      .client
      .patch(self.events_url(Some(id))?)
      .bearer_auth(&self.access_token)
      .json(&body)
      .send()
      .await?;
    let raw: GoogleEvent = Self::check(response, Some(id)).await?.json().await?;
    self.into_event(raw)
  }

  async fn delete_event(&self, id: &str) -> Result<(), CalendarError> {
    let response = self
      .client
      .delete(self.events_url(Some(id))?)
      .bearer_auth(&self.access_token)
      .send()
      .await?;
    Self::check(response, Some(id)).await?;
    Ok(())
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
