//! Google Calendar API v3: event insert, free/busy query and calendar lookup.

use std::collections::HashMap;

use agendum_agent::tools::{BusyInterval, CalendarClient, CreatedEvent};
use agendum_core::config::GoogleConfig;
use agendum_core::domain::action::{EventRequest, TimeWindow};
use agendum_core::errors::CollaboratorFailure;
use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{check_status, endpoint, GoogleApiError};

// ============================================================================
// API request/response types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventInsertBody<'a> {
    summary: &'a str,
    start: EventDateTime,
    end: EventDateTime,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attendees: Vec<AttendeeRef<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    date_time: String,
    time_zone: String,
}

#[derive(Debug, Serialize)]
struct AttendeeRef<'a> {
    email: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertedEvent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    html_link: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FreeBusyRequest<'a> {
    time_min: String,
    time_max: String,
    time_zone: &'a str,
    items: Vec<CalendarRef<'a>>,
}

#[derive(Debug, Serialize)]
struct CalendarRef<'a> {
    id: &'a str,
}

#[derive(Debug, Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: HashMap<String, FreeBusyCalendar>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyCalendar {
    #[serde(default)]
    busy: Vec<BusyRaw>,
    #[serde(default)]
    errors: Vec<FreeBusyError>,
}

#[derive(Debug, Deserialize)]
struct BusyRaw {
    start: String,
    end: String,
}

#[derive(Debug, Deserialize)]
struct FreeBusyError {
    #[serde(default)]
    reason: String,
}

// ============================================================================
// Public types
// ============================================================================

/// Calendar summary returned by `check-calendar`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub time_zone: String,
}

pub struct GoogleCalendarClient {
    client: Client,
    base_url: String,
    calendar_id: String,
    access_token: SecretString,
}

impl GoogleCalendarClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        calendar_id: impl Into<String>,
        access_token: SecretString,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            calendar_id: calendar_id.into(),
            access_token,
        }
    }

    pub fn from_config(client: Client, config: &GoogleConfig) -> Self {
        Self::new(
            client,
            config.calendar_base_url.clone(),
            config.calendar_id.clone(),
            config.access_token.clone(),
        )
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    /// Inserts the event and asks Google to send its own invitations as well.
    pub async fn insert_event(&self, event: &EventRequest) -> Result<CreatedEvent, GoogleApiError> {
        let url = endpoint(&self.base_url, &["calendars", &self.calendar_id, "events"])?;
        let response = self
            .client
            .post(url)
            .bearer_auth(self.access_token.expose_secret())
            .query(&[("sendUpdates", "all")])
            .json(&insert_body(event))
            .send()
            .await?;
        let inserted: InsertedEvent = check_status(response).await?.json().await?;
        if inserted.id.is_empty() {
            return Err(GoogleApiError::UnexpectedResponse("inserted event has no id".to_string()));
        }

        Ok(CreatedEvent {
            event_id: inserted.id,
            html_link: inserted.html_link,
            start: event.start,
            end: event.end,
        })
    }

    pub async fn free_busy(
        &self,
        window: &TimeWindow,
        timezone: Tz,
    ) -> Result<Vec<BusyInterval>, GoogleApiError> {
        let url = endpoint(&self.base_url, &["freeBusy"])?;
        let body = FreeBusyRequest {
            time_min: window.start.to_rfc3339(),
            time_max: window.end.to_rfc3339(),
            time_zone: timezone.name(),
            items: vec![CalendarRef { id: &self.calendar_id }],
        };
        let response = self
            .client
            .post(url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await?;
        let payload: FreeBusyResponse = check_status(response).await?.json().await?;

        parse_busy(payload, &self.calendar_id)
    }

    pub async fn calendar_info(&self) -> Result<CalendarInfo, GoogleApiError> {
        let url = endpoint(&self.base_url, &["users", "me", "calendarList", &self.calendar_id])?;
        let response =
            self.client.get(url).bearer_auth(self.access_token.expose_secret()).send().await?;
        Ok(check_status(response).await?.json().await?)
    }
}

#[async_trait]
impl CalendarClient for GoogleCalendarClient {
    async fn create_event(&self, event: &EventRequest) -> Result<CreatedEvent, CollaboratorFailure> {
        self.insert_event(event).await.map_err(|error| {
            tracing::warn!(
                event_name = "google.calendar.insert_failed",
                error = %error,
                "calendar event insert failed"
            );
            CollaboratorFailure::calendar(error.to_string())
        })
    }

    async fn get_busy(
        &self,
        window: &TimeWindow,
        timezone: Tz,
    ) -> Result<Vec<BusyInterval>, CollaboratorFailure> {
        self.free_busy(window, timezone).await.map_err(|error| {
            tracing::warn!(
                event_name = "google.calendar.freebusy_failed",
                error = %error,
                "free/busy query failed"
            );
            CollaboratorFailure::calendar(error.to_string())
        })
    }
}

fn insert_body(event: &EventRequest) -> EventInsertBody<'_> {
    let zone = event.timezone.name().to_string();
    EventInsertBody {
        summary: &event.title,
        start: EventDateTime { date_time: event.start.to_rfc3339(), time_zone: zone.clone() },
        end: EventDateTime { date_time: event.end.to_rfc3339(), time_zone: zone },
        attendees: event.attendees.iter().map(|email| AttendeeRef { email }).collect(),
        description: event.description.as_deref(),
    }
}

fn parse_busy(
    mut payload: FreeBusyResponse,
    calendar_id: &str,
) -> Result<Vec<BusyInterval>, GoogleApiError> {
    let calendar = payload.calendars.remove(calendar_id).ok_or_else(|| {
        GoogleApiError::UnexpectedResponse(format!("no free/busy entry for `{calendar_id}`"))
    })?;
    if let Some(error) = calendar.errors.first() {
        return Err(GoogleApiError::UnexpectedResponse(format!(
            "free/busy lookup failed: {}",
            error.reason
        )));
    }

    calendar
        .busy
        .into_iter()
        .map(|raw| {
            let start = DateTime::parse_from_rfc3339(&raw.start).map_err(|error| {
                GoogleApiError::UnexpectedResponse(format!("busy start `{}`: {error}", raw.start))
            })?;
            let end = DateTime::parse_from_rfc3339(&raw.end).map_err(|error| {
                GoogleApiError::UnexpectedResponse(format!("busy end `{}`: {error}", raw.end))
            })?;
            Ok(BusyInterval { start, end })
        })
        .collect()
}
