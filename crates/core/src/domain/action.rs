use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::domain::slots::SlotDelta;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRequest {
    pub title: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub timezone: Tz,
    pub attendees: Vec<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRequest {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// A mutating action awaiting explicit user approval.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Proposal {
    CreateEvent(EventRequest),
    SendEmail(EmailRequest),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Action {
    Ask { prompt: String },
    Set { delta: SlotDelta },
    Confirm { proposal: Proposal, summary: String },
    CheckAvailability { window: TimeWindow },
    CreateEvent(EventRequest),
    SendEmail(EmailRequest),
    Finish { message: Option<String> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Ask,
    Set,
    Confirm,
    CheckAvailability,
    CreateEvent,
    SendEmail,
    Finish,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ask => "ask",
            Self::Set => "set",
            Self::Confirm => "confirm",
            Self::CheckAvailability => "check_availability",
            Self::CreateEvent => "create_event",
            Self::SendEmail => "send_email",
            Self::Finish => "finish",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ask" => Some(Self::Ask),
            "set" => Some(Self::Set),
            "confirm" => Some(Self::Confirm),
            "check_availability" => Some(Self::CheckAvailability),
            "create_event" => Some(Self::CreateEvent),
            "send_email" => Some(Self::SendEmail),
            "finish" => Some(Self::Finish),
            _ => None,
        }
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Ask { .. } => ActionKind::Ask,
            Self::Set { .. } => ActionKind::Set,
            Self::Confirm { .. } => ActionKind::Confirm,
            Self::CheckAvailability { .. } => ActionKind::CheckAvailability,
            Self::CreateEvent(_) => ActionKind::CreateEvent,
            Self::SendEmail(_) => ActionKind::SendEmail,
            Self::Finish { .. } => ActionKind::Finish,
        }
    }
}

impl Proposal {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::CreateEvent(_) => ActionKind::CreateEvent,
            Self::SendEmail(_) => ActionKind::SendEmail,
        }
    }

    /// Renders the yes/no question shown to the user before execution.
    pub fn render_summary(&self) -> String {
        match self {
            Self::CreateEvent(event) => {
                let attendees = if event.attendees.is_empty() {
                    "none".to_string()
                } else {
                    event.attendees.join(", ")
                };
                let link = event
                    .description
                    .as_deref()
                    .and_then(|description| description.strip_prefix("Link: "))
                    .map(|link| format!(", link: {link}"))
                    .unwrap_or_default();
                format!(
                    "Create \"{}\" from {} to {} ({}) with attendees [{}]{}? (yes/no)",
                    event.title,
                    render_local(event.start, event.timezone),
                    render_end(event.start, event.end, event.timezone),
                    event.timezone.name(),
                    attendees,
                    link
                )
            }
            Self::SendEmail(email) => {
                format!("Send \"{}\" to {}? (yes/no)", email.subject, email.to.join(", "))
            }
        }
    }
}

pub fn render_local(at: DateTime<FixedOffset>, zone: Tz) -> String {
    at.with_timezone(&zone).format("%a %b %-d, %Y %H:%M").to_string()
}

fn render_end(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>, zone: Tz) -> String {
    let local_start = start.with_timezone(&zone);
    let local_end = end.with_timezone(&zone);
    if local_start.date_naive() == local_end.date_naive() {
        local_end.format("%H:%M").to_string()
    } else {
        render_local(end, zone)
    }
}
