use std::sync::Arc;

use agendum_core::domain::action::{render_local, EmailRequest, EventRequest, Proposal, TimeWindow};
use agendum_core::errors::CollaboratorFailure;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::guardrails::AuthorizedAction;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedEvent {
    pub event_id: String,
    pub html_link: Option<String>,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailReceipt {
    pub message_id: String,
}

#[async_trait]
pub trait CalendarClient: Send + Sync {
    async fn create_event(&self, event: &EventRequest) -> Result<CreatedEvent, CollaboratorFailure>;

    async fn get_busy(
        &self,
        window: &TimeWindow,
        timezone: Tz,
    ) -> Result<Vec<BusyInterval>, CollaboratorFailure>;
}

#[async_trait]
pub trait MailClient: Send + Sync {
    async fn send(&self, email: &EmailRequest) -> Result<MailReceipt, CollaboratorFailure>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolOutcome {
    EventCreated(CreatedEvent),
    EmailSent(MailReceipt),
}

/// Runs permitted actions against the collaborators: one call each, no retries.
#[derive(Clone)]
pub struct ToolExecutor {
    calendar: Arc<dyn CalendarClient>,
    mail: Arc<dyn MailClient>,
}

impl ToolExecutor {
    pub fn new(calendar: Arc<dyn CalendarClient>, mail: Arc<dyn MailClient>) -> Self {
        Self { calendar, mail }
    }

    pub async fn execute(&self, action: AuthorizedAction) -> Result<ToolOutcome, CollaboratorFailure> {
        let automatic = action.is_automatic();
        match action.into_proposal() {
            Proposal::CreateEvent(event) => {
                tracing::info!(
                    event_name = "agent.tool.create_event.issued",
                    attendee_count = event.attendees.len(),
                    "creating calendar event"
                );
                self.calendar.create_event(&event).await.map(ToolOutcome::EventCreated)
            }
            Proposal::SendEmail(email) => {
                if email.to.is_empty() {
                    return Err(CollaboratorFailure::mail("at least one recipient is required"));
                }
                tracing::info!(
                    event_name = "agent.tool.send_email.issued",
                    recipient_count = email.to.len(),
                    automatic,
                    "sending email"
                );
                self.mail.send(&email).await.map(ToolOutcome::EmailSent)
            }
        }
    }

    /// Read-only, so it needs no authorization.
    pub async fn check_availability(
        &self,
        window: &TimeWindow,
        timezone: Tz,
    ) -> Result<Vec<BusyInterval>, CollaboratorFailure> {
        tracing::info!(event_name = "agent.tool.get_busy.issued", "checking availability");
        self.calendar.get_busy(window, timezone).await
    }
}

/// The automatic notification sent to attendees after an event is created.
pub fn notification_email(
    event: &EventRequest,
    created: &CreatedEvent,
    meeting_link: Option<&str>,
) -> EmailRequest {
    let mut body = format!(
        "You're invited to '{}'.\nStart: {}\nEnd: {}\nTimezone: {}\n",
        event.title,
        created.start.with_timezone(&event.timezone).to_rfc3339(),
        created.end.with_timezone(&event.timezone).to_rfc3339(),
        event.timezone.name()
    );
    if let Some(link) = created.html_link.as_deref().or(meeting_link) {
        body.push_str(&format!("Link: {link}\n"));
    }

    EmailRequest {
        to: event.attendees.clone(),
        subject: format!("Invite: {}", event.title),
        body,
    }
}

pub fn availability_reply(window: &TimeWindow, timezone: Tz, busy: &[BusyInterval]) -> String {
    if busy.is_empty() {
        return format!(
            "You're free from {} to {}.",
            render_local(window.start, timezone),
            render_local(window.end, timezone)
        );
    }

    let intervals = busy
        .iter()
        .map(|interval| {
            format!(
                "{} to {}",
                render_local(interval.start, timezone),
                render_local(interval.end, timezone)
            )
        })
        .collect::<Vec<_>>()
        .join("; ");
    let noun = if busy.len() == 1 { "conflict" } else { "conflicts" };
    format!("That time has {} {noun}: {intervals}.", busy.len())
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use agendum_core::domain::action::{EventRequest, TimeWindow};

    use super::{availability_reply, notification_email, BusyInterval, CreatedEvent};

    fn event() -> EventRequest {
        EventRequest {
            title: "Coffee with Ada".to_string(),
            start: DateTime::parse_from_rfc3339("2026-10-20T10:00:00-07:00").expect("valid"),
            end: DateTime::parse_from_rfc3339("2026-10-20T10:30:00-07:00").expect("valid"),
            timezone: chrono_tz::America::Los_Angeles,
            attendees: vec!["bob@example.com".to_string()],
            description: Some("Link: https://meet.example.com/x".to_string()),
        }
    }

    #[test]
    fn notification_follows_invite_template() {
        let event = event();
        let created = CreatedEvent {
            event_id: "evt-1".to_string(),
            html_link: None,
            start: event.start,
            end: event.end,
        };

        let email = notification_email(&event, &created, Some("https://meet.example.com/x"));

        assert_eq!(email.to, vec!["bob@example.com".to_string()]);
        assert_eq!(email.subject, "Invite: Coffee with Ada");
        assert_eq!(
            email.body,
            "You're invited to 'Coffee with Ada'.\nStart: 2026-10-20T10:00:00-07:00\n\
             End: 2026-10-20T10:30:00-07:00\nTimezone: America/Los_Angeles\n\
             Link: https://meet.example.com/x\n"
        );
    }

    #[test]
    fn provider_link_takes_precedence_in_notification() {
        let event = event();
        let created = CreatedEvent {
            event_id: "evt-1".to_string(),
            html_link: Some("https://calendar.example.com/event?eid=1".to_string()),
            start: event.start,
            end: event.end,
        };

        let email = notification_email(&event, &created, Some("https://meet.example.com/x"));

        assert!(email.body.ends_with("Link: https://calendar.example.com/event?eid=1\n"));
    }

    #[test]
    fn availability_replies_cover_free_and_busy() {
        let window = TimeWindow {
            start: DateTime::parse_from_rfc3339("2026-10-20T10:00:00-05:00").expect("valid"),
            end: DateTime::parse_from_rfc3339("2026-10-20T11:00:00-05:00").expect("valid"),
        };
        let zone = chrono_tz::America::Chicago;

        assert_eq!(
            availability_reply(&window, zone, &[]),
            "You're free from Tue Oct 20, 2026 10:00 to Tue Oct 20, 2026 11:00."
        );

        let busy = [BusyInterval {
            start: DateTime::parse_from_rfc3339("2026-10-20T15:30:00Z").expect("valid"),
            end: DateTime::parse_from_rfc3339("2026-10-20T16:00:00Z").expect("valid"),
        }];
        assert_eq!(
            availability_reply(&window, zone, &busy),
            "That time has 1 conflict: Tue Oct 20, 2026 10:30 to Tue Oct 20, 2026 11:00."
        );
    }
}
