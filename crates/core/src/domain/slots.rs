use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::domain::action::EventRequest;

pub const REQUIRED_SLOTS: [&str; 4] = ["title", "start", "end", "timezone"];
pub const END_AFTER_START: &str = "end (must be after start)";

/// Accumulated scheduling fields for one session.
///
/// `end > start` whenever both are set. Merges never clear a field; a delta that
/// would break the ordering has its time part rejected and the previous values kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slots {
    pub title: Option<String>,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
    pub timezone: Option<Tz>,
    pub attendees: BTreeSet<String>,
    pub meeting_link: Option<String>,
}

/// Partial update produced by the extractor or by a policy `set` action.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SlotDelta {
    pub title: Option<String>,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
    pub timezone: Option<Tz>,
    pub attendees: BTreeSet<String>,
    pub removed_attendees: BTreeSet<String>,
    pub meeting_link: Option<String>,
    /// A calendar date mentioned without a time.
    pub day: Option<NaiveDate>,
    pub skip_email: bool,
}

impl SlotDelta {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.timezone.is_none()
            && self.attendees.is_empty()
            && self.removed_attendees.is_empty()
            && self.meeting_link.is_none()
            && self.day.is_none()
            && !self.skip_email
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.start.is_some() {
            fields.push("start");
        }
        if self.end.is_some() {
            fields.push("end");
        }
        if self.timezone.is_some() {
            fields.push("timezone");
        }
        if !self.attendees.is_empty() {
            fields.push("attendees");
        }
        if !self.removed_attendees.is_empty() {
            fields.push("removed_attendees");
        }
        if self.meeting_link.is_some() {
            fields.push("meeting_link");
        }
        if self.day.is_some() {
            fields.push("day");
        }
        if self.skip_email {
            fields.push("skip_email");
        }
        fields
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub updated: Vec<&'static str>,
    pub rejected: Vec<&'static str>,
}

impl Slots {
    pub fn with_timezone(timezone: Tz) -> Self {
        Self { timezone: Some(timezone), ..Self::default() }
    }

    pub fn merge(&mut self, delta: &SlotDelta) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        let previous_zone = self.timezone;

        if let Some(title) = delta.title.as_ref().filter(|title| !title.trim().is_empty()) {
            if self.title.as_deref() != Some(title.as_str()) {
                self.title = Some(title.clone());
                outcome.updated.push("title");
            }
        }

        if let Some(timezone) = delta.timezone {
            if self.timezone != Some(timezone) {
                self.timezone = Some(timezone);
                outcome.updated.push("timezone");
            }
        }

        let before = self.attendees.clone();
        for email in &delta.removed_attendees {
            self.attendees.remove(&email.to_ascii_lowercase());
        }
        for email in &delta.attendees {
            self.attendees.insert(email.to_ascii_lowercase());
        }
        if self.attendees != before {
            outcome.updated.push("attendees");
        }

        if let Some(link) = &delta.meeting_link {
            if self.meeting_link.as_deref() != Some(link.as_str()) {
                self.meeting_link = Some(link.clone());
                outcome.updated.push("meeting_link");
            }
        }

        let start = delta.start.or(self.start);
        let end = delta.end.or(self.end);
        if delta.start.is_some() || delta.end.is_some() {
            match (start, end) {
                (Some(start), Some(end)) if end <= start => {
                    outcome.rejected.push("start");
                    outcome.rejected.push("end");
                }
                _ => {
                    if delta.start.is_some() && delta.start != self.start {
                        outcome.updated.push("start");
                    }
                    if delta.end.is_some() && delta.end != self.end {
                        outcome.updated.push("end");
                    }
                    self.start = start;
                    self.end = end;
                }
            }
        } else {
            let relocalized = match (previous_zone, self.timezone) {
                (Some(from), Some(to)) if from != to => self.keep_wall_clock(from, to),
                _ => false,
            };
            let moved = delta.day.is_some_and(|day| self.move_to_day(day));
            if relocalized || moved {
                outcome.updated.push("start");
                outcome.updated.push("end");
            }
        }

        outcome
    }

    /// Re-reads the start/end wall-clock times of `from` in `to`, so that a zone
    /// change on its own keeps "10:00" rather than the instant.
    fn keep_wall_clock(&mut self, from: Tz, to: Tz) -> bool {
        let (Some(start), Some(end)) = (self.start, self.end) else {
            return false;
        };
        let local = start.with_timezone(&from).naive_local();
        let Some(moved) = to.from_local_datetime(&local).earliest() else {
            return false;
        };

        let duration = end - start;
        self.start = Some(moved.fixed_offset());
        self.end = Some((moved + duration).fixed_offset());
        true
    }

    /// Moves an already-set start/end to `day`, keeping wall-clock times in the
    /// session's zone. Returns false when there is nothing to move or the new local
    /// times do not exist on that date.
    pub fn move_to_day(&mut self, day: NaiveDate) -> bool {
        let (Some(start), Some(end)) = (self.start, self.end) else {
            return false;
        };
        let Some(zone) = self.timezone else {
            return false;
        };

        let local_start = start.with_timezone(&zone);
        if local_start.date_naive() == day {
            return false;
        }
        let duration = end - start;
        let Some(moved) = zone.from_local_datetime(&day.and_time(local_start.time())).earliest()
        else {
            return false;
        };

        let moved_start = moved.fixed_offset();
        self.start = Some(moved_start);
        self.end = Some((moved + duration).fixed_offset());
        true
    }

    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.title.as_deref().map(str::trim).unwrap_or_default().is_empty() {
            missing.push(REQUIRED_SLOTS[0]);
        }
        if self.start.is_none() {
            missing.push(REQUIRED_SLOTS[1]);
        }
        if self.end.is_none() {
            missing.push(REQUIRED_SLOTS[2]);
        }
        if self.timezone.is_none() {
            missing.push(REQUIRED_SLOTS[3]);
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end <= start {
                missing.push(END_AFTER_START);
            }
        }
        missing
    }

    /// Resolves the slots into a calendar event, or the list of missing fields.
    pub fn resolve_event(&self) -> Result<EventRequest, Vec<&'static str>> {
        let missing = self.missing_required();
        match (&self.title, self.start, self.end, self.timezone) {
            (Some(title), Some(start), Some(end), Some(timezone)) if missing.is_empty() => {
                Ok(EventRequest {
                    title: title.trim().to_string(),
                    start,
                    end,
                    timezone,
                    attendees: self.attendees.iter().cloned().collect(),
                    description: self.meeting_link.as_ref().map(|link| format!("Link: {link}")),
                })
            }
            _ => Err(missing),
        }
    }
}
