use agendum_core::domain::session::ChatMessage;
use agendum_core::domain::slots::Slots;
use agendum_core::errors::{CollaboratorFailure, PolicySchemaError};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;

/// A prompt split into standing instructions and the per-turn context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionPrompt {
    pub system: String,
    pub user: String,
}

/// The external model. Its output is untrusted text and is validated by the caller.
#[async_trait]
pub trait DecisionFunction: Send + Sync {
    async fn decide(&self, prompt: &DecisionPrompt) -> Result<String, CollaboratorFailure>;
}

pub const DECISION_SCHEMA: &str = r#"{"action": "<ask|set|confirm|check_availability|create_event|send_email|finish>", "args": {}}"#;

const SYSTEM_INSTRUCTIONS: &str = "\
You are a calendar-scheduling assistant. Choose exactly ONE action per turn.
Reply with a single JSON object and nothing else, shaped like:
{schema}

Arguments per action:
- ask: {\"question\": string}
- set: any of {\"title\", \"start\", \"end\", \"timezone\", \"attendees\", \"remove_attendees\", \"meeting_link\"}; start/end are RFC 3339 with an explicit offset, timezone is an IANA id, attendees are email addresses
- confirm: {\"proposal\": \"create_event\"} or {\"proposal\": \"send_email\", \"to\": [..], \"subject\": string, \"body\": string}
- check_availability: optional {\"start\", \"end\"}; defaults to the current slots
- create_event: {}
- send_email: {\"to\": [..], \"subject\": string, \"body\": string}
- finish: optional {\"message\": string}

Rules:
- Never create an event or send email without the user's confirmation; propose it with confirm.
- Only check availability when the user asks about it.
- Keep times in the user's timezone ({zone}) unless they name another one.
- Infer a short neutral title when possible (e.g. \"Meeting with Ada\").";

#[derive(Clone, Debug)]
pub struct PromptBuilder {
    history_window: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self { history_window: 8 }
    }
}

impl PromptBuilder {
    pub fn new(history_window: usize) -> Self {
        Self { history_window: history_window.max(1) }
    }

    pub fn full(
        &self,
        slots: &Slots,
        history: &[ChatMessage],
        message: &str,
        today: NaiveDate,
    ) -> DecisionPrompt {
        let zone = slots.timezone.map(|zone| zone.name()).unwrap_or("unknown");
        let start = history.len().saturating_sub(self.history_window);
        let transcript = history[start..]
            .iter()
            .map(|entry| format!("{}: {}", entry.role.as_str().to_uppercase(), entry.content))
            .collect::<Vec<_>>()
            .join("\n");

        DecisionPrompt {
            system: SYSTEM_INSTRUCTIONS.replace("{schema}", DECISION_SCHEMA).replace("{zone}", zone),
            user: format!(
                "TODAY: {}\n\nCurrent slots (null means unknown):\n{}\n\nRecent conversation:\n{}\n\nLatest user message:\n{}",
                today.format("%Y-%m-%d (%A)"),
                slots_json(slots),
                if transcript.is_empty() { "(none)".to_string() } else { transcript },
                message
            ),
        }
    }

    /// Shorter second attempt after an invalid reply: schema, slots and message only.
    pub fn clarification(
        &self,
        slots: &Slots,
        message: &str,
        error: &PolicySchemaError,
    ) -> DecisionPrompt {
        DecisionPrompt {
            system: format!(
                "Your previous reply was rejected ({error}). Reply with ONE JSON object only, \
                 no prose, shaped like {DECISION_SCHEMA}. If unsure, use {{\"action\": \"ask\", \
                 \"args\": {{\"question\": \"...\"}}}}."
            ),
            user: format!("Current slots:\n{}\n\nUser message:\n{}", slots_json(slots), message),
        }
    }
}

fn slots_json(slots: &Slots) -> String {
    json!({
        "title": slots.title,
        "start": slots.start.map(|at| at.to_rfc3339()),
        "end": slots.end.map(|at| at.to_rfc3339()),
        "timezone": slots.timezone.map(|zone| zone.name().to_string()),
        "attendees": slots.attendees,
        "meeting_link": slots.meeting_link,
    })
    .to_string()
}
