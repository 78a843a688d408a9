use std::collections::BTreeSet;
use std::sync::Arc;

use agendum_core::domain::action::{Action, ActionKind, EmailRequest, Proposal, TimeWindow};
use agendum_core::domain::session::ChatMessage;
use agendum_core::domain::slots::{SlotDelta, Slots};
use agendum_core::errors::{CollaboratorFailure, PolicySchemaError};
use chrono::{DateTime, FixedOffset, NaiveDate};
use chrono_tz::Tz;
use serde_json::{Map, Value};

use crate::conversation::{is_email_address, is_meeting_link};
use crate::llm::{DecisionFunction, DecisionPrompt, PromptBuilder};

pub const GENERIC_CLARIFICATION: &str =
    "Sorry, I didn't quite get that. Could you tell me the title, time, and who should attend?";

/// Everything the adapter may look at for one decision.
#[derive(Clone, Copy, Debug)]
pub struct DecisionContext<'a> {
    pub slots: &'a Slots,
    pub history: &'a [ChatMessage],
    pub message: &'a str,
    pub today: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyDecision {
    pub action: Action,
    /// Calls made to the decision function: 1, or 2 after a schema retry.
    pub attempts: u8,
    /// True when both attempts were invalid and `action` is the generic ask.
    pub fell_back: bool,
}

/// Wraps the decision function and turns its untrusted output into one [`Action`].
#[derive(Clone)]
pub struct DecisionPolicyAdapter {
    decision: Arc<dyn DecisionFunction>,
    prompts: PromptBuilder,
}

impl DecisionPolicyAdapter {
    pub fn new(decision: Arc<dyn DecisionFunction>, prompts: PromptBuilder) -> Self {
        Self { decision, prompts }
    }

    /// Transport failures are returned as-is and never retried; only a schema
    /// violation earns the single clarification retry.
    pub async fn decide(
        &self,
        context: DecisionContext<'_>,
    ) -> Result<PolicyDecision, CollaboratorFailure> {
        let prompt =
            self.prompts.full(context.slots, context.history, context.message, context.today);
        let first_error = match self.attempt(&prompt, context.slots).await? {
            Ok(action) => return Ok(PolicyDecision { action, attempts: 1, fell_back: false }),
            Err(error) => error,
        };

        tracing::warn!(
            event_name = "agent.decision.schema_invalid",
            attempt = 1,
            error = %first_error,
            "decision payload rejected; retrying with clarification prompt"
        );

        let retry = self.prompts.clarification(context.slots, context.message, &first_error);
        match self.attempt(&retry, context.slots).await? {
            Ok(action) => Ok(PolicyDecision { action, attempts: 2, fell_back: false }),
            Err(second_error) => {
                tracing::warn!(
                    event_name = "agent.decision.fallback",
                    attempt = 2,
                    error = %second_error,
                    "decision payload rejected twice; asking for clarification"
                );
                Ok(PolicyDecision {
                    action: Action::Ask { prompt: GENERIC_CLARIFICATION.to_string() },
                    attempts: 2,
                    fell_back: true,
                })
            }
        }
    }

    async fn attempt(
        &self,
        prompt: &DecisionPrompt,
        slots: &Slots,
    ) -> Result<Result<Action, PolicySchemaError>, CollaboratorFailure> {
        let raw = self.decision.decide(prompt).await?;
        Ok(parse_decision(&raw, slots))
    }
}

/// Validates a raw payload against the action schema.
///
/// `confirm` and `create_event` resolve the event from `slots`; when required
/// fields are missing the result is an `ask` naming them, not a schema error.
pub fn parse_decision(raw: &str, slots: &Slots) -> Result<Action, PolicySchemaError> {
    let object = extract_object(raw)?;
    let Some(tag) = object.get("action").and_then(Value::as_str) else {
        return Err(PolicySchemaError::MissingField { action: "decision", field: "action" });
    };
    let kind = ActionKind::parse(tag).ok_or_else(|| PolicySchemaError::UnknownAction(tag.to_string()))?;
    let empty = Map::new();
    let args = match object.get("args") {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(args)) => args,
        Some(other) => {
            return Err(PolicySchemaError::InvalidField {
                action: kind.as_str(),
                field: "args",
                detail: format!("expected an object, got {other}"),
            })
        }
    };

    match kind {
        ActionKind::Ask => {
            let question = required_text(kind, args, "question")?;
            Ok(Action::Ask { prompt: question })
        }
        ActionKind::Set => parse_set(args).map(|delta| Action::Set { delta }),
        ActionKind::Confirm => parse_confirm(args, slots),
        ActionKind::CheckAvailability => {
            let start = optional_timestamp(kind, args, "start")?.or(slots.start);
            let end = optional_timestamp(kind, args, "end")?.or(slots.end);
            match (start, end) {
                (Some(start), Some(end)) if end > start => {
                    Ok(Action::CheckAvailability { window: TimeWindow { start, end } })
                }
                (Some(_), Some(_)) => Err(PolicySchemaError::InvalidField {
                    action: kind.as_str(),
                    field: "end",
                    detail: "must be after start".to_string(),
                }),
                (None, _) => Err(PolicySchemaError::MissingField { action: kind.as_str(), field: "start" }),
                (_, None) => Err(PolicySchemaError::MissingField { action: kind.as_str(), field: "end" }),
            }
        }
        ActionKind::CreateEvent => Ok(match slots.resolve_event() {
            Ok(event) => Action::CreateEvent(event),
            Err(missing) => ask_for_missing(&missing),
        }),
        ActionKind::SendEmail => parse_email(kind, args).map(Action::SendEmail),
        ActionKind::Finish => {
            let message = optional_text(kind, args, "message")?;
            Ok(Action::Finish { message })
        }
    }
}

pub fn missing_fields_prompt(missing: &[&str]) -> String {
    format!("Still missing: {}.", missing.join(", "))
}

fn ask_for_missing(missing: &[&str]) -> Action {
    Action::Ask { prompt: missing_fields_prompt(missing) }
}

fn extract_object(raw: &str) -> Result<Map<String, Value>, PolicySchemaError> {
    let (Some(open), Some(close)) = (raw.find('{'), raw.rfind('}')) else {
        return Err(PolicySchemaError::NoJsonObject);
    };
    if close < open {
        return Err(PolicySchemaError::NoJsonObject);
    }

    match serde_json::from_str::<Value>(&raw[open..=close]) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(PolicySchemaError::NoJsonObject),
        Err(error) => Err(PolicySchemaError::InvalidJson(error.to_string())),
    }
}

const SET_FIELDS: [&str; 7] =
    ["title", "start", "end", "timezone", "attendees", "remove_attendees", "meeting_link"];

fn parse_set(args: &Map<String, Value>) -> Result<SlotDelta, PolicySchemaError> {
    let kind = ActionKind::Set;
    if let Some(unknown) = args.keys().find(|key| !SET_FIELDS.contains(&key.as_str())) {
        return Err(PolicySchemaError::InvalidField {
            action: kind.as_str(),
            field: "args",
            detail: format!("unknown slot `{unknown}`"),
        });
    }

    let delta = SlotDelta {
        title: optional_text(kind, args, "title")?,
        start: optional_timestamp(kind, args, "start")?,
        end: optional_timestamp(kind, args, "end")?,
        timezone: optional_zone(kind, args, "timezone")?,
        attendees: address_list(kind, args, "attendees")?.into_iter().collect(),
        removed_attendees: address_list(kind, args, "remove_attendees")?.into_iter().collect(),
        meeting_link: optional_link(kind, args, "meeting_link")?,
        ..SlotDelta::default()
    };

    if delta.is_empty() {
        return Err(PolicySchemaError::MissingField { action: kind.as_str(), field: "args" });
    }
    Ok(delta)
}

fn parse_confirm(args: &Map<String, Value>, slots: &Slots) -> Result<Action, PolicySchemaError> {
    let kind = ActionKind::Confirm;
    let proposal = required_text(kind, args, "proposal")?;
    match ActionKind::parse(&proposal) {
        Some(ActionKind::CreateEvent) => Ok(match slots.resolve_event() {
            Ok(event) => {
                let proposal = Proposal::CreateEvent(event);
                let summary = proposal.render_summary();
                Action::Confirm { proposal, summary }
            }
            Err(missing) => ask_for_missing(&missing),
        }),
        Some(ActionKind::SendEmail) => {
            let proposal = Proposal::SendEmail(parse_email(kind, args)?);
            let summary = proposal.render_summary();
            Ok(Action::Confirm { proposal, summary })
        }
        _ => Err(PolicySchemaError::InvalidField {
            action: kind.as_str(),
            field: "proposal",
            detail: format!("`{proposal}` is not a mutating action"),
        }),
    }
}

fn parse_email(kind: ActionKind, args: &Map<String, Value>) -> Result<EmailRequest, PolicySchemaError> {
    let to = address_list(kind, args, "to")?;
    if to.is_empty() {
        return Err(PolicySchemaError::MissingField { action: kind.as_str(), field: "to" });
    }
    Ok(EmailRequest {
        to,
        subject: required_text(kind, args, "subject")?,
        body: required_text(kind, args, "body")?,
    })
}

fn optional_text(
    kind: ActionKind,
    args: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, PolicySchemaError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.trim().to_string())),
        Some(other) => Err(PolicySchemaError::InvalidField {
            action: kind.as_str(),
            field,
            detail: format!("expected a string, got {other}"),
        }),
    }
}

fn required_text(
    kind: ActionKind,
    args: &Map<String, Value>,
    field: &'static str,
) -> Result<String, PolicySchemaError> {
    optional_text(kind, args, field)?
        .ok_or(PolicySchemaError::MissingField { action: kind.as_str(), field })
}

fn optional_timestamp(
    kind: ActionKind,
    args: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<DateTime<FixedOffset>>, PolicySchemaError> {
    optional_text(kind, args, field)?
        .map(|text| {
            DateTime::parse_from_rfc3339(&text).map_err(|error| PolicySchemaError::InvalidField {
                action: kind.as_str(),
                field,
                detail: format!("`{text}` is not RFC 3339 with an offset: {error}"),
            })
        })
        .transpose()
}

fn optional_zone(
    kind: ActionKind,
    args: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<Tz>, PolicySchemaError> {
    optional_text(kind, args, field)?
        .map(|text| {
            text.parse::<Tz>().map_err(|_| PolicySchemaError::InvalidField {
                action: kind.as_str(),
                field,
                detail: format!("`{text}` is not an IANA zone id"),
            })
        })
        .transpose()
}

fn optional_link(
    kind: ActionKind,
    args: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, PolicySchemaError> {
    match optional_text(kind, args, field)? {
        Some(link) if is_meeting_link(&link) => Ok(Some(link)),
        Some(link) => Err(PolicySchemaError::InvalidField {
            action: kind.as_str(),
            field,
            detail: format!("`{link}` is not an http(s) link"),
        }),
        None => Ok(None),
    }
}

/// Accepts a single address or an array of them; order is kept, duplicates dropped.
fn address_list(
    kind: ActionKind,
    args: &Map<String, Value>,
    field: &'static str,
) -> Result<Vec<String>, PolicySchemaError> {
    let values = match args.get(field) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::String(single)) => vec![Value::String(single.clone())],
        Some(Value::Array(values)) => values.clone(),
        Some(other) => {
            return Err(PolicySchemaError::InvalidField {
                action: kind.as_str(),
                field,
                detail: format!("expected a list of email addresses, got {other}"),
            })
        }
    };

    let mut seen = BTreeSet::new();
    let mut addresses = Vec::new();
    for value in values {
        let address = value.as_str().map(|text| text.trim().to_ascii_lowercase()).unwrap_or_default();
        if !is_email_address(&address) {
            return Err(PolicySchemaError::InvalidField {
                action: kind.as_str(),
                field,
                detail: format!("`{value}` is not an email address"),
            });
        }
        if seen.insert(address.clone()) {
            addresses.push(address);
        }
    }
    Ok(addresses)
}
