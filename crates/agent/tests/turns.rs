use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use agendum_agent::llm::{DecisionFunction, DecisionPrompt};
use agendum_agent::policy::GENERIC_CLARIFICATION;
use agendum_agent::runtime::{GATE_REJECTION, GREETING};
use agendum_agent::session::Clock;
use agendum_agent::tools::{BusyInterval, CalendarClient, CreatedEvent, MailClient, MailReceipt};
use agendum_agent::{OrchestratorSettings, TurnOrchestrator};
use agendum_core::audit::InMemoryAuditSink;
use agendum_core::domain::action::{EmailRequest, EventRequest, TimeWindow};
use agendum_core::domain::session::SessionId;
use agendum_core::errors::{CollaboratorFailure, TurnError};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

const SCENARIO_A: &str = "schedule coffee with ada tomorrow 10-10:30 PT, add bob@example.com";
const CONFIRM_CREATE: &str = r#"{"action": "confirm", "args": {"proposal": "create_event"}}"#;
const CONFIRM_AGENDA_EMAIL: &str = r#"{"action": "confirm", "args": {"proposal": "send_email",
    "to": ["ada@example.com"], "subject": "Agenda", "body": "Notes attached."}}"#;

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Default)]
struct ScriptedDecision {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<DecisionPrompt>>,
}

impl ScriptedDecision {
    fn push(&self, reply: &str) {
        self.replies.lock().expect("replies lock").push_back(reply.to_string());
    }

    fn calls(&self) -> usize {
        self.prompts.lock().expect("prompts lock").len()
    }
}

#[async_trait]
impl DecisionFunction for ScriptedDecision {
    async fn decide(&self, prompt: &DecisionPrompt) -> Result<String, CollaboratorFailure> {
        self.prompts.lock().expect("prompts lock").push(prompt.clone());
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .ok_or_else(|| CollaboratorFailure::decision("no scripted reply"))
    }
}

#[derive(Default)]
struct RecordingCalendar {
    created: Mutex<Vec<EventRequest>>,
    fail_with: Option<String>,
}

#[async_trait]
impl CalendarClient for RecordingCalendar {
    async fn create_event(&self, event: &EventRequest) -> Result<CreatedEvent, CollaboratorFailure> {
        if let Some(reason) = &self.fail_with {
            return Err(CollaboratorFailure::calendar(reason.clone()));
        }
        let mut created = self.created.lock().expect("calendar lock");
        created.push(event.clone());
        Ok(CreatedEvent {
            event_id: format!("evt-{}", created.len()),
            html_link: None,
            start: event.start,
            end: event.end,
        })
    }

    async fn get_busy(
        &self,
        _window: &TimeWindow,
        _timezone: Tz,
    ) -> Result<Vec<BusyInterval>, CollaboratorFailure> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct RecordingMail {
    sent: Mutex<Vec<EmailRequest>>,
}

#[async_trait]
impl MailClient for RecordingMail {
    async fn send(&self, email: &EmailRequest) -> Result<MailReceipt, CollaboratorFailure> {
        let mut sent = self.sent.lock().expect("mail lock");
        sent.push(email.clone());
        Ok(MailReceipt { message_id: format!("msg-{}", sent.len()) })
    }
}

struct Harness {
    orchestrator: TurnOrchestrator,
    decision: Arc<ScriptedDecision>,
    calendar: Arc<RecordingCalendar>,
    mail: Arc<RecordingMail>,
    audit: InMemoryAuditSink,
}

impl Harness {
    fn new() -> Self {
        Self::with_calendar(RecordingCalendar::default())
    }

    fn with_calendar(calendar: RecordingCalendar) -> Self {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 15, 0, 0).single().expect("valid time");
        Self::build(calendar, now)
    }

    fn at(now: DateTime<Utc>) -> Self {
        Self::build(RecordingCalendar::default(), now)
    }

    fn build(calendar: RecordingCalendar, now: DateTime<Utc>) -> Self {
        let decision = Arc::new(ScriptedDecision::default());
        let calendar = Arc::new(calendar);
        let mail = Arc::new(RecordingMail::default());
        let audit = InMemoryAuditSink::default();

        let orchestrator = TurnOrchestrator::new(
            decision.clone(),
            calendar.clone(),
            mail.clone(),
            OrchestratorSettings::default(),
        )
        .with_audit_sink(Arc::new(audit.clone()))
        .with_clock(Arc::new(FixedClock(now)));

        Self { orchestrator, decision, calendar, mail, audit }
    }

    fn created(&self) -> Vec<EventRequest> {
        self.calendar.created.lock().expect("calendar lock").clone()
    }

    fn sent(&self) -> Vec<EmailRequest> {
        self.mail.sent.lock().expect("mail lock").clone()
    }

    async fn start(&self) -> SessionId {
        self.orchestrator.start_session("corr-start").await.session_id
    }

    async fn say(&self, session_id: &SessionId, message: &str) -> agendum_agent::TurnReply {
        self.orchestrator.handle_turn(session_id, message, "corr-turn").await.expect("turn succeeds")
    }

    /// Runs scenario A and returns the session left awaiting confirmation.
    async fn proposed_coffee(&self) -> SessionId {
        let session_id = self.start().await;
        self.decision.push(CONFIRM_CREATE);
        let reply = self.say(&session_id, SCENARIO_A).await;
        assert!(reply.reply.ends_with("(yes/no)"), "unexpected reply: {}", reply.reply);
        session_id
    }
}

#[tokio::test]
async fn start_session_greets() {
    let harness = Harness::new();

    let started = harness.orchestrator.start_session("corr-1").await;

    assert_eq!(started.reply, GREETING);
    assert_eq!(harness.orchestrator.sessions().active_count().await, 1);
    assert_eq!(harness.audit.events_of_type("session.started").len(), 1);
}

#[tokio::test]
async fn scenario_a_extracts_slots_and_asks_for_confirmation() {
    let harness = Harness::new();
    let session_id = harness.start().await;
    harness.decision.push(CONFIRM_CREATE);

    let reply = harness.say(&session_id, SCENARIO_A).await;

    assert_eq!(reply.slots.title.as_deref(), Some("Coffee with Ada"));
    assert_eq!(reply.slots.timezone, Some(chrono_tz::America::Los_Angeles));
    assert_eq!(
        reply.slots.start.map(|start| start.to_rfc3339()),
        Some("2026-10-20T10:00:00-07:00".to_string())
    );
    assert_eq!(
        reply.slots.end.map(|end| end.to_rfc3339()),
        Some("2026-10-20T10:30:00-07:00".to_string())
    );
    assert!(reply.slots.attendees.contains("bob@example.com"));
    assert_eq!(
        reply.reply,
        "Create \"Coffee with Ada\" from Tue Oct 20, 2026 10:00 to 10:30 (America/Los_Angeles) \
         with attendees [bob@example.com]? (yes/no)"
    );
    assert!(!reply.done);
    assert_eq!(harness.decision.calls(), 1);
    assert!(harness.created().is_empty());
    assert_eq!(harness.audit.events_of_type("gate.armed").len(), 1);
}

#[tokio::test]
async fn scenario_b_yes_creates_event_and_notifies_without_model_call() {
    let harness = Harness::new();
    let session_id = harness.proposed_coffee().await;
    let calls_before = harness.decision.calls();

    let reply = harness.say(&session_id, "yes").await;

    assert_eq!(harness.decision.calls(), calls_before);
    assert!(reply.done);
    let created = harness.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].title, "Coffee with Ada");
    let sent = harness.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["bob@example.com".to_string()]);
    assert_eq!(sent[0].subject, "Invite: Coffee with Ada");
    assert_eq!(
        reply.reply,
        "Created \"Coffee with Ada\" on Tue Oct 20, 2026 10:00 (America/Los_Angeles) \
         and emailed bob@example.com."
    );
}

#[tokio::test]
async fn scenario_c_no_email_preference_suppresses_notification() {
    let harness = Harness::new();
    let session_id = harness.proposed_coffee().await;

    harness.decision.push(CONFIRM_CREATE);
    let rearmed = harness.say(&session_id, "no email").await;
    assert!(rearmed.reply.ends_with("(yes/no)"));
    assert_eq!(harness.audit.events_of_type("gate.abandoned").len(), 1);

    let reply = harness.say(&session_id, "yes").await;

    assert!(reply.done);
    assert_eq!(harness.created().len(), 1);
    assert!(harness.sent().is_empty());
    assert!(reply.reply.ends_with("Skipped the notification email."));
}

#[tokio::test]
async fn zone_change_keeps_the_proposed_wall_clock_time() {
    let harness = Harness::new();
    let session_id = harness.proposed_coffee().await;
    harness.decision.push(CONFIRM_CREATE);

    let reply = harness.say(&session_id, "actually make it ET").await;

    assert_eq!(reply.slots.timezone, Some(chrono_tz::America::New_York));
    assert_eq!(
        reply.slots.start.map(|start| start.to_rfc3339()),
        Some("2026-10-20T10:00:00-04:00".to_string())
    );
    assert_eq!(
        reply.reply,
        "Create \"Coffee with Ada\" from Tue Oct 20, 2026 10:00 to 10:30 (America/New_York) \
         with attendees [bob@example.com]? (yes/no)"
    );
    assert_eq!(harness.audit.events_of_type("gate.abandoned").len(), 1);
}

#[tokio::test]
async fn relative_dates_use_the_named_zone_near_midnight() {
    // 01:30 in Chicago, still 23:30 the previous evening in Los Angeles.
    let now = Utc.with_ymd_and_hms(2026, 10, 20, 6, 30, 0).single().expect("valid time");
    let harness = Harness::at(now);
    let session_id = harness.start().await;
    harness.decision.push(CONFIRM_CREATE);

    let reply = harness.say(&session_id, SCENARIO_A).await;

    assert_eq!(
        reply.slots.start.map(|start| start.to_rfc3339()),
        Some("2026-10-20T10:00:00-07:00".to_string())
    );
}

#[tokio::test]
async fn confirmed_email_proposal_sends_exactly_once() {
    let harness = Harness::new();
    let session_id = harness.start().await;
    harness.decision.push(CONFIRM_AGENDA_EMAIL);

    let proposed = harness.say(&session_id, "send ada@example.com the agenda").await;
    assert_eq!(proposed.reply, "Send \"Agenda\" to ada@example.com? (yes/no)");
    assert!(harness.sent().is_empty());

    let reply = harness.say(&session_id, "yes").await;

    assert_eq!(reply.reply, "Sent \"Agenda\" to ada@example.com.");
    assert!(!reply.done);
    assert_eq!(harness.decision.calls(), 1);
    assert!(harness.created().is_empty());
    let sent = harness.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Agenda");
    assert_eq!(sent[0].body, "Notes attached.");
    assert_eq!(harness.audit.events_of_type("gate.armed").len(), 1);
    assert_eq!(harness.audit.events_of_type("gate.affirmed").len(), 1);
    assert_eq!(harness.audit.events_of_type("tool.send_email").len(), 1);
}

#[tokio::test]
async fn skip_email_preference_drops_later_email_proposals() {
    let harness = Harness::new();
    let session_id = harness.start().await;
    harness.decision.push(CONFIRM_AGENDA_EMAIL);
    harness.say(&session_id, "send ada@example.com the agenda").await;
    harness.say(&session_id, "yes").await;
    assert_eq!(harness.sent().len(), 1);

    harness.decision.push(CONFIRM_AGENDA_EMAIL);
    let reply = harness.say(&session_id, "no email").await;

    assert_eq!(reply.reply, "Okay, no email will be sent.");
    assert_eq!(harness.audit.events_of_type("gate.suppressed").len(), 1);
    assert_eq!(harness.audit.events_of_type("gate.armed").len(), 1);

    harness.decision.push(r#"{"action": "ask", "args": {"question": "Anything else?"}}"#);
    let follow_up = harness.say(&session_id, "yes").await;

    assert_eq!(follow_up.reply, "Anything else?");
    assert_eq!(harness.sent().len(), 1);
    assert_eq!(harness.decision.calls(), 3);
}

#[tokio::test]
async fn negative_reply_declines_without_model_call() {
    let harness = Harness::new();
    let session_id = harness.proposed_coffee().await;
    let calls_before = harness.decision.calls();

    let reply = harness.say(&session_id, "No.").await;

    assert_eq!(reply.reply, "Okay, I won't do that. What would you like to change?");
    assert_eq!(harness.decision.calls(), calls_before);
    assert!(harness.created().is_empty());
    assert_eq!(harness.audit.events_of_type("gate.declined").len(), 1);
}

#[tokio::test]
async fn affirmative_without_pending_proposal_goes_to_policy() {
    let harness = Harness::new();
    let session_id = harness.start().await;
    harness.decision.push(r#"{"action": "ask", "args": {"question": "What should I schedule?"}}"#);

    let reply = harness.say(&session_id, "yes").await;

    assert_eq!(reply.reply, "What should I schedule?");
    assert_eq!(harness.decision.calls(), 1);
    assert!(harness.created().is_empty());
}

#[tokio::test]
async fn unconfirmed_create_from_policy_is_rejected() {
    let harness = Harness::new();
    let session_id = harness.start().await;
    harness.decision.push(r#"{"action": "create_event", "args": {}}"#);

    let reply = harness.say(&session_id, SCENARIO_A).await;

    assert_eq!(reply.reply, GATE_REJECTION);
    assert!(harness.created().is_empty());
    assert!(harness.sent().is_empty());
    assert_eq!(harness.audit.events_of_type("gate.violation").len(), 1);
}

#[tokio::test]
async fn malformed_output_twice_falls_back_to_generic_question() {
    let harness = Harness::new();
    let session_id = harness.start().await;
    harness.decision.push("Sure! I'll get right on that.");
    harness.decision.push("{\"action\": \"teleport\"}");

    let reply = harness.say(&session_id, "hello there").await;

    assert_eq!(reply.reply, GENERIC_CLARIFICATION);
    assert_eq!(harness.decision.calls(), 2);
}

#[tokio::test]
async fn calendar_failure_is_reported_and_nothing_is_emailed() {
    let harness = Harness::with_calendar(RecordingCalendar {
        created: Mutex::new(Vec::new()),
        fail_with: Some("quota exceeded".to_string()),
    });
    let session_id = harness.proposed_coffee().await;

    let reply = harness.say(&session_id, "yes").await;

    assert!(!reply.done);
    assert_eq!(reply.reply, "I couldn't create the event: quota exceeded.");
    assert!(harness.sent().is_empty());
}

#[tokio::test]
async fn finish_ends_the_session() {
    let harness = Harness::new();
    let session_id = harness.start().await;
    harness.decision.push(r#"{"action": "finish", "args": {"message": "Bye!"}}"#);

    let reply = harness.say(&session_id, "that's all").await;
    assert_eq!(reply.reply, "Bye!");

    let error = harness
        .orchestrator
        .handle_turn(&session_id, "one more thing", "corr-late")
        .await
        .expect_err("session has ended");
    assert!(matches!(error, TurnError::SessionEnded { .. }));
    assert_eq!(harness.decision.calls(), 1);
}

#[tokio::test]
async fn explicit_end_is_idempotent_and_unknown_sessions_are_rejected() {
    let harness = Harness::new();
    let session_id = harness.start().await;

    harness.orchestrator.end_session(&session_id, "corr-end").await.expect("first end");
    harness.orchestrator.end_session(&session_id, "corr-end").await.expect("second end");

    let error = harness
        .orchestrator
        .handle_turn(&session_id, "hello", "corr-late")
        .await
        .expect_err("session has ended");
    assert!(matches!(error, TurnError::SessionEnded { .. }));

    let missing = SessionId("does-not-exist".to_string());
    let error = harness.orchestrator.end_session(&missing, "corr-end").await.expect_err("unknown");
    assert_eq!(error, TurnError::UnknownSession { session_id: missing });
}

#[tokio::test]
async fn availability_check_is_read_only() {
    let harness = Harness::new();
    let session_id = harness.start().await;
    harness.decision.push(r#"{"action": "check_availability", "args": {}}"#);

    let reply = harness.say(&session_id, "am I free tomorrow 10-10:30 PT?").await;

    assert_eq!(
        reply.reply,
        "You're free from Tue Oct 20, 2026 10:00 to Tue Oct 20, 2026 10:30."
    );
    assert!(harness.created().is_empty());
    assert!(!reply.done);
}
