use std::sync::Arc;

use agendum_core::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink, TracingAuditSink};
use agendum_core::config::AppConfig;
use agendum_core::domain::action::{render_local, Action, EventRequest, Proposal};
use agendum_core::domain::session::SessionId;
use agendum_core::domain::slots::{MergeOutcome, Slots};
use agendum_core::errors::TurnError;
use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;

use crate::conversation::{named_zone, ExtractionContext, SlotExtractor};
use crate::guardrails::{AuthorizedAction, ConfirmationGate, GateResolution};
use crate::llm::{DecisionFunction, PromptBuilder};
use crate::policy::{missing_fields_prompt, DecisionContext, DecisionPolicyAdapter};
use crate::session::{Clock, Session, SessionStore, SystemClock};
use crate::tools::{
    availability_reply, notification_email, CalendarClient, CreatedEvent, MailClient,
    ToolExecutor, ToolOutcome,
};

pub const GREETING: &str = "Hi! What should I schedule?";
pub const GATE_REJECTION: &str =
    "I can only create events or send email after you confirm a proposal. Shall I summarize it for you?";
const DECLINED_REPLY: &str = "Okay, I won't do that. What would you like to change?";
const SUPPRESSED_EMAIL_REPLY: &str = "Okay, no email will be sent.";
const FINISH_REPLY: &str = "All set. Talk soon!";
const MAX_IDLE_TTL_SECS: u64 = 60 * 60 * 24 * 30;

#[derive(Clone, Debug)]
pub struct OrchestratorSettings {
    pub default_zone: Tz,
    pub default_duration_minutes: u32,
    pub history_window: usize,
    pub idle_ttl: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            default_zone: chrono_tz::America::Chicago,
            default_duration_minutes: 30,
            history_window: 8,
            idle_ttl: Duration::minutes(15),
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_zone: config.scheduling.default_zone(),
            default_duration_minutes: config.scheduling.default_duration_minutes,
            history_window: config.scheduling.history_window,
            idle_ttl: Duration::seconds(config.session.idle_ttl_secs.min(MAX_IDLE_TTL_SECS) as i64),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionStart {
    pub session_id: SessionId,
    pub reply: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReply {
    pub session_id: SessionId,
    pub reply: String,
    pub slots: Slots,
    /// True when this turn created a calendar event.
    pub done: bool,
}

#[derive(Debug)]
struct TurnOutcome {
    reply: String,
    done: bool,
}

impl TurnOutcome {
    fn reply(reply: impl Into<String>) -> Self {
        Self { reply: reply.into(), done: false }
    }
}

/// Runs one turn at a time per session: extract, resolve the gate or decide,
/// execute what is permitted, reply.
pub struct TurnOrchestrator {
    sessions: Arc<SessionStore>,
    extractor: SlotExtractor,
    policy: DecisionPolicyAdapter,
    executor: ToolExecutor,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    default_zone: Tz,
}

impl TurnOrchestrator {
    pub fn new(
        decision: Arc<dyn DecisionFunction>,
        calendar: Arc<dyn CalendarClient>,
        mail: Arc<dyn MailClient>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionStore::new(settings.idle_ttl)),
            extractor: SlotExtractor::new(settings.default_duration_minutes),
            policy: DecisionPolicyAdapter::new(decision, PromptBuilder::new(settings.history_window)),
            executor: ToolExecutor::new(calendar, mail),
            audit: Arc::new(TracingAuditSink),
            clock: Arc::new(SystemClock),
            default_zone: settings.default_zone,
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub async fn start_session(&self, correlation_id: &str) -> SessionStart {
        let now = self.clock.now();
        let reaped = self.sessions.reap_idle(now).await;
        let session_id = self.sessions.create(self.default_zone, now).await;

        tracing::info!(
            event_name = "agent.session.started",
            correlation_id,
            session_id = %session_id,
            reaped,
            "session started"
        );
        self.audit.emit(
            AuditContext::new(Some(session_id.clone()), correlation_id, "orchestrator").event(
                "session.started",
                AuditCategory::Session,
                AuditOutcome::Success,
            ),
        );

        SessionStart { session_id, reply: GREETING.to_string() }
    }

    /// Ending is idempotent for known sessions.
    pub async fn end_session(
        &self,
        session_id: &SessionId,
        correlation_id: &str,
    ) -> Result<(), TurnError> {
        let handle = self.sessions.get(session_id).await?;
        handle.lock().await.end();

        tracing::info!(
            event_name = "agent.session.ended",
            correlation_id,
            session_id = %session_id,
            "session ended"
        );
        self.audit.emit(
            AuditContext::new(Some(session_id.clone()), correlation_id, "orchestrator").event(
                "session.ended",
                AuditCategory::Session,
                AuditOutcome::Success,
            ),
        );
        Ok(())
    }

    pub async fn handle_turn(
        &self,
        session_id: &SessionId,
        message: &str,
        correlation_id: &str,
    ) -> Result<TurnReply, TurnError> {
        let handle = self.sessions.get(session_id).await?;
        let mut session = handle.lock().await;
        if let Err(error) = session.ensure_active() {
            tracing::warn!(
                event_name = "agent.turn.rejected",
                correlation_id,
                session_id = %session_id,
                "turn on an ended session"
            );
            return Err(error);
        }

        let now = self.clock.now();
        let audit = AuditContext::new(Some(session_id.clone()), correlation_id, "orchestrator");
        session.begin_turn(message, now);
        tracing::info!(
            event_name = "agent.turn.received",
            correlation_id,
            session_id = %session_id,
            turn = session.turn_count,
            awaiting_confirmation = session.gate.is_awaiting(),
            "turn received"
        );

        let zone = named_zone(message).or(session.slots.timezone).unwrap_or(self.default_zone);
        let today = now.with_timezone(&zone).date_naive();
        self.extract_into(&mut session, message, today, zone, &audit);

        let resolution = session.gate.resolve(message);
        let outcome = match resolution {
            GateResolution::Execute(authorized) => {
                self.record_gate(&audit, "gate.affirmed", authorized.proposal(), AuditOutcome::Success);
                self.execute_authorized(&mut session, authorized, &audit).await
            }
            GateResolution::Declined { proposal } => {
                self.record_gate(&audit, "gate.declined", &proposal, AuditOutcome::Rejected);
                TurnOutcome::reply(DECLINED_REPLY)
            }
            GateResolution::Abandoned { proposal } => {
                self.record_gate(&audit, "gate.abandoned", &proposal, AuditOutcome::Rejected);
                self.decide_and_apply(&mut session, message, today, &audit).await
            }
            GateResolution::NotAwaiting => {
                self.decide_and_apply(&mut session, message, today, &audit).await
            }
        };

        session.record_reply(&outcome.reply);
        Ok(TurnReply {
            session_id: session_id.clone(),
            reply: outcome.reply,
            slots: session.slots.clone(),
            done: outcome.done,
        })
    }

    fn extract_into(
        &self,
        session: &mut Session,
        message: &str,
        today: NaiveDate,
        zone: Tz,
        audit: &AuditContext,
    ) {
        let context = ExtractionContext {
            today,
            zone,
            anchor_date: session.slots.start.map(|start| start.with_timezone(&zone).date_naive()),
        };
        let delta = self.extractor.extract(message, &context);
        if delta.is_empty() {
            return;
        }

        if delta.skip_email {
            session.skip_email = true;
        }
        let merged = session.slots.merge(&delta);
        tracing::info!(
            event_name = "agent.extraction.merged",
            correlation_id = %audit.correlation_id,
            session_id = %session.id,
            fields = ?delta.field_names(),
            updated = ?merged.updated,
            rejected = ?merged.rejected,
            "extracted slots merged"
        );
        self.audit.emit(
            audit
                .event("extraction.merged", AuditCategory::Extraction, AuditOutcome::Success)
                .with_metadata("fields", delta.field_names().join(",")),
        );
    }

    async fn decide_and_apply(
        &self,
        session: &mut Session,
        message: &str,
        today: NaiveDate,
        audit: &AuditContext,
    ) -> TurnOutcome {
        let context =
            DecisionContext { slots: &session.slots, history: &session.history, message, today };
        let decision = match self.policy.decide(context).await {
            Ok(decision) => decision,
            Err(failure) => {
                tracing::warn!(
                    event_name = "agent.decision.failed",
                    correlation_id = %audit.correlation_id,
                    session_id = %session.id,
                    error = %failure,
                    "decision function call failed"
                );
                self.audit.emit(
                    audit
                        .event("decision.failed", AuditCategory::Policy, AuditOutcome::Failed)
                        .with_metadata("reason", failure.reason.clone()),
                );
                return TurnOutcome::reply(format!(
                    "I couldn't reach the scheduling assistant ({}). Please try again.",
                    failure.reason
                ));
            }
        };

        tracing::info!(
            event_name = "agent.decision.completed",
            correlation_id = %audit.correlation_id,
            session_id = %session.id,
            action = decision.action.kind().as_str(),
            attempts = decision.attempts,
            fell_back = decision.fell_back,
            "decision applied"
        );
        self.audit.emit(
            audit
                .event("decision.completed", AuditCategory::Policy, AuditOutcome::Success)
                .with_metadata("action", decision.action.kind().as_str())
                .with_metadata("attempts", decision.attempts.to_string()),
        );

        self.apply(session, decision.action, audit).await
    }

    async fn apply(&self, session: &mut Session, action: Action, audit: &AuditContext) -> TurnOutcome {
        match action {
            Action::Ask { prompt } => TurnOutcome::reply(prompt),
            Action::Set { delta } => {
                let merged = session.slots.merge(&delta);
                TurnOutcome::reply(set_acknowledgement(&merged, &session.slots))
            }
            Action::Confirm { proposal, summary } => {
                if matches!(proposal, Proposal::SendEmail(_)) && session.skip_email {
                    tracing::info!(
                        event_name = "agent.notification.suppressed",
                        correlation_id = %audit.correlation_id,
                        session_id = %session.id,
                        "email proposal dropped by skip-email preference"
                    );
                    self.record_gate(audit, "gate.suppressed", &proposal, AuditOutcome::Rejected);
                    return TurnOutcome::reply(SUPPRESSED_EMAIL_REPLY);
                }
                self.record_gate(audit, "gate.armed", &proposal, AuditOutcome::Success);
                session.gate.arm(proposal);
                TurnOutcome::reply(summary)
            }
            Action::CheckAvailability { window } => {
                let zone = session.slots.timezone.unwrap_or(self.default_zone);
                match self.executor.check_availability(&window, zone).await {
                    Ok(busy) => {
                        self.record_tool(audit, "tool.get_busy", AuditOutcome::Success, None);
                        TurnOutcome::reply(availability_reply(&window, zone, &busy))
                    }
                    Err(failure) => {
                        self.record_tool(audit, "tool.get_busy", AuditOutcome::Failed, Some(&failure.reason));
                        TurnOutcome::reply(format!("Availability check failed: {}.", failure.reason))
                    }
                }
            }
            Action::CreateEvent(_) | Action::SendEmail(_) => {
                let violation = ConfirmationGate::reject_unconfirmed(&action);
                tracing::warn!(
                    event_name = "agent.gate.violation",
                    correlation_id = %audit.correlation_id,
                    session_id = %session.id,
                    action = violation.kind.as_str(),
                    reason = violation.reason,
                    "unconfirmed mutating action rejected"
                );
                self.audit.emit(
                    audit
                        .event("gate.violation", AuditCategory::Gate, AuditOutcome::Rejected)
                        .with_metadata("action", violation.kind.as_str())
                        .with_metadata("reason", violation.reason),
                );
                TurnOutcome::reply(GATE_REJECTION)
            }
            Action::Finish { message } => {
                session.end();
                tracing::info!(
                    event_name = "agent.session.ended",
                    correlation_id = %audit.correlation_id,
                    session_id = %session.id,
                    "session finished by decision"
                );
                self.audit.emit(audit.event(
                    "session.ended",
                    AuditCategory::Session,
                    AuditOutcome::Success,
                ));
                TurnOutcome::reply(message.unwrap_or_else(|| FINISH_REPLY.to_string()))
            }
        }
    }

    async fn execute_authorized(
        &self,
        session: &mut Session,
        authorized: AuthorizedAction,
        audit: &AuditContext,
    ) -> TurnOutcome {
        let proposal = authorized.proposal().clone();
        let result = self.executor.execute(authorized).await;

        match (proposal, result) {
            (Proposal::CreateEvent(event), Ok(ToolOutcome::EventCreated(created))) => {
                tracing::info!(
                    event_name = "agent.tool.create_event.succeeded",
                    correlation_id = %audit.correlation_id,
                    session_id = %session.id,
                    event_id = %created.event_id,
                    "calendar event created"
                );
                self.record_tool(audit, "tool.create_event", AuditOutcome::Success, None);
                let reply = self.notify_attendees(session, &event, &created, audit).await;
                TurnOutcome { reply, done: true }
            }
            (Proposal::SendEmail(email), Ok(ToolOutcome::EmailSent(receipt))) => {
                tracing::info!(
                    event_name = "agent.tool.send_email.succeeded",
                    correlation_id = %audit.correlation_id,
                    session_id = %session.id,
                    message_id = %receipt.message_id,
                    "email sent"
                );
                self.record_tool(audit, "tool.send_email", AuditOutcome::Success, None);
                TurnOutcome::reply(format!("Sent \"{}\" to {}.", email.subject, email.to.join(", ")))
            }
            (proposal, Err(failure)) => {
                let (event_type, reply) = match proposal {
                    Proposal::CreateEvent(_) => {
                        ("tool.create_event", format!("I couldn't create the event: {}.", failure.reason))
                    }
                    Proposal::SendEmail(_) => {
                        ("tool.send_email", format!("I couldn't send the email: {}.", failure.reason))
                    }
                };
                tracing::warn!(
                    event_name = "agent.tool.failed",
                    correlation_id = %audit.correlation_id,
                    session_id = %session.id,
                    tool = event_type,
                    error = %failure,
                    "collaborator call failed"
                );
                self.record_tool(audit, event_type, AuditOutcome::Failed, Some(&failure.reason));
                TurnOutcome::reply(reply)
            }
            (proposal, Ok(outcome)) => {
                tracing::error!(
                    event_name = "agent.tool.mismatched_outcome",
                    correlation_id = %audit.correlation_id,
                    proposal = proposal.kind().as_str(),
                    outcome = ?outcome,
                    "executor returned an outcome for a different action"
                );
                TurnOutcome::reply("Done.")
            }
        }
    }

    /// Sends the one automatic notification that follows a created event.
    async fn notify_attendees(
        &self,
        session: &Session,
        event: &EventRequest,
        created: &CreatedEvent,
        audit: &AuditContext,
    ) -> String {
        let created_line = format!(
            "Created \"{}\" on {} ({})",
            event.title,
            render_local(created.start, event.timezone),
            event.timezone.name()
        );

        if session.skip_email {
            tracing::info!(
                event_name = "agent.notification.skipped",
                correlation_id = %audit.correlation_id,
                session_id = %session.id,
                reason = "preference",
                "notification skipped"
            );
            return format!("{created_line}. Skipped the notification email.");
        }
        if event.attendees.is_empty() {
            tracing::info!(
                event_name = "agent.notification.skipped",
                correlation_id = %audit.correlation_id,
                session_id = %session.id,
                reason = "no_attendees",
                "notification skipped"
            );
            return format!("{created_line}. No attendees to notify.");
        }

        let email = notification_email(event, created, session.slots.meeting_link.as_deref());
        let recipients = email.to.join(", ");
        match self.executor.execute(ConfirmationGate::automatic_notification(email)).await {
            Ok(_) => {
                tracing::info!(
                    event_name = "agent.notification.sent",
                    correlation_id = %audit.correlation_id,
                    session_id = %session.id,
                    recipient_count = event.attendees.len(),
                    "notification sent"
                );
                self.record_tool(audit, "tool.send_email", AuditOutcome::Success, None);
                format!("{created_line} and emailed {recipients}.")
            }
            Err(failure) => {
                tracing::warn!(
                    event_name = "agent.notification.failed",
                    correlation_id = %audit.correlation_id,
                    session_id = %session.id,
                    error = %failure,
                    "notification failed after event creation"
                );
                self.record_tool(audit, "tool.send_email", AuditOutcome::Failed, Some(&failure.reason));
                format!("{created_line}, but the notification email failed: {}.", failure.reason)
            }
        }
    }

    fn record_gate(
        &self,
        audit: &AuditContext,
        event_type: &str,
        proposal: &Proposal,
        outcome: AuditOutcome,
    ) {
        tracing::info!(
            event_name = "agent.gate.transition",
            correlation_id = %audit.correlation_id,
            transition = event_type,
            proposal = proposal.kind().as_str(),
            "confirmation gate transition"
        );
        self.audit.emit(
            audit
                .event(event_type, AuditCategory::Gate, outcome)
                .with_metadata("proposal", proposal.kind().as_str()),
        );
    }

    fn record_tool(
        &self,
        audit: &AuditContext,
        event_type: &str,
        outcome: AuditOutcome,
        reason: Option<&str>,
    ) {
        let mut event = audit.event(event_type, AuditCategory::Tool, outcome);
        if let Some(reason) = reason {
            event = event.with_metadata("reason", reason);
        }
        self.audit.emit(event);
    }
}

fn set_acknowledgement(merged: &MergeOutcome, slots: &Slots) -> String {
    let mut parts = Vec::new();
    if merged.updated.is_empty() {
        parts.push("Nothing changed.".to_string());
    } else {
        parts.push(format!("Updated {}.", merged.updated.join(", ")));
    }
    if !merged.rejected.is_empty() {
        parts.push("The end must be after the start, so I kept the previous times.".to_string());
    }

    let missing = slots.missing_required();
    if missing.is_empty() {
        parts.push("Everything needed is set; tell me when to create it.".to_string());
    } else {
        parts.push(missing_fields_prompt(&missing));
    }
    parts.join(" ")
}
