pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;

pub use audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
    TracingAuditSink,
};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, LlmProvider};
pub use domain::action::{
    Action, ActionKind, EmailRequest, EventRequest, Proposal, TimeWindow,
};
pub use domain::session::{ChatMessage, ChatRole, SessionId, SessionStatus};
pub use domain::slots::{MergeOutcome, SlotDelta, Slots};
pub use errors::{
    ApplicationError, Collaborator, CollaboratorFailure, GateViolation, InterfaceError,
    PolicySchemaError, TurnError,
};
