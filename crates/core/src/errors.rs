use thiserror::Error;

use crate::domain::action::ActionKind;
use crate::domain::session::SessionId;

/// Turn-level rejections raised before any extraction or external call.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("session `{session_id}` has ended")]
    SessionEnded { session_id: SessionId },
    #[error("session `{session_id}` was not found")]
    UnknownSession { session_id: SessionId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collaborator {
    Calendar,
    Mail,
    DecisionFunction,
}

impl Collaborator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Calendar => "calendar",
            Self::Mail => "mail",
            Self::DecisionFunction => "decision_function",
        }
    }
}

/// A calendar, mail, or decision-function call failed. Never retried.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{} call failed: {reason}", .collaborator.as_str())]
pub struct CollaboratorFailure {
    pub collaborator: Collaborator,
    pub reason: String,
}

impl CollaboratorFailure {
    pub fn calendar(reason: impl Into<String>) -> Self {
        Self { collaborator: Collaborator::Calendar, reason: reason.into() }
    }

    pub fn mail(reason: impl Into<String>) -> Self {
        Self { collaborator: Collaborator::Mail, reason: reason.into() }
    }

    pub fn decision(reason: impl Into<String>) -> Self {
        Self { collaborator: Collaborator::DecisionFunction, reason: reason.into() }
    }
}

/// A mutating action reached execution without a matching confirmed proposal.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("gate violation for {}: {reason}", .kind.as_str())]
pub struct GateViolation {
    pub kind: ActionKind,
    pub reason: &'static str,
}

/// The decision function returned a payload that does not fit the action schema.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PolicySchemaError {
    #[error("payload contains no JSON object")]
    NoJsonObject,
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    #[error("action `{action}` is missing required field `{field}`")]
    MissingField { action: &'static str, field: &'static str },
    #[error("action `{action}` has invalid field `{field}`: {detail}")]
    InvalidField { action: &'static str, field: &'static str, detail: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Turn(#[from] TurnError),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<CollaboratorFailure> for ApplicationError {
    fn from(value: CollaboratorFailure) -> Self {
        Self::Integration(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "That session does not exist. Start a new one.",
            Self::Conflict { .. } => "That session has ended. Start a new one to keep scheduling.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Turn(error @ TurnError::UnknownSession { .. }) => {
                Self::NotFound { message: error.to_string(), correlation_id }
            }
            ApplicationError::Turn(error @ TurnError::SessionEnded { .. }) => {
                Self::Conflict { message: error.to_string(), correlation_id }
            }
            ApplicationError::Validation(message) => Self::BadRequest { message, correlation_id },
            ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
