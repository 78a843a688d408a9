//! HTTP collaborators for the agent runtime.
//!
//! Modules:
//! - calendar: Google Calendar API v3 (event insert, free/busy, calendar lookup)
//! - gmail: Gmail API v1 (plain-text send)
//! - llm: decision function backends (Ollama, OpenAI-compatible chat)
//!
//! Every call is made once. Failures surface as [`GoogleApiError`] and are
//! converted to `CollaboratorFailure` at the trait boundary.

pub mod calendar;
pub mod error;
pub mod gmail;
pub mod llm;

pub use calendar::{CalendarInfo, GoogleCalendarClient};
pub use error::GoogleApiError;
pub use gmail::GmailClient;
pub use llm::{build_decision_function, OllamaDecision, OpenAiDecision};
