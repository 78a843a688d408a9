//! HTTP surface for the scheduling agent.
//!
//! - `POST /agent/start`, `/agent/chat`, `/agent/end`: the conversational turn interface
//! - `POST /events/create`, `/email/send`: direct collaborator calls with request validation
//! - `GET /healthz`: readiness and live session count

use std::collections::BTreeSet;
use std::sync::Arc;

use agendum_agent::tools::{CalendarClient, CreatedEvent, MailClient, MailReceipt};
use agendum_agent::TurnOrchestrator;
use agendum_core::domain::action::{EmailRequest, EventRequest};
use agendum_core::domain::session::SessionId;
use agendum_core::domain::slots::Slots;
use agendum_core::errors::{ApplicationError, InterfaceError};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::health;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<TurnOrchestrator>,
    pub calendar: Arc<dyn CalendarClient>,
    pub mail: Arc<dyn MailClient>,
    pub default_zone: Tz,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/agent/start", post(start_session))
        .route("/agent/chat", post(chat))
        .route("/agent/end", post(end_session))
        .route("/events/create", post(create_event))
        .route("/email/send", post(send_email))
        .route("/healthz", get(health::healthz))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    error: &'static str,
    detail: String,
    correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl ApiError {
    fn new(error: impl Into<ApplicationError>, correlation_id: &str) -> Self {
        Self(error.into().into_interface(correlation_id))
    }

    fn validation(message: impl Into<String>, correlation_id: &str) -> Self {
        Self::new(ApplicationError::Validation(message.into()), correlation_id)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(
            event_name = "server.request.failed",
            correlation_id = %self.0.correlation_id(),
            status = status.as_u16(),
            error = %self.0,
            "request failed"
        );

        let body = ApiErrorBody {
            error: self.0.user_message(),
            detail: self.0.to_string(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    pub session_id: String,
    pub reply: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
    pub slots: Slots,
    pub done: bool,
}

#[derive(Debug, Deserialize)]
pub struct EndRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct EndResponse {
    pub ended: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

async fn start_session(State(state): State<ApiState>, headers: HeaderMap) -> Json<StartResponse> {
    let correlation_id = correlation_id(&headers);
    let started = state.orchestrator.start_session(&correlation_id).await;
    Json(StartResponse { session_id: started.session_id.to_string(), reply: started.reply })
}

async fn chat(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let session_id = SessionId(request.session_id);
    let turn = state
        .orchestrator
        .handle_turn(&session_id, &request.message, &correlation_id)
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;

    Ok(Json(ChatResponse {
        session_id: turn.session_id.to_string(),
        reply: turn.reply,
        slots: turn.slots,
        done: turn.done,
    }))
}

async fn end_session(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<EndRequest>,
) -> Result<Json<EndResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    state
        .orchestrator
        .end_session(&SessionId(request.session_id), &correlation_id)
        .await
        .map_err(|error| ApiError::new(error, &correlation_id))?;
    Ok(Json(EndResponse { ended: true }))
}

async fn create_event(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<CreateEventRequest>,
) -> Result<Json<CreatedEvent>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let event = validate_event(request, state.default_zone)
        .map_err(|message| ApiError::validation(message, &correlation_id))?;

    info!(
        event_name = "server.events.create_requested",
        correlation_id = %correlation_id,
        attendee_count = event.attendees.len(),
        "direct event creation"
    );
    let created = state
        .calendar
        .create_event(&event)
        .await
        .map_err(|failure| ApiError::new(failure, &correlation_id))?;
    Ok(Json(created))
}

async fn send_email(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<SendEmailRequest>,
) -> Result<Json<MailReceipt>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let email =
        validate_email(request).map_err(|message| ApiError::validation(message, &correlation_id))?;

    info!(
        event_name = "server.email.send_requested",
        correlation_id = %correlation_id,
        recipient_count = email.to.len(),
        "direct email send"
    );
    let receipt = state
        .mail
        .send(&email)
        .await
        .map_err(|failure| ApiError::new(failure, &correlation_id))?;
    Ok(Json(receipt))
}

fn validate_event(request: CreateEventRequest, default_zone: Tz) -> Result<EventRequest, String> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err("title must not be empty".to_string());
    }
    let start = DateTime::parse_from_rfc3339(request.start.trim())
        .map_err(|error| format!("start must be RFC 3339 with an offset: {error}"))?;
    let end = DateTime::parse_from_rfc3339(request.end.trim())
        .map_err(|error| format!("end must be RFC 3339 with an offset: {error}"))?;
    if end <= start {
        return Err("end must be after start".to_string());
    }
    let timezone = match request.timezone.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => {
            raw.parse::<Tz>().map_err(|_| format!("`{raw}` is not an IANA timezone"))?
        }
        _ => default_zone,
    };

    Ok(EventRequest {
        title: title.to_string(),
        start,
        end,
        timezone,
        attendees: normalize_addresses(&request.attendees)?,
        description: request.description.filter(|text| !text.trim().is_empty()),
    })
}

fn validate_email(request: SendEmailRequest) -> Result<EmailRequest, String> {
    let to = normalize_addresses(&request.to)?;
    if to.is_empty() {
        return Err("at least one recipient is required".to_string());
    }
    if request.subject.trim().is_empty() {
        return Err("subject must not be empty".to_string());
    }
    Ok(EmailRequest { to, subject: request.subject.trim().to_string(), body: request.body })
}

fn normalize_addresses(raw: &[String]) -> Result<Vec<String>, String> {
    let mut addresses = BTreeSet::new();
    for address in raw {
        let address = address.trim().to_ascii_lowercase();
        let valid = address
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
            .unwrap_or(false);
        if !valid || address.contains(char::is_whitespace) {
            return Err(format!("`{address}` is not an email address"));
        }
        addresses.insert(address);
    }
    Ok(addresses.into_iter().collect())
}
