use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;

use crate::api::ApiState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionCounts {
    pub active: usize,
    pub tracked: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub sessions: SessionCounts,
    pub default_timezone: String,
    pub checked_at: String,
}

pub async fn healthz(State(state): State<ApiState>) -> (StatusCode, Json<HealthResponse>) {
    let sessions = state.orchestrator.sessions();
    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "agendum-server runtime initialized".to_string(),
        },
        sessions: SessionCounts {
            active: sessions.active_count().await,
            tracked: sessions.len().await,
        },
        default_timezone: state.default_zone.name().to_string(),
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
