use reqwest::{StatusCode, Url};
use serde_json::Value;

const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum GoogleApiError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("access token expired or revoked")]
    AuthExpired,
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("missing credential `{0}`")]
    MissingCredential(&'static str),
    #[error("invalid endpoint `{0}`")]
    InvalidEndpoint(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Joins path segments onto a base URL, percent-encoding each segment.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, GoogleApiError> {
    let mut url =
        Url::parse(base).map_err(|error| GoogleApiError::InvalidEndpoint(format!("{base}: {error}")))?;
    url.path_segments_mut()
        .map_err(|()| GoogleApiError::InvalidEndpoint(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, GoogleApiError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(GoogleApiError::AuthExpired);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GoogleApiError::Api { status: status.as_u16(), message: error_message(&body) });
    }
    Ok(response)
}

/// Google nests errors as `{"error": {"message": ..}}`; Ollama uses `{"error": ".."}`.
pub(crate) fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let message = parsed.as_ref().and_then(|value| {
        value
            .pointer("/error/message")
            .or_else(|| value.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    message.unwrap_or_else(|| body.trim().chars().take(MAX_ERROR_BODY).collect())
}
