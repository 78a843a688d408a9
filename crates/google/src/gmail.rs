//! Gmail API v1: plain-text send as the configured sender.

use agendum_agent::tools::{MailClient, MailReceipt};
use agendum_core::config::GoogleConfig;
use agendum_core::domain::action::EmailRequest;
use agendum_core::errors::CollaboratorFailure;
use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{check_status, endpoint, GoogleApiError};

#[derive(Debug, Serialize)]
struct SendBody {
    raw: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SentMessage {
    #[serde(default)]
    id: String,
}

pub struct GmailClient {
    client: Client,
    base_url: String,
    from: String,
    access_token: SecretString,
}

impl GmailClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        from: impl Into<String>,
        access_token: SecretString,
    ) -> Self {
        Self { client, base_url: base_url.into(), from: from.into(), access_token }
    }

    pub fn from_config(client: Client, config: &GoogleConfig) -> Self {
        Self::new(
            client,
            config.gmail_base_url.clone(),
            config.gmail_from.clone(),
            config.access_token.clone(),
        )
    }

    pub fn sender(&self) -> &str {
        &self.from
    }

    pub async fn send_message(&self, email: &EmailRequest) -> Result<MailReceipt, GoogleApiError> {
        let url = endpoint(&self.base_url, &["users", "me", "messages", "send"])?;
        let body = SendBody { raw: URL_SAFE.encode(compose_message(&self.from, email)) };
        let response = self
            .client
            .post(url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await?;
        let sent: SentMessage = check_status(response).await?.json().await?;

        Ok(MailReceipt { message_id: sent.id })
    }
}

#[async_trait]
impl MailClient for GmailClient {
    async fn send(&self, email: &EmailRequest) -> Result<MailReceipt, CollaboratorFailure> {
        self.send_message(email).await.map_err(|error| {
            tracing::warn!(
                event_name = "google.gmail.send_failed",
                error = %error,
                recipient_count = email.to.len(),
                "gmail send failed"
            );
            CollaboratorFailure::mail(error.to_string())
        })
    }
}

/// RFC 5322 message text. Header values are stripped of line breaks and a
/// non-ASCII subject is sent as an RFC 2047 encoded word.
pub fn compose_message(from: &str, email: &EmailRequest) -> String {
    let to = email.to.iter().map(|address| single_line(address)).collect::<Vec<_>>().join(", ");
    format!(
        "From: {}\r\nTo: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\n\
         Content-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{}",
        single_line(from),
        to,
        encode_subject(&single_line(&email.subject)),
        email.body
    )
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ").trim().to_string()
}

fn encode_subject(subject: &str) -> String {
    if subject.is_ascii() {
        subject.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(subject))
    }
}
