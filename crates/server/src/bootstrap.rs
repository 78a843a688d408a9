use std::sync::Arc;
use std::time::Duration;

use agendum_agent::tools::{CalendarClient, MailClient};
use agendum_agent::{OrchestratorSettings, TurnOrchestrator};
use agendum_core::config::AppConfig;
use agendum_google::{build_decision_function, GmailClient, GoogleApiError, GoogleCalendarClient};
use thiserror::Error;
use tracing::info;

use crate::api::ApiState;

const GOOGLE_TIMEOUT_SECS: u64 = 30;

pub struct Application {
    pub config: AppConfig,
    pub state: ApiState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("http client setup failed: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("decision backend setup failed: {0}")]
    DecisionBackend(#[source] GoogleApiError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        llm_provider = config.llm.provider.as_str(),
        llm_model = %config.llm.model,
        "starting application bootstrap"
    );

    let google_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(GOOGLE_TIMEOUT_SECS))
        .build()
        .map_err(BootstrapError::HttpClient)?;
    let calendar: Arc<dyn CalendarClient> =
        Arc::new(GoogleCalendarClient::from_config(google_client.clone(), &config.google));
    let mail: Arc<dyn MailClient> =
        Arc::new(GmailClient::from_config(google_client, &config.google));
    let decision = build_decision_function(&config.llm).map_err(BootstrapError::DecisionBackend)?;

    let settings = OrchestratorSettings::from_config(&config);
    let default_zone = settings.default_zone;
    let orchestrator =
        Arc::new(TurnOrchestrator::new(decision, calendar.clone(), mail.clone(), settings));

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        default_timezone = default_zone.name(),
        calendar_id = %config.google.calendar_id,
        "collaborators and orchestrator initialized"
    );

    Ok(Application { config, state: ApiState { orchestrator, calendar, mail, default_zone } })
}

#[cfg(test)]
mod tests {
    use agendum_core::config::{AppConfig, ConfigOverrides, LlmProvider, LoadOptions};

    use crate::bootstrap::bootstrap_with_config;

    #[test]
    fn config_load_fails_fast_without_google_credentials() {
        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                google_access_token: Some(String::new()),
                gmail_from: Some("ada@example.com".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let message = result.err().map(|error| error.to_string()).unwrap_or_default();
        assert!(message.contains("google.access_token"), "unexpected error: {message}");
    }

    #[test]
    fn bootstrap_wires_orchestrator_with_configured_zone() {
        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                google_access_token: Some("ya29.test".to_string()),
                gmail_from: Some("ada@example.com".to_string()),
                llm_provider: Some(LlmProvider::Ollama),
                default_timezone: Some("Europe/Berlin".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("config should load with valid overrides");
        let app = bootstrap_with_config(config).expect("bootstrap should succeed");

        assert_eq!(app.state.default_zone, chrono_tz::Europe::Berlin);
        assert_eq!(app.config.google.gmail_from, "ada@example.com");
    }
}
