use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use agendum_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct ConfigField {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    render(&config, config_file_doc.as_ref(), config_file_path.as_deref())
}

pub fn render(
    config: &AppConfig,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(config) {
        let source = field_source(field.key, field.env_keys, config_file_doc, config_file_path);
        lines.push(render_line(field.key, &field.value, source));
    }
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<ConfigField> {
    fn field(key: &'static str, value: String, env_keys: &'static [&'static str]) -> ConfigField {
        ConfigField { key, value, env_keys }
    }

    vec![
        field("llm.provider", config.llm.provider.as_str().to_string(), &["AGENDUM_LLM_PROVIDER"]),
        field("llm.base_url", config.llm.base_url.clone(), &["AGENDUM_LLM_BASE_URL"]),
        field("llm.model", config.llm.model.clone(), &["AGENDUM_LLM_MODEL", "LLM_MODEL"]),
        field(
            "llm.api_key",
            config
                .llm
                .api_key
                .as_ref()
                .map(|key| redact_token(key.expose_secret()))
                .unwrap_or_else(|| "<unset>".to_string()),
            &["AGENDUM_LLM_API_KEY"],
        ),
        field("llm.timeout_secs", config.llm.timeout_secs.to_string(), &["AGENDUM_LLM_TIMEOUT_SECS"]),
        field("llm.temperature", config.llm.temperature.to_string(), &["AGENDUM_LLM_TEMPERATURE"]),
        field("llm.max_tokens", config.llm.max_tokens.to_string(), &["AGENDUM_LLM_MAX_TOKENS"]),
        field(
            "google.access_token",
            redact_token(config.google.access_token.expose_secret()),
            &["AGENDUM_GOOGLE_ACCESS_TOKEN"],
        ),
        field("google.calendar_id", config.google.calendar_id.clone(), &["AGENDUM_GOOGLE_CALENDAR_ID"]),
        field(
            "google.gmail_from",
            config.google.gmail_from.clone(),
            &["AGENDUM_GOOGLE_GMAIL_FROM", "GMAIL_FROM"],
        ),
        field(
            "google.calendar_base_url",
            config.google.calendar_base_url.clone(),
            &["AGENDUM_GOOGLE_CALENDAR_BASE_URL"],
        ),
        field(
            "google.gmail_base_url",
            config.google.gmail_base_url.clone(),
            &["AGENDUM_GOOGLE_GMAIL_BASE_URL"],
        ),
        field(
            "scheduling.default_timezone",
            config.scheduling.default_timezone.clone(),
            &["AGENDUM_SCHEDULING_DEFAULT_TIMEZONE", "DEFAULT_TIMEZONE"],
        ),
        field(
            "scheduling.default_duration_minutes",
            config.scheduling.default_duration_minutes.to_string(),
            &["AGENDUM_SCHEDULING_DEFAULT_DURATION_MINUTES"],
        ),
        field(
            "scheduling.history_window",
            config.scheduling.history_window.to_string(),
            &["AGENDUM_SCHEDULING_HISTORY_WINDOW"],
        ),
        field(
            "session.idle_ttl_secs",
            config.session.idle_ttl_secs.to_string(),
            &["AGENDUM_SESSION_IDLE_TTL_SECS"],
        ),
        field(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["AGENDUM_SERVER_BIND_ADDRESS"],
        ),
        field("server.port", config.server.port.to_string(), &["AGENDUM_SERVER_PORT"]),
        field(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["AGENDUM_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["AGENDUM_LOGGING_LEVEL", "AGENDUM_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            config.logging.format.as_str().to_string(),
            &["AGENDUM_LOGGING_FORMAT", "AGENDUM_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("agendum.toml"), PathBuf::from("config/agendum.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a short recognisable prefix, e.g. `ya29.***` or `sk-***`.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some(index) = trimmed.find(['.', '-']) {
        if index > 0 && index <= 6 {
            return format!("{}***", &trimmed[..=index]);
        }
    }

    "<redacted>".to_string()
}
