use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub google: GoogleConfig,
    pub scheduling: SchedulingConfig,
    pub session: SessionConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct GoogleConfig {
    pub access_token: SecretString,
    pub calendar_id: String,
    pub gmail_from: String,
    pub calendar_base_url: String,
    pub gmail_base_url: String,
}

#[derive(Clone, Debug)]
pub struct SchedulingConfig {
    pub default_timezone: String,
    pub default_duration_minutes: u32,
    pub history_window: usize,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub idle_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Ollama,
    OpenAi,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub google_access_token: Option<String>,
    pub gmail_from: Option<String>,
    pub default_timezone: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: "http://localhost:11434".to_string(),
                model: "phi3:mini".to_string(),
                timeout_secs: 120,
                temperature: 0.2,
                max_tokens: 160,
            },
            google: GoogleConfig {
                access_token: String::new().into(),
                calendar_id: "primary".to_string(),
                gmail_from: String::new(),
                calendar_base_url: "https://www.googleapis.com/calendar/v3".to_string(),
                gmail_base_url: "https://gmail.googleapis.com/gmail/v1".to_string(),
            },
            scheduling: SchedulingConfig {
                default_timezone: "America/Chicago".to_string(),
                default_duration_minutes: 30,
                history_window: 8,
            },
            session: SessionConfig { idle_ttl_secs: 15 * 60 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl LlmProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
        }
    }
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected ollama|openai)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl SchedulingConfig {
    /// The configured default zone. Validation guarantees it parses.
    pub fn default_zone(&self) -> Tz {
        self.default_timezone.trim().parse().unwrap_or(chrono_tz::UTC)
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("agendum.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
        }

        if let Some(google) = patch.google {
            if let Some(access_token_value) = google.access_token {
                self.google.access_token = secret_value(access_token_value);
            }
            if let Some(calendar_id) = google.calendar_id {
                self.google.calendar_id = calendar_id;
            }
            if let Some(gmail_from) = google.gmail_from {
                self.google.gmail_from = gmail_from;
            }
            if let Some(calendar_base_url) = google.calendar_base_url {
                self.google.calendar_base_url = calendar_base_url;
            }
            if let Some(gmail_base_url) = google.gmail_base_url {
                self.google.gmail_base_url = gmail_base_url;
            }
        }

        if let Some(scheduling) = patch.scheduling {
            if let Some(default_timezone) = scheduling.default_timezone {
                self.scheduling.default_timezone = default_timezone;
            }
            if let Some(default_duration_minutes) = scheduling.default_duration_minutes {
                self.scheduling.default_duration_minutes = default_duration_minutes;
            }
            if let Some(history_window) = scheduling.history_window {
                self.scheduling.history_window = history_window;
            }
        }

        if let Some(session) = patch.session {
            if let Some(idle_ttl_secs) = session.idle_ttl_secs {
                self.session.idle_ttl_secs = idle_ttl_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("AGENDUM_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("AGENDUM_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("AGENDUM_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("AGENDUM_LLM_MODEL").or_else(|| read_env("LLM_MODEL")) {
            self.llm.model = value;
        }
        if let Some(value) = read_env("AGENDUM_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("AGENDUM_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("AGENDUM_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("AGENDUM_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("AGENDUM_LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_u32("AGENDUM_LLM_MAX_TOKENS", &value)?;
        }

        if let Some(value) = read_env("AGENDUM_GOOGLE_ACCESS_TOKEN") {
            self.google.access_token = secret_value(value);
        }
        if let Some(value) = read_env("AGENDUM_GOOGLE_CALENDAR_ID") {
            self.google.calendar_id = value;
        }
        if let Some(value) = read_env("AGENDUM_GOOGLE_GMAIL_FROM").or_else(|| read_env("GMAIL_FROM"))
        {
            self.google.gmail_from = value;
        }
        if let Some(value) = read_env("AGENDUM_GOOGLE_CALENDAR_BASE_URL") {
            self.google.calendar_base_url = value;
        }
        if let Some(value) = read_env("AGENDUM_GOOGLE_GMAIL_BASE_URL") {
            self.google.gmail_base_url = value;
        }

        let default_timezone = read_env("AGENDUM_SCHEDULING_DEFAULT_TIMEZONE")
            .or_else(|| read_env("DEFAULT_TIMEZONE"));
        if let Some(value) = default_timezone {
            self.scheduling.default_timezone = value;
        }
        if let Some(value) = read_env("AGENDUM_SCHEDULING_DEFAULT_DURATION_MINUTES") {
            self.scheduling.default_duration_minutes =
                parse_u32("AGENDUM_SCHEDULING_DEFAULT_DURATION_MINUTES", &value)?;
        }
        if let Some(value) = read_env("AGENDUM_SCHEDULING_HISTORY_WINDOW") {
            self.scheduling.history_window =
                parse_u32("AGENDUM_SCHEDULING_HISTORY_WINDOW", &value)? as usize;
        }

        if let Some(value) = read_env("AGENDUM_SESSION_IDLE_TTL_SECS") {
            self.session.idle_ttl_secs = parse_u64("AGENDUM_SESSION_IDLE_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("AGENDUM_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("AGENDUM_SERVER_PORT") {
            self.server.port = parse_u16("AGENDUM_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("AGENDUM_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("AGENDUM_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("AGENDUM_LOGGING_LEVEL").or_else(|| read_env("AGENDUM_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("AGENDUM_LOGGING_FORMAT").or_else(|| read_env("AGENDUM_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(google_access_token) = overrides.google_access_token {
            self.google.access_token = secret_value(google_access_token);
        }
        if let Some(gmail_from) = overrides.gmail_from {
            self.google.gmail_from = gmail_from;
        }
        if let Some(default_timezone) = overrides.default_timezone {
            self.scheduling.default_timezone = default_timezone;
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_google(&self.google)?;
        validate_scheduling(&self.scheduling)?;
        validate_session(&self.session)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("agendum.toml"), PathBuf::from("config/agendum.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if !is_http_url(&llm.base_url) {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.provider == LlmProvider::OpenAi {
        let missing =
            llm.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "llm.api_key is required for the openai provider".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_google(google: &GoogleConfig) -> Result<(), ConfigError> {
    if google.access_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "google.access_token is required. Issue an OAuth access token with the calendar and gmail.send scopes".to_string(),
        ));
    }

    let sender = google.gmail_from.trim();
    if sender.is_empty() {
        return Err(ConfigError::Validation(
            "google.gmail_from is required (set AGENDUM_GOOGLE_GMAIL_FROM or GMAIL_FROM)"
                .to_string(),
        ));
    }
    if !sender.contains('@') {
        return Err(ConfigError::Validation(format!(
            "google.gmail_from must be an email address, got `{sender}`"
        )));
    }

    if google.calendar_id.trim().is_empty() {
        return Err(ConfigError::Validation("google.calendar_id must not be empty".to_string()));
    }

    for (key, url) in [
        ("google.calendar_base_url", &google.calendar_base_url),
        ("google.gmail_base_url", &google.gmail_base_url),
    ] {
        if !is_http_url(url) {
            return Err(ConfigError::Validation(format!(
                "{key} must start with http:// or https://"
            )));
        }
    }

    Ok(())
}

fn validate_scheduling(scheduling: &SchedulingConfig) -> Result<(), ConfigError> {
    if scheduling.default_timezone.trim().parse::<Tz>().is_err() {
        return Err(ConfigError::Validation(format!(
            "scheduling.default_timezone must be an IANA zone id (e.g. America/Chicago), got `{}`",
            scheduling.default_timezone
        )));
    }

    if scheduling.default_duration_minutes == 0 || scheduling.default_duration_minutes > 24 * 60 {
        return Err(ConfigError::Validation(
            "scheduling.default_duration_minutes must be in range 1..=1440".to_string(),
        ));
    }

    if scheduling.history_window == 0 {
        return Err(ConfigError::Validation(
            "scheduling.history_window must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.idle_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "session.idle_ttl_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    google: Option<GooglePatch>,
    scheduling: Option<SchedulingPatch>,
    session: Option<SessionPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct GooglePatch {
    access_token: Option<String>,
    calendar_id: Option<String>,
    gmail_from: Option<String>,
    calendar_base_url: Option<String>,
    gmail_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SchedulingPatch {
    default_timezone: Option<String>,
    default_duration_minutes: Option<u32>,
    history_window: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    idle_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const REQUIRED_VARS: [(&str, &str); 2] = [
        ("AGENDUM_GOOGLE_ACCESS_TOKEN", "ya29.test-token"),
        ("AGENDUM_GOOGLE_GMAIL_FROM", "scheduler@example.com"),
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_required() {
        for (key, value) in REQUIRED_VARS {
            env::set_var(key, value);
        }
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
        for (key, _) in REQUIRED_VARS {
            env::remove_var(key);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_GOOGLE_TOKEN", "ya29.from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("agendum.toml");
            fs::write(
                &path,
                r#"
[google]
access_token = "${TEST_GOOGLE_TOKEN}"
gmail_from = "scheduler@example.com"

[scheduling]
default_timezone = "America/Los_Angeles"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.google.access_token.expose_secret() == "ya29.from-env",
                "access token should be interpolated from environment",
            )?;
            ensure(
                config.scheduling.default_zone() == chrono_tz::America::Los_Angeles,
                "default zone should come from the file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_GOOGLE_TOKEN"]);
        result
    }

    #[test]
    fn legacy_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AGENDUM_GOOGLE_ACCESS_TOKEN", "ya29.test-token");
        env::set_var("GMAIL_FROM", "legacy@example.com");
        env::set_var("LLM_MODEL", "llama3.1");
        env::set_var("DEFAULT_TIMEZONE", "America/New_York");
        env::set_var("AGENDUM_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.google.gmail_from == "legacy@example.com", "GMAIL_FROM alias")?;
            ensure(config.llm.model == "llama3.1", "LLM_MODEL alias")?;
            ensure(
                config.scheduling.default_zone() == chrono_tz::America::New_York,
                "DEFAULT_TIMEZONE alias",
            )?;
            ensure(matches!(config.logging.format, LogFormat::Pretty), "log format alias")?;
            Ok(())
        })();

        clear_vars(&["GMAIL_FROM", "LLM_MODEL", "DEFAULT_TIMEZONE", "AGENDUM_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required();
        env::set_var("AGENDUM_LLM_MODEL", "from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("agendum.toml");
            fs::write(
                &path,
                r#"
[llm]
model = "from-file"
base_url = "http://ollama.internal:11434"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.model == "from-env", "env model should win over file")?;
            ensure(
                config.llm.base_url == "http://ollama.internal:11434",
                "file base url should win over default",
            )?;
            ensure(config.logging.level == "debug", "override log level should win")?;
            Ok(())
        })();

        clear_vars(&["AGENDUM_LLM_MODEL"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required();
        env::set_var("AGENDUM_SCHEDULING_DEFAULT_TIMEZONE", "Pacific Time");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("scheduling.default_timezone")
            );
            ensure(has_message, "validation failure should mention scheduling.default_timezone")
        })();

        clear_vars(&["AGENDUM_SCHEDULING_DEFAULT_TIMEZONE"]);
        result
    }

    #[test]
    fn missing_access_token_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AGENDUM_GOOGLE_GMAIL_FROM", "scheduler@example.com");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected missing token failure".to_string()),
                Err(error) => error,
            };
            ensure(
                error.to_string().contains("google.access_token"),
                "error should name google.access_token",
            )
        })();

        clear_vars(&[]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AGENDUM_GOOGLE_ACCESS_TOKEN", "ya29.secret-value");
        env::set_var("AGENDUM_GOOGLE_GMAIL_FROM", "scheduler@example.com");
        env::set_var("AGENDUM_LLM_PROVIDER", "openai");
        env::set_var("AGENDUM_LLM_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("ya29.secret-value"), "debug output should not contain token")?;
            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["AGENDUM_LLM_PROVIDER", "AGENDUM_LLM_API_KEY"]);
        result
    }
}
