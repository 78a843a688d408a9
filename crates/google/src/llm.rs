//! Decision function backends: Ollama `/api/generate` and OpenAI-compatible
//! `/v1/chat/completions`, both asked for a JSON object reply.

use std::sync::Arc;
use std::time::Duration;

use agendum_agent::llm::{DecisionFunction, DecisionPrompt};
use agendum_core::config::{LlmConfig, LlmProvider};
use agendum_core::errors::CollaboratorFailure;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{check_status, endpoint, GoogleApiError};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    format: &'static str,
    stream: bool,
    keep_alive: i64,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone, Debug)]
struct Sampling {
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl Sampling {
    fn from_config(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

pub struct OllamaDecision {
    client: Client,
    base_url: String,
    sampling: Sampling,
}

impl OllamaDecision {
    pub fn new(client: Client, config: &LlmConfig) -> Self {
        Self { client, base_url: config.base_url.clone(), sampling: Sampling::from_config(config) }
    }

    async fn generate(&self, prompt: &DecisionPrompt) -> Result<String, GoogleApiError> {
        let url = endpoint(&self.base_url, &["api", "generate"])?;
        let response = self
            .client
            .post(url)
            .json(&generate_request(&self.sampling, prompt))
            .send()
            .await?;
        let payload: GenerateResponse = check_status(response).await?.json().await?;
        Ok(payload.response)
    }
}

#[async_trait]
impl DecisionFunction for OllamaDecision {
    async fn decide(&self, prompt: &DecisionPrompt) -> Result<String, CollaboratorFailure> {
        tracing::debug!(event_name = "llm.ollama.request", model = %self.sampling.model, "calling ollama");
        self.generate(prompt).await.map_err(|error| {
            tracing::warn!(event_name = "llm.ollama.failed", error = %error, "ollama call failed");
            CollaboratorFailure::decision(error.to_string())
        })
    }
}

pub struct OpenAiDecision {
    client: Client,
    base_url: String,
    api_key: SecretString,
    sampling: Sampling,
}

impl OpenAiDecision {
    pub fn new(client: Client, config: &LlmConfig, api_key: SecretString) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            api_key,
            sampling: Sampling::from_config(config),
        }
    }

    async fn complete(&self, prompt: &DecisionPrompt) -> Result<String, GoogleApiError> {
        let segments: &[&str] = if self.base_url.trim_end_matches('/').ends_with("/v1") {
            &["chat", "completions"]
        } else {
            &["v1", "chat", "completions"]
        };
        let url = endpoint(&self.base_url, segments)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&chat_request(&self.sampling, prompt))
            .send()
            .await?;
        let payload: ChatResponse = check_status(response).await?.json().await?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GoogleApiError::UnexpectedResponse("completion has no content".to_string()))
    }
}

#[async_trait]
impl DecisionFunction for OpenAiDecision {
    async fn decide(&self, prompt: &DecisionPrompt) -> Result<String, CollaboratorFailure> {
        tracing::debug!(event_name = "llm.openai.request", model = %self.sampling.model, "calling chat completions");
        self.complete(prompt).await.map_err(|error| {
            tracing::warn!(event_name = "llm.openai.failed", error = %error, "chat completion failed");
            CollaboratorFailure::decision(error.to_string())
        })
    }
}

/// Builds the configured backend with a client bounded by `timeout_secs`.
pub fn build_decision_function(
    config: &LlmConfig,
) -> Result<Arc<dyn DecisionFunction>, GoogleApiError> {
    let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs.max(1))).build()?;

    match config.provider {
        LlmProvider::Ollama => Ok(Arc::new(OllamaDecision::new(client, config))),
        LlmProvider::OpenAi => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                GoogleApiError::MissingCredential("llm.api_key")
            })?;
            Ok(Arc::new(OpenAiDecision::new(client, config, api_key)))
        }
    }
}

fn generate_request<'a>(sampling: &'a Sampling, prompt: &'a DecisionPrompt) -> GenerateRequest<'a> {
    GenerateRequest {
        model: &sampling.model,
        system: &prompt.system,
        prompt: &prompt.user,
        format: "json",
        stream: false,
        keep_alive: -1,
        options: GenerateOptions {
            temperature: sampling.temperature,
            num_predict: sampling.max_tokens,
        },
    }
}

fn chat_request<'a>(sampling: &'a Sampling, prompt: &'a DecisionPrompt) -> ChatRequest<'a> {
    ChatRequest {
        model: &sampling.model,
        messages: vec![
            ChatMessage { role: "system", content: &prompt.system },
            ChatMessage { role: "user", content: &prompt.user },
        ],
        temperature: sampling.temperature,
        max_tokens: sampling.max_tokens,
        response_format: ResponseFormat { kind: "json_object" },
    }
}

#[cfg(test)]
mod tests {
    use agendum_agent::llm::DecisionPrompt;
    use agendum_core::config::{AppConfig, LlmProvider};
    use serde_json::json;

    use super::{build_decision_function, chat_request, generate_request, ChatResponse, Sampling};

    fn prompt() -> DecisionPrompt {
        DecisionPrompt { system: "rules".to_string(), user: "schedule a sync".to_string() }
    }

    fn sampling() -> Sampling {
        Sampling { model: "phi3:mini".to_string(), temperature: 0.5, max_tokens: 160 }
    }

    #[test]
    fn ollama_request_asks_for_json_without_streaming() {
        let sampling = sampling();
        let prompt = prompt();

        let body = serde_json::to_value(generate_request(&sampling, &prompt)).expect("serializable");

        assert_eq!(
            body,
            json!({
                "model": "phi3:mini",
                "system": "rules",
                "prompt": "schedule a sync",
                "format": "json",
                "stream": false,
                "keep_alive": -1,
                "options": {"temperature": 0.5, "num_predict": 160}
            })
        );
    }

    #[test]
    fn chat_request_uses_json_object_response_format() {
        let sampling = sampling();
        let prompt = prompt();

        let body = serde_json::to_value(chat_request(&sampling, &prompt)).expect("serializable");

        assert_eq!(body["messages"][0], json!({"role": "system", "content": "rules"}));
        assert_eq!(body["messages"][1], json!({"role": "user", "content": "schedule a sync"}));
        assert_eq!(body["response_format"], json!({"type": "json_object"}));
        assert_eq!(body["max_tokens"], json!(160));
    }

    #[test]
    fn chat_response_content_is_read_from_first_choice() {
        let payload: ChatResponse = serde_json::from_value(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"action\":\"ask\"}"}}]
        }))
        .expect("valid payload");

        let content = payload.choices.into_iter().next().and_then(|choice| choice.message.content);
        assert_eq!(content.as_deref(), Some("{\"action\":\"ask\"}"));
    }

    #[test]
    fn openai_backend_requires_an_api_key() {
        let mut config = AppConfig::default().llm;
        config.provider = LlmProvider::OpenAi;
        config.api_key = None;

        assert!(build_decision_function(&config).is_err());

        config.provider = LlmProvider::Ollama;
        assert!(build_decision_function(&config).is_ok());
    }
}
