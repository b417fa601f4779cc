//! Text generation backends.
//!
//! The pipeline treats generation as an opaque capability: a system turn
//! and a user turn go in, free-form text comes out. Backends:
//!
//! | `generation.provider` | Backend | Endpoint |
//! |----------------------|---------|----------|
//! | `"ollama"` | [`OllamaGenerator`] | `POST {url}/api/chat` |
//! | `"openai"` | [`OpenAIGenerator`] | `POST {url}/chat/completions` |
//! | `"disabled"` | [`DisabledGenerator`] | always errors |
//!
//! Decoding is greedy by default (`temperature = 0.0`) with a repetition
//! penalty, so the same prompt yields the same report on the same model.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::config::{secret, GenerationConfig};
use crate::http::{build_client, join_url, send_with_retry};

/// One chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// A chat model that turns a prompt into report text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model_name(&self) -> &str;

    /// Generate at most `max_tokens` tokens in reply to `system` + `user`.
    async fn generate(&self, system: &str, user: &str, max_tokens: usize) -> Result<String>;
}

// ============ Ollama ============

/// Generator backed by Ollama's native chat API.
pub struct OllamaGenerator {
    model: String,
    url: String,
    temperature: f32,
    repetition_penalty: f32,
    client: Client,
    max_retries: u32,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            temperature: config.temperature,
            repetition_penalty: config.repetition_penalty,
            client: build_client(config.timeout_secs)?,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system: &str, user: &str, max_tokens: usize) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [Message::system(system), Message::user(user)],
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": max_tokens,
                "repeat_penalty": self.repetition_penalty,
            },
        });
        let request = self
            .client
            .post(join_url(&self.url, "api/chat"))
            .json(&body);

        let response = send_with_retry(request, self.max_retries, "Ollama")
            .await
            .with_context(|| format!("is Ollama running at {}?", self.url))?;
        let json: Value = response.json().await.context("Invalid Ollama chat response")?;
        parse_ollama_chat(&json)
    }
}

fn parse_ollama_chat(json: &Value) -> Result<String> {
    if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
        bail!("Ollama error: {}", err);
    }
    json.get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama chat response: missing message.content"))
}

// ============ OpenAI-compatible ============

/// Generator for any OpenAI-compatible chat completions server.
///
/// The bearer key is read from the variable named by
/// `generation.api_key_env`; local servers that need no key work without it.
pub struct OpenAIGenerator {
    model: String,
    url: String,
    api_key: Option<String>,
    temperature: f32,
    repetition_penalty: f32,
    client: Client,
    max_retries: u32,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key: secret(&config.api_key_env),
            temperature: config.temperature,
            repetition_penalty: config.repetition_penalty,
            client: build_client(config.timeout_secs)?,
            max_retries: config.max_retries,
        })
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            join_url(base, "chat/completions")
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system: &str, user: &str, max_tokens: usize) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [Message::system(system), Message::user(user)],
            "temperature": self.temperature,
            "max_tokens": max_tokens,
            // Maps a multiplicative penalty onto OpenAI's additive scale.
            "frequency_penalty": (self.repetition_penalty - 1.0).clamp(0.0, 2.0),
        });

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = send_with_retry(request, self.max_retries, "LLM").await?;
        let json: Value = response.json().await.context("Failed to parse LLM JSON")?;
        parse_chat_completion(&json)
    }
}

fn parse_chat_completion(json: &Value) -> Result<String> {
    if let Some(err) = json.get("error") {
        bail!("LLM error: {}", err);
    }
    let choice = json
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| anyhow::anyhow!("Invalid LLM response: no choices"))?;
    // `content` may be null (e.g. refusals); treat it as empty output.
    Ok(choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string())
}

// ============ Disabled ============

/// A generator that always fails. Used with `generation.provider = "disabled"`,
/// e.g. when only the `corpus` command is needed.
pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _system: &str, _user: &str, _max_tokens: usize) -> Result<String> {
        bail!("Generation provider is disabled")
    }
}

/// Create the [`TextGenerator`] named by `generation.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
