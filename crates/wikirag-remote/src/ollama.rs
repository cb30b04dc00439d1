use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use wikirag_core::config::LlmSettings;
use wikirag_core::traits::Generator;
use wikirag_core::types::{Role, Turn};

/// Ollama HTTP client. Single prompts go to `/api/generate`, prompts with
/// history to `/api/chat`. Streaming is disabled so each call returns one body.
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Options {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: Options,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: Options,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

impl OllamaGenerator {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("building Ollama HTTP client")?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    pub fn model(&self) -> &str { &self.model }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.post(&url).json(body).send().await.with_context(|| format!("requesting {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Ollama returned {}: {}", status, text.trim()));
        }
        resp.json::<R>().await.with_context(|| format!("decoding response from {url}"))
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "ollama generate");
        let body = GenerateRequest { model: &self.model, prompt, stream: false, options: Options { temperature: self.temperature } };
        let resp: GenerateResponse = self.post("/api/generate", &body).await?;
        Ok(resp.response)
    }

    async fn generate_with_history(&self, prompt: &str, history: &[Turn]) -> Result<String> {
        if history.is_empty() {
            return self.generate(prompt).await;
        }
        debug!(model = %self.model, turns = history.len(), "ollama chat");
        let body = ChatRequest {
            model: &self.model,
            messages: chat_messages(history, prompt),
            stream: false,
            options: Options { temperature: self.temperature },
        };
        let resp: ChatResponse = self.post("/api/chat", &body).await?;
        Ok(resp.message.content)
    }
}

/// Prior turns as chat messages followed by the new user prompt.
pub fn chat_messages(history: &[Turn], prompt: &str) -> Vec<ChatMessage> {
    history
        .iter()
        .map(|t| ChatMessage {
            role: match t.role { Role::User => "user", Role::Bot => "assistant" }.to_string(),
            content: t.message.clone(),
        })
        .chain(std::iter::once(ChatMessage { role: "user".into(), content: prompt.to_string() }))
        .collect()
}
