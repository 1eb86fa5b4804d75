//! Language-model client used to write digests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{SourceError, SourceResult};

const BASE_URL: &str = "https://api.openai.com/v1";
const LLM_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const TEMPERATURE: f32 = 0.6;

/// Model output plus the usage it was billed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub total_tokens: u64,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str, max_output_tokens: u32) -> SourceResult<Completion>;
}

/// OpenAI chat-completions client.
pub struct OpenAiClient {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatContent {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}

impl OpenAiClient {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> SourceResult<Self> {
        Self::with_base_url(api_key, model, BASE_URL)
    }

    /// Point at a proxy or a compatible API.
    pub fn with_base_url(
        api_key: Option<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> SourceResult<Self> {
        Ok(Self {
            api_key,
            model: model.into(),
            base_url: base_url.into(),
            client: reqwest::Client::builder().timeout(LLM_TIMEOUT).build()?,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, prompt: &str, max_output_tokens: u32) -> SourceResult<Completion> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(SourceError::MissingApiKey("OpenAI"))?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: TEMPERATURE,
            max_tokens: max_output_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status { status, body });
        }

        let body: serde_json::Value = response.json().await?;
        parse_completion(body)
    }
}

fn parse_completion(body: serde_json::Value) -> SourceResult<Completion> {
    let parsed: ChatResponse = serde_json::from_value(body)?;
    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or(SourceError::EmptyResponse)?;

    Ok(Completion {
        text: text.trim().to_string(),
        total_tokens: parsed.usage.map(|u| u.total_tokens).unwrap_or(0),
    })
}
