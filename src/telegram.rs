//! Telegram Bot API transport: long polling in, `sendMessage` out.

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::bot::{Pipeline, ReplyChannel};
use crate::error::{SourceError, SourceResult};

const API_URL: &str = "https://api.telegram.org";
const LONG_POLL_SECS: u64 = 30;
const RETRY_DELAY: Duration = Duration::from_secs(5);
pub const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> SourceResult<Self> {
        Self::with_api_url(API_URL, token)
    }

    pub fn with_api_url(api_url: &str, token: &str) -> SourceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(LONG_POLL_SECS + 10))
            .build()?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url, token),
        })
    }

    async fn call(&self, method: &str, payload: &Value) -> SourceResult<Value> {
        let url = format!("{}/{}", self.base_url, method);
        let resp = self.client.post(&url).json(payload).send().await?;
        let status = resp.status();
        let body: ApiResponse = resp.json().await?;

        if !body.ok {
            let code = body.error_code.unwrap_or_else(|| status.as_u16());
            let description = body.description.unwrap_or_default();
            return Err(if code == 401 {
                SourceError::Unauthorized(format!("telegram {}", method))
            } else {
                SourceError::Status { status: code, body: description }
            });
        }
        Ok(body.result)
    }

    pub async fn get_updates(&self, offset: i64) -> SourceResult<Vec<Update>> {
        let result = self
            .call(
                "getUpdates",
                &json!({
                    "offset": offset,
                    "timeout": LONG_POLL_SECS,
                    "allowed_updates": ["message"],
                }),
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> SourceResult<()> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            self.call("sendMessage", &json!({ "chat_id": chat_id, "text": chunk }))
                .await?;
        }
        Ok(())
    }
}

/// Split `text` into pieces of at most `max_chars` characters, preferring
/// line breaks as cut points.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if rest.chars().count() <= max_chars {
            chunks.push(rest.to_string());
            break;
        }
        let hard_cut = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let cut = match rest[..hard_cut].rfind('\n') {
            Some(i) if i > 0 => i + 1,
            _ => hard_cut,
        };
        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    chunks
}

/// Replies to the chat a message came from.
pub struct ChatReply {
    telegram: Arc<TelegramClient>,
    chat_id: i64,
}

impl ChatReply {
    pub fn new(telegram: Arc<TelegramClient>, chat_id: i64) -> Self {
        Self { telegram, chat_id }
    }
}

#[async_trait]
impl ReplyChannel for ChatReply {
    async fn send(&self, text: &str) -> SourceResult<()> {
        self.telegram.send_message(self.chat_id, text).await
    }
}

/// Poll for messages forever, handling each in its own task.
pub async fn run(telegram: Arc<TelegramClient>, pipeline: Arc<Pipeline>) {
    let mut offset = 0;
    info!("Polling Telegram for messages");
    loop {
        let updates = match telegram.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e @ SourceError::Unauthorized(_)) => {
                error!("Telegram rejected the bot token: {}", e);
                return;
            }
            Err(e) => {
                warn!("getUpdates failed: {}", e);
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message else { continue };
            let Some(text) = message.text else { continue };
            if text.starts_with('/') {
                debug!("Ignoring command {:?}", text);
                continue;
            }

            let reply = ChatReply::new(telegram.clone(), message.chat.id);
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                debug!("Handling {:?} from chat {}", text, reply.chat_id);
                pipeline.handle(&text, &reply).await;
            });
        }
    }
}
