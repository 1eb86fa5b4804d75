//! Runtime configuration from the environment (and `.env`).

use log::warn;
use std::path::PathBuf;

use crate::budget::DEFAULT_THRESHOLD_PERCENT;
use crate::llm::DEFAULT_MODEL;

pub const DEFAULT_BUDGET_FILE: &str = "token_data.json";
pub const DEFAULT_TOP_N_TRENDING: usize = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<i64>,
    pub finnhub_api_key: Option<String>,
    pub budget_file: PathBuf,
    /// Remaining-budget percentage at or below which the alert fires.
    pub low_budget_threshold: f64,
    /// How many candidates each discovery source is asked for.
    pub top_n_trending: usize,
}

impl Config {
    /// Read `.env` if present, then the process environment.
    pub fn load() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                warn!("Could not read .env: {}", e);
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let telegram_chat_id = get("TELEGRAM_CHAT_ID").and_then(|v| match v.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!("TELEGRAM_CHAT_ID '{}' is not a number, ignoring", v);
                None
            }
        });

        let low_budget_threshold = get("LOW_BUDGET_THRESHOLD")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(DEFAULT_THRESHOLD_PERCENT);

        let top_n_trending = get("TOP_N_TRENDING")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_TOP_N_TRENDING);

        Config {
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id,
            finnhub_api_key: get("FINNHUB_API_KEY"),
            budget_file: get("BUDGET_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BUDGET_FILE)),
            low_budget_threshold,
            top_n_trending,
        }
    }

    /// Warnings about missing keys, shown to the first requester. A missing
    /// bot token is fatal at startup, so it never becomes a notice.
    pub fn startup_notices(&self) -> Vec<String> {
        let mut notices = Vec::new();
        if self.openai_api_key.is_none() {
            notices.push("❌ Missing OPENAI_API_KEY".to_string());
        }
        if self.telegram_chat_id.is_none() {
            notices.push("⚠️ Missing TELEGRAM_CHAT_ID (bot may run but not auto-send)".to_string());
        }
        if self.finnhub_api_key.is_none() {
            notices.push("⚠️ Missing FINNHUB_API_KEY (no news or headline mentions)".to_string());
        }
        notices
    }
}
