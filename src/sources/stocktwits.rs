use async_trait::async_trait;
use serde::Deserialize;

use super::{check_status, http_client, Sentiment, SentimentSource};
use crate::error::SourceResult;

const BASE_URL: &str = "https://api.stocktwits.com/api/2";

#[derive(Debug, Deserialize)]
struct Stream {
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    entities: Option<Entities>,
}

#[derive(Debug, Deserialize)]
struct Entities {
    #[serde(default)]
    sentiment: Option<Basic>,
}

#[derive(Debug, Deserialize)]
struct Basic {
    #[serde(default)]
    basic: Option<String>,
}

/// StockTwits symbol stream, counted as crowd sentiment.
#[derive(Debug, Clone)]
pub struct StockTwitsClient {
    client: reqwest::Client,
    base_url: String,
}

impl StockTwitsClient {
    pub fn new() -> SourceResult<Self> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> SourceResult<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl SentimentSource for StockTwitsClient {
    async fn sentiment(&self, symbol: &str, max_items: usize) -> SourceResult<Sentiment> {
        let url = format!("{}/streams/symbol/{}.json", self.base_url, symbol);
        let resp = check_status(self.client.get(&url).send().await?).await?;
        let body: serde_json::Value = resp.json().await?;
        tally(body, max_items)
    }
}

fn tally(body: serde_json::Value, max_items: usize) -> SourceResult<Sentiment> {
    let stream: Stream = serde_json::from_value(body)?;
    let sample = &stream.messages[..stream.messages.len().min(max_items)];

    let mut out = Sentiment {
        mentions: sample.len() as u32,
        ..Sentiment::default()
    };
    for m in sample {
        let label = m
            .entities
            .as_ref()
            .and_then(|e| e.sentiment.as_ref())
            .and_then(|s| s.basic.as_deref());
        match label {
            Some("Bullish") => out.bull += 1,
            Some("Bearish") => out.bear += 1,
            _ => {}
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tally_counts_sample_only() {
        let body = json!({"messages": [
            {"entities": {"sentiment": {"basic": "Bullish"}}},
            {"entities": {"sentiment": null}},
            {"entities": {"sentiment": {"basic": "Bearish"}}},
            {},
            {"entities": {"sentiment": {"basic": "Bullish"}}}
        ]});
        let s = tally(body, 4).unwrap();
        assert_eq!(s, Sentiment { mentions: 4, bull: 1, bear: 1 });
    }

    #[test]
    fn test_tally_without_messages_is_zero() {
        let s = tally(json!({"response": {"status": 404}}), 100).unwrap();
        assert_eq!(s, Sentiment::default());
    }
}
