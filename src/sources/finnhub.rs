//! Finnhub company and market news

use async_trait::async_trait;
use chrono::{Duration, Local};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{check_status, http_client, CandidateSource, HeadlineSource};
use crate::aggregator::HEADLINE_CHAR_CAP;
use crate::error::{SourceError, SourceResult};
use crate::notices::Notices;
use crate::tickers::normalize;

const BASE_URL: &str = "https://finnhub.io/api/v1";

static MENTION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{1,5}\b").expect("mention pattern is valid"));

#[derive(Debug, Deserialize)]
struct NewsItem {
    #[serde(default)]
    headline: String,
    #[serde(default)]
    datetime: i64,
}

#[derive(Clone)]
pub struct FinnhubClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    notices: Arc<Notices>,
}

impl FinnhubClient {
    pub fn new(api_key: Option<String>, notices: Arc<Notices>) -> SourceResult<Self> {
        Self::with_base_url(BASE_URL, api_key, notices)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: Option<String>,
        notices: Arc<Notices>,
    ) -> SourceResult<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.into(),
            api_key,
            notices,
        })
    }

    async fn get_news(&self, path: &str, params: &[(&str, String)]) -> SourceResult<Vec<NewsItem>> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(SourceError::MissingApiKey("Finnhub"))?;

        let url = format!("{}/{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .query(params)
            .query(&[("token", key)])
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.notices.push(format!("❌ Finnhub key invalid for {}", path));
            return Err(SourceError::Unauthorized(path.to_string()));
        }
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// Every general-market headline Finnhub currently returns.
    pub async fn general_headlines(&self) -> SourceResult<Vec<String>> {
        let items = self.get_news("news", &[("category", "general".to_string())]).await?;
        Ok(items.into_iter().map(|i| i.headline).collect())
    }

    /// Candidate source counting symbol-like words in market headlines.
    pub fn most_mentioned(&self, count: usize) -> MentionSource {
        MentionSource {
            finnhub: self.clone(),
            count,
        }
    }
}

#[async_trait]
impl HeadlineSource for FinnhubClient {
    async fn company_headlines(
        &self,
        symbol: &str,
        days: i64,
        max_items: usize,
    ) -> SourceResult<Vec<String>> {
        let end = Local::now().date_naive();
        let start = end - Duration::days(days);
        let mut items = self
            .get_news(
                "company-news",
                &[
                    ("symbol", symbol.to_string()),
                    ("from", start.format("%Y-%m-%d").to_string()),
                    ("to", end.format("%Y-%m-%d").to_string()),
                ],
            )
            .await?;

        items.sort_by(|a, b| b.datetime.cmp(&a.datetime));
        Ok(distinct_headlines(items.into_iter().map(|i| i.headline), max_items))
    }

    async fn global_headlines(&self, max_items: usize) -> SourceResult<Vec<String>> {
        let headlines = self.general_headlines().await?;
        Ok(distinct_headlines(headlines, max_items))
    }
}

/// Trimmed, non-empty, capped headlines in input order; texts equal after
/// the cap count once.
fn distinct_headlines<I: IntoIterator<Item = String>>(raw: I, max_items: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|h| h.trim().chars().take(HEADLINE_CHAR_CAP).collect::<String>())
        .filter(|h| !h.is_empty())
        .filter(|h| seen.insert(h.clone()))
        .take(max_items)
        .collect()
}

/// Most frequent uppercase words across headlines; ties keep first appearance.
pub fn count_mentions<S: AsRef<str>>(headlines: &[S], count: usize) -> Vec<String> {
    let joined = headlines
        .iter()
        .map(|h| h.as_ref())
        .collect::<Vec<_>>()
        .join(" ");

    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for m in MENTION_PATTERN.find_iter(&joined) {
        let token = m.as_str().to_string();
        let entry = counts.entry(token.clone()).or_insert(0);
        if *entry == 0 {
            order.push(token);
        }
        *entry += 1;
    }

    // stable: equal counts stay in first-seen order
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order.truncate(count);
    order
}

/// Valid ticker symbols among the most mentioned words, at most `count`.
pub fn top_mentions<S: AsRef<str>>(headlines: &[S], count: usize) -> Vec<String> {
    // Over-collect: common words like "AI" or "CEO" are dropped by validation.
    let mut symbols = normalize(count_mentions(headlines, count.saturating_mul(6)));
    symbols.truncate(count);
    symbols.into_iter().map(|s| s.to_string()).collect()
}

#[derive(Clone)]
pub struct MentionSource {
    finnhub: FinnhubClient,
    count: usize,
}

#[async_trait]
impl CandidateSource for MentionSource {
    async fn candidates(&self) -> SourceResult<Vec<String>> {
        let headlines = self.finnhub.general_headlines().await?;
        if headlines.is_empty() {
            warn!("Finnhub returned no general headlines to count mentions in");
        }
        Ok(top_mentions(&headlines, self.count))
    }

    fn name(&self) -> &str {
        "finnhub-mentions"
    }
}
