//! External market-data and sentiment collaborators.
//!
//! Each lookup is a trait so the pipeline can run against live HTTP
//! endpoints or in-memory fakes. Implementations report failures as
//! [`SourceError`](crate::error::SourceError); choosing a fallback value is
//! the caller's job.

pub mod finnhub;
pub mod stocktwits;
pub mod yahoo;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::SourceResult;

/// Upper bound on any single data-source request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(12);

pub const USER_AGENT: &str = "Mozilla/5.0 (InvestmentBot/1.0)";

/// Price series and descriptive data for one symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceHistory {
    pub display_name: String,
    pub summary: String,
    /// Daily closes, oldest first.
    pub closes: Vec<f64>,
}

/// Crowd-sentiment counts over a sample of recent messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sentiment {
    pub mentions: u32,
    pub bull: u32,
    pub bear: u32,
}

#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Raw ticker-like tokens, unvalidated.
    async fn candidates(&self) -> SourceResult<Vec<String>>;

    fn name(&self) -> &str;
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn price_history(&self, symbol: &str) -> SourceResult<PriceHistory>;
}

#[async_trait]
pub trait HeadlineSource: Send + Sync {
    /// Company headlines from the last `days` days, newest first.
    async fn company_headlines(
        &self,
        symbol: &str,
        days: i64,
        max_items: usize,
    ) -> SourceResult<Vec<String>>;

    /// General market headlines.
    async fn global_headlines(&self, max_items: usize) -> SourceResult<Vec<String>>;
}

#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn sentiment(&self, symbol: &str, max_items: usize) -> SourceResult<Sentiment>;
}

pub(crate) fn http_client() -> SourceResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()?)
}

/// Turn a non-success response into a [`SourceError`], otherwise hand it back.
pub(crate) async fn check_status(
    resp: reqwest::Response,
) -> SourceResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(crate::error::SourceError::Status {
        status: status.as_u16(),
        body,
    })
}
