//! Inbound message handling.
//!
//! One message drives one synchronous chain:
//! discovery -> aggregation -> ranking -> digest -> budget update -> alert.

use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;

use crate::aggregator::Aggregator;
use crate::budget::BudgetTracker;
use crate::digest::{Composer, Digest, DigestMode};
use crate::error::SourceResult;
use crate::notices::Notices;
use crate::ranker;
use crate::sources::CandidateSource;
use crate::tickers::{self, TickerSymbol};

pub const SUMMARY_COMMAND: &str = "SUMMARY";
pub const SUMMARY_TITLE: &str = "Overall Market Summary";
pub const NO_CANDIDATES: &str = "⚠ Could not find valid tickers right now. Try again later.";
pub const NO_VALID_TICKERS: &str = "❌ No valid tickers found.";

/// Where replies for one inbound message go.
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    async fn send(&self, text: &str) -> SourceResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Empty,
    Summary,
    Tickers(Vec<TickerSymbol>),
}

impl Request {
    /// Trim and uppercase; `SUMMARY` selects the market digest, anything else
    /// is split into candidate symbols.
    pub fn parse(text: &str) -> Self {
        let normalized = text.trim().to_uppercase();
        if normalized.is_empty() {
            Request::Empty
        } else if normalized == SUMMARY_COMMAND {
            Request::Summary
        } else {
            Request::Tickers(tickers::from_message(&normalized))
        }
    }
}

pub struct Pipeline {
    candidates: Vec<Arc<dyn CandidateSource>>,
    aggregator: Aggregator,
    composer: Composer,
    budget: BudgetTracker,
    notices: Arc<Notices>,
}

impl Pipeline {
    pub fn new(
        candidates: Vec<Arc<dyn CandidateSource>>,
        aggregator: Aggregator,
        composer: Composer,
        budget: BudgetTracker,
        notices: Arc<Notices>,
    ) -> Self {
        Self {
            candidates,
            aggregator,
            composer,
            budget,
            notices,
        }
    }

    pub fn budget(&self) -> &BudgetTracker {
        &self.budget
    }

    pub async fn handle(&self, text: &str, reply: &dyn ReplyChannel) {
        let request = Request::parse(text);
        if request == Request::Empty {
            return;
        }

        let pending = self.notices.take_all();
        if !pending.is_empty() {
            deliver(reply, &pending.join("\n")).await;
        }

        match request {
            Request::Empty => {}
            Request::Summary => self.summary(reply).await,
            Request::Tickers(symbols) => self.tickers(&symbols, reply).await,
        }
    }

    async fn summary(&self, reply: &dyn ReplyChannel) {
        let sources: Vec<&dyn CandidateSource> = self.candidates.iter().map(|s| s.as_ref()).collect();
        let symbols = tickers::discover(&sources).await;
        if symbols.is_empty() {
            warn!("Discovery found no valid tickers");
            deliver(reply, NO_CANDIDATES).await;
            return;
        }
        info!("Summary candidates: {:?}", symbols);

        let packages = self.aggregator.build_all(&symbols).await;
        let selection = ranker::rank(packages);
        let digest = self
            .composer
            .digest(&selection, SUMMARY_TITLE, DigestMode::Summary)
            .await;
        self.settle(digest, reply).await;
    }

    async fn tickers(&self, symbols: &[TickerSymbol], reply: &dyn ReplyChannel) {
        if symbols.is_empty() {
            deliver(reply, NO_VALID_TICKERS).await;
            return;
        }
        for symbol in symbols {
            let package = self.aggregator.build_package(symbol).await;
            let title = format!("Analysis for {}", symbol);
            let digest = self
                .composer
                .digest(std::slice::from_ref(&package), &title, DigestMode::Ticker)
                .await;
            self.settle(digest, reply).await;
        }
    }

    /// Send the digest, then account for its usage and raise the budget alert if due.
    async fn settle(&self, digest: Digest, reply: &dyn ReplyChannel) {
        deliver(reply, &digest.text).await;

        let report = if digest.failed {
            self.budget.check()
        } else {
            self.budget.record_usage(digest.tokens_used)
        };
        if let Some(alert) = report.alert {
            deliver(reply, &alert).await;
        }
    }
}

async fn deliver(reply: &dyn ReplyChannel, text: &str) {
    if let Err(e) = reply.send(text).await {
        warn!("Failed to send reply: {}", e);
    }
}
