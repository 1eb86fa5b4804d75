//! End-to-end message handling with in-memory collaborators.
//!
//! Exercises discovery, aggregation, ranking, digest composition and budget
//! accounting through `Pipeline::handle`, with no network access.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use ticker_digest::aggregator::Aggregator;
use ticker_digest::bot::{Pipeline, ReplyChannel, NO_CANDIDATES, NO_VALID_TICKERS};
use ticker_digest::budget::{BudgetState, BudgetStore, BudgetTracker, JsonBudgetStore};
use ticker_digest::digest::Composer;
use ticker_digest::error::{SourceError, SourceResult};
use ticker_digest::llm::{Completion, LanguageModel};
use ticker_digest::notices::Notices;
use ticker_digest::sources::{
    CandidateSource, HeadlineSource, PriceHistory, PriceSource, Sentiment, SentimentSource,
};

struct Candidates(Vec<&'static str>);

#[async_trait]
impl CandidateSource for Candidates {
    async fn candidates(&self) -> SourceResult<Vec<String>> {
        Ok(self.0.iter().map(|s| s.to_string()).collect())
    }

    fn name(&self) -> &str {
        "fixture"
    }
}

/// Close series per symbol; unknown symbols fail like a dead endpoint.
struct Market(HashMap<&'static str, Vec<f64>>);

#[async_trait]
impl PriceSource for Market {
    async fn price_history(&self, symbol: &str) -> SourceResult<PriceHistory> {
        let closes = self
            .0
            .get(symbol)
            .cloned()
            .ok_or_else(|| SourceError::Malformed(format!("no chart for {}", symbol)))?;
        Ok(PriceHistory {
            display_name: format!("{} Inc.", symbol),
            summary: String::new(),
            closes,
        })
    }
}

struct Wire;

#[async_trait]
impl HeadlineSource for Wire {
    async fn company_headlines(&self, symbol: &str, _: i64, _: usize) -> SourceResult<Vec<String>> {
        match symbol {
            "TSLA" => Ok(vec!["Deliveries beat".into(), "Deliveries beat".into(), "Recall widens".into()]),
            _ => Ok(Vec::new()),
        }
    }

    async fn global_headlines(&self, _: usize) -> SourceResult<Vec<String>> {
        Ok(vec!["Fed holds rates".into()])
    }
}

struct Crowd;

#[async_trait]
impl SentimentSource for Crowd {
    async fn sentiment(&self, symbol: &str, _: usize) -> SourceResult<Sentiment> {
        Ok(match symbol {
            "TSLA" => Sentiment { mentions: 30, bull: 18, bear: 5 },
            _ => Sentiment { mentions: 12, bull: 6, bear: 1 },
        })
    }
}

struct Model {
    usage: u64,
    fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl Model {
    fn new(usage: u64, fail: bool) -> Arc<Self> {
        Arc::new(Self { usage, fail, prompts: Mutex::new(Vec::new()) })
    }
}

#[async_trait]
impl LanguageModel for Model {
    async fn complete(&self, prompt: &str, _max_output_tokens: u32) -> SourceResult<Completion> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(SourceError::Status { status: 500, body: "upstream down".to_string() });
        }
        Ok(Completion { text: format!("digest #{}", self.prompts.lock().unwrap().len()), total_tokens: self.usage })
    }
}

#[derive(Default)]
struct Outbox(Mutex<Vec<String>>);

impl Outbox {
    fn sent(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplyChannel for Outbox {
    async fn send(&self, text: &str) -> SourceResult<()> {
        self.0.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

struct Harness {
    pipeline: Pipeline,
    model: Arc<Model>,
    store: JsonBudgetStore,
    _dir: TempDir,
}

fn harness(candidates: Vec<&'static str>, model: Arc<Model>, start: BudgetState, notices: Vec<String>) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = JsonBudgetStore::new(dir.path().join("token_data.json"));
    store.write(&start).unwrap();

    let market = Market(HashMap::from([
        ("TSLA", vec![200.0, 204.0, 210.0, 208.0, 215.0, 220.0, 231.0]),
        ("AAPL", vec![180.0, 181.0]),
    ]));
    let wire = Arc::new(Wire);
    let aggregator = Aggregator::new(Arc::new(market), wire.clone(), Arc::new(Crowd));
    let composer = Composer::new(model.clone(), wire);
    let budget = BudgetTracker::open(Box::new(store.clone()), 10.0);

    let sources: Vec<Arc<dyn CandidateSource>> = vec![Arc::new(Candidates(candidates))];
    let pipeline = Pipeline::new(
        sources,
        aggregator,
        composer,
        budget,
        Arc::new(Notices::with(notices)),
    );
    Harness { pipeline, model, store, _dir: dir }
}

#[tokio::test]
async fn summary_dedups_ranks_and_records_usage() {
    let h = harness(
        vec!["TSLA", "TSLA", "CEO", "AAPL"],
        Model::new(120, false),
        BudgetState { consumed: 0, ceiling: 1000 },
        Vec::new(),
    );
    let outbox = Outbox::default();

    h.pipeline.handle("summary", &outbox).await;

    assert_eq!(outbox.sent(), vec!["digest #1"]);
    let prompts = h.model.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];
    assert!(prompt.starts_with("Overall Market Summary\n"));
    assert!(!prompt.contains("(CEO)"));
    // TSLA moved 5% on the day, AAPL 0.56%
    let tsla = prompt.find("(TSLA)").unwrap();
    let aapl = prompt.find("(AAPL)").unwrap();
    assert!(tsla < aapl);
    assert!(prompt.contains("News: Deliveries beat; Recall widens\n"));
    assert!(prompt.contains("- AAPL Inc. (AAPL): Price 181.00, 1d 0.56%"));
    assert!(prompt.ends_with("### Global Market News:\nFed holds rates"));

    assert_eq!(h.store.read().unwrap(), BudgetState { consumed: 120, ceiling: 1000 });
}

#[tokio::test]
async fn ticker_mode_sends_one_digest_per_symbol() {
    let h = harness(Vec::new(), Model::new(10, false), BudgetState::default(), Vec::new());
    let outbox = Outbox::default();

    h.pipeline.handle("tsla nope! aapl tsla", &outbox).await;

    assert_eq!(outbox.sent(), vec!["digest #1", "digest #2"]);
    let prompts = h.model.prompts.lock().unwrap();
    assert!(prompts[0].starts_with("Analysis for TSLA\n"));
    assert!(prompts[1].starts_with("Analysis for AAPL\n"));
    assert!(prompts[1].contains("News: No major news"));
    assert!(!prompts[0].contains("Global Market News"));
    assert_eq!(h.pipeline.budget().consumed(), 20);
}

#[tokio::test]
async fn unknown_symbol_still_gets_a_digest_with_defaults() {
    let h = harness(Vec::new(), Model::new(10, false), BudgetState::default(), Vec::new());
    let outbox = Outbox::default();

    h.pipeline.handle("ZZZZ", &outbox).await;

    assert_eq!(outbox.sent().len(), 1);
    let prompts = h.model.prompts.lock().unwrap();
    assert!(prompts[0].contains("- ZZZZ (ZZZZ): Price N/A, 1d N/A, 5d N/A, 1m N/A"));
}

#[tokio::test]
async fn empty_discovery_asks_to_try_later() {
    let h = harness(vec!["CEO", "ETF", "lower"], Model::new(10, false), BudgetState::default(), Vec::new());
    let outbox = Outbox::default();

    h.pipeline.handle("SUMMARY", &outbox).await;

    assert_eq!(outbox.sent(), vec![NO_CANDIDATES]);
    assert!(h.model.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn no_valid_tickers_in_message() {
    let h = harness(Vec::new(), Model::new(10, false), BudgetState::default(), Vec::new());
    let outbox = Outbox::default();

    h.pipeline.handle("greetings everybody!", &outbox).await;
    h.pipeline.handle("   ", &outbox).await;

    assert_eq!(outbox.sent(), vec![NO_VALID_TICKERS]);
}

#[tokio::test]
async fn model_failure_is_reported_and_costs_nothing() {
    let h = harness(vec!["TSLA"], Model::new(500, true), BudgetState { consumed: 40, ceiling: 1000 }, Vec::new());
    let outbox = Outbox::default();

    h.pipeline.handle("SUMMARY", &outbox).await;

    let sent = outbox.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].starts_with("AI summary failed: "));
    assert!(sent[0].contains("upstream down"));
    assert_eq!(h.store.read().unwrap().consumed, 40);
}

#[tokio::test]
async fn low_budget_alert_is_sent_once() {
    let h = harness(Vec::new(), Model::new(5, false), BudgetState { consumed: 895, ceiling: 1000 }, Vec::new());
    let outbox = Outbox::default();

    h.pipeline.handle("TSLA", &outbox).await;
    h.pipeline.handle("AAPL", &outbox).await;

    let sent = outbox.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0], "digest #1");
    assert!(sent[1].starts_with("⚠️ Token budget low: 10.0% remaining"));
    assert_eq!(sent[2], "digest #2");
}

#[tokio::test]
async fn startup_notices_are_delivered_once() {
    let h = harness(
        Vec::new(),
        Model::new(1, false),
        BudgetState::default(),
        vec!["❌ Missing OPENAI_API_KEY".to_string(), "⚠️ Missing FINNHUB_API_KEY".to_string()],
    );
    let outbox = Outbox::default();

    h.pipeline.handle("TSLA", &outbox).await;
    h.pipeline.handle("TSLA", &outbox).await;

    let sent = outbox.sent();
    assert_eq!(sent[0], "❌ Missing OPENAI_API_KEY\n⚠️ Missing FINNHUB_API_KEY");
    assert_eq!(sent.len(), 3);
}
