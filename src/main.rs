use env_logger::{Builder, Env};
use log::{info, warn, LevelFilter};
use std::error::Error;
use std::io::Write;
use std::sync::Arc;

use ticker_digest::aggregator::Aggregator;
use ticker_digest::bot::Pipeline;
use ticker_digest::budget::{BudgetTracker, JsonBudgetStore};
use ticker_digest::config::Config;
use ticker_digest::digest::Composer;
use ticker_digest::llm::OpenAiClient;
use ticker_digest::notices::Notices;
use ticker_digest::sources::finnhub::FinnhubClient;
use ticker_digest::sources::stocktwits::StockTwitsClient;
use ticker_digest::sources::yahoo::YahooClient;
use ticker_digest::sources::CandidateSource;
use ticker_digest::telegram::{self, TelegramClient};

const READY_MESSAGE: &str = "Bot ready. Type 'SUMMARY' or a ticker like 'TSLA'.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // RUST_LOG overrides these defaults
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("ticker_digest", LevelFilter::Debug)
        .parse_env(Env::default())
        .format(|buf, record| {
            let ts = chrono::Local::now().format("%H:%M:%S%.3f");
            writeln!(
                buf,
                "[{} {:<5} {}] {}",
                ts,
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .init();

    let config = Config::load();
    let token = config
        .telegram_bot_token
        .clone()
        .ok_or("TELEGRAM_BOT_TOKEN is required to receive messages")?;

    let startup = config.startup_notices();
    for notice in &startup {
        warn!("{}", notice);
    }
    let notices = Arc::new(Notices::with(startup));

    let yahoo = YahooClient::new()?;
    let finnhub = FinnhubClient::new(config.finnhub_api_key.clone(), notices.clone())?;
    let stocktwits = StockTwitsClient::new()?;

    let candidates: Vec<Arc<dyn CandidateSource>> = vec![
        Arc::new(yahoo.most_active(config.top_n_trending)),
        Arc::new(finnhub.most_mentioned(config.top_n_trending)),
    ];
    let headlines = Arc::new(finnhub);
    let aggregator = Aggregator::new(Arc::new(yahoo), headlines.clone(), Arc::new(stocktwits));

    let model = OpenAiClient::new(config.openai_api_key.clone(), config.openai_model.clone())?;
    let composer = Composer::new(Arc::new(model), headlines);

    let store = JsonBudgetStore::new(config.budget_file.clone());
    info!("Budget record at {}", store.path().display());
    let budget = BudgetTracker::open(Box::new(store), config.low_budget_threshold);

    let pipeline = Arc::new(Pipeline::new(candidates, aggregator, composer, budget, notices));
    let telegram = Arc::new(TelegramClient::new(&token)?);

    if let Some(chat_id) = config.telegram_chat_id {
        if let Err(e) = telegram.send_message(chat_id, READY_MESSAGE).await {
            warn!("Could not announce startup to chat {}: {}", chat_id, e);
        }
    }
    info!("{}", READY_MESSAGE);

    let poller = tokio::spawn(telegram::run(telegram, pipeline));
    tokio::select! {
        _ = poller => {},
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    };

    info!("Shutdown complete");
    Ok(())
}
