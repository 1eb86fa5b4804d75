//! Market digest bot: discovers active tickers, aggregates price, news and
//! crowd sentiment per symbol, ranks them and asks a language model for a
//! digest while tracking cumulative model usage against a budget.

pub mod aggregator;
pub mod bot;
pub mod budget;
pub mod config;
pub mod digest;
pub mod error;
pub mod llm;
pub mod notices;
pub mod ranker;
pub mod sources;
pub mod telegram;
pub mod tickers;
