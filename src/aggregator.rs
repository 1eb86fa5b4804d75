//! Per-symbol data aggregation
//!
//! This module handles:
//! - Fanning out to the price, headline and sentiment collaborators
//! - Computing 1-day / 5-day / 1-month percentage moves from a close series
//! - Cleaning headlines (trim, truncate, exact-text dedup)
//!
//! A failed lookup never aborts a package: each field falls back to its
//! documented default and the failure is logged.

use log::{debug, warn};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::sources::{HeadlineSource, PriceHistory, PriceSource, Sentiment, SentimentSource};
use crate::tickers::TickerSymbol;

pub const NEWS_DAYS: i64 = 7;
pub const MAX_HEADLINES: usize = 5;
pub const HEADLINE_CHAR_CAP: usize = 150;
pub const SENTIMENT_SAMPLE: usize = 100;

/// Trading days back for the 5-day comparison.
const WEEK_OFFSET: usize = 5;

/// A percentage move, or an explicit marker that it could not be computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PctChange {
    Value(f64),
    Unavailable,
}

impl PctChange {
    /// Percent change from `base` to `last`, rounded to 2 decimals.
    pub fn between(last: f64, base: f64) -> Self {
        if base == 0.0 {
            return PctChange::Unavailable;
        }
        let pct = round2((last - base) / base * 100.0);
        if pct.is_finite() {
            PctChange::Value(pct)
        } else {
            PctChange::Unavailable
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            PctChange::Value(v) => Some(*v),
            PctChange::Unavailable => None,
        }
    }

    /// Magnitude used for ranking; unavailable counts as no move.
    pub fn magnitude(&self) -> f64 {
        self.value().map(f64::abs).unwrap_or(0.0)
    }
}

impl fmt::Display for PctChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PctChange::Value(v) => write!(f, "{:.2}%", v),
            PctChange::Unavailable => f.write_str("N/A"),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Last price and the three windowed moves derived from a close series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceMoves {
    pub price: Option<f64>,
    pub pct_1d: PctChange,
    pub pct_5d: PctChange,
    pub pct_1m: PctChange,
}

impl PriceMoves {
    pub fn unavailable() -> Self {
        Self {
            price: None,
            pct_1d: PctChange::Unavailable,
            pct_5d: PctChange::Unavailable,
            pct_1m: PctChange::Unavailable,
        }
    }
}

/// `closes` is ordered oldest to newest.
pub fn price_moves(closes: &[f64]) -> PriceMoves {
    let Some(&last) = closes.last() else {
        return PriceMoves::unavailable();
    };
    let n = closes.len();
    let prev = if n > 1 { closes[n - 2] } else { last };
    // Fixed offset into the series; holidays are not accounted for.
    let week = if n > WEEK_OFFSET { closes[n - 1 - WEEK_OFFSET] } else { closes[0] };
    let month = closes[0];

    PriceMoves {
        price: Some(round2(last)),
        pct_1d: PctChange::between(last, prev),
        pct_5d: PctChange::between(last, week),
        pct_1m: PctChange::between(last, month),
    }
}

/// Trim, drop blanks, cut each to [`HEADLINE_CHAR_CAP`] chars, then keep the
/// first occurrence of each exact text, up to `max_items`.
pub fn clean_headlines<I, S>(raw: I, max_items: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for h in raw {
        let h = h.as_ref().trim();
        if h.is_empty() {
            continue;
        }
        let capped: String = h.chars().take(HEADLINE_CHAR_CAP).collect();
        if seen.insert(capped.clone()) {
            out.push(capped);
            if out.len() >= max_items {
                break;
            }
        }
    }
    out
}

/// Everything known about one symbol for a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct StockPackage {
    pub symbol: TickerSymbol,
    pub name: String,
    pub summary: String,
    pub price: Option<f64>,
    pub pct_1d: PctChange,
    pub pct_5d: PctChange,
    pub pct_1m: PctChange,
    pub headlines: Vec<String>,
    pub sentiment: Sentiment,
}

impl StockPackage {
    pub fn price_label(&self) -> String {
        match self.price {
            Some(p) => format!("{:.2}", p),
            None => "N/A".to_string(),
        }
    }
}

pub struct Aggregator {
    prices: Arc<dyn PriceSource>,
    headlines: Arc<dyn HeadlineSource>,
    sentiment: Arc<dyn SentimentSource>,
}

impl Aggregator {
    pub fn new(
        prices: Arc<dyn PriceSource>,
        headlines: Arc<dyn HeadlineSource>,
        sentiment: Arc<dyn SentimentSource>,
    ) -> Self {
        Self { prices, headlines, sentiment }
    }

    pub async fn build_package(&self, symbol: &TickerSymbol) -> StockPackage {
        let sym = symbol.as_str();
        let (history, headlines, sentiment) = tokio::join!(
            self.prices.price_history(sym),
            self.headlines.company_headlines(sym, NEWS_DAYS, MAX_HEADLINES),
            self.sentiment.sentiment(sym, SENTIMENT_SAMPLE),
        );

        let history = match history {
            Ok(h) => h,
            Err(e) => {
                warn!("Price lookup failed for {}: {}", sym, e);
                PriceHistory {
                    display_name: sym.to_string(),
                    ..PriceHistory::default()
                }
            }
        };
        let headlines = match headlines {
            Ok(raw) => clean_headlines(raw, MAX_HEADLINES),
            Err(e) => {
                warn!("Headline lookup failed for {}: {}", sym, e);
                Vec::new()
            }
        };
        let sentiment = match sentiment {
            Ok(s) => s,
            Err(e) => {
                warn!("Sentiment lookup failed for {}: {}", sym, e);
                Sentiment::default()
            }
        };

        let moves = price_moves(&history.closes);
        debug!(
            "{}: price={:?} 1d={} news={} mentions={}",
            sym,
            moves.price,
            moves.pct_1d,
            headlines.len(),
            sentiment.mentions
        );

        StockPackage {
            symbol: symbol.clone(),
            name: history.display_name,
            summary: history.summary,
            price: moves.price,
            pct_1d: moves.pct_1d,
            pct_5d: moves.pct_5d,
            pct_1m: moves.pct_1m,
            headlines,
            sentiment,
        }
    }

    /// Build packages one symbol at a time, keeping discovery order.
    pub async fn build_all(&self, symbols: &[TickerSymbol]) -> Vec<StockPackage> {
        let mut out = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            out.push(self.build_package(symbol).await);
        }
        out
    }
}
