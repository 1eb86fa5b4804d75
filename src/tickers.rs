//! Ticker discovery and normalization.
//!
//! Raw tokens come from several candidate sources (screeners, headline
//! mentions, the user's own message). Only tokens that look like a listed
//! symbol survive, and each symbol appears once, in first-seen order.

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;

use crate::sources::CandidateSource;

static TICKER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{1,5}$").expect("ticker pattern is valid"));

/// Common acronyms that match the pattern but are not tickers.
pub const BLACKLIST: &[&str] = &["CEO", "ETF", "US", "I"];

/// A validated, uppercase ticker symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickerSymbol(String);

impl TickerSymbol {
    /// Accepts 1-5 uppercase ASCII letters that are not blacklisted.
    pub fn parse(raw: &str) -> Option<Self> {
        if is_valid_ticker(raw) {
            Some(TickerSymbol(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TickerSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn is_valid_ticker(raw: &str) -> bool {
    TICKER_PATTERN.is_match(raw) && !BLACKLIST.iter().any(|b| *b == raw)
}

/// Filter and deduplicate raw tokens, keeping the first occurrence of each.
pub fn normalize<I, S>(raw: I) -> Vec<TickerSymbol>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for token in raw {
        if let Some(symbol) = TickerSymbol::parse(token.as_ref()) {
            if seen.insert(symbol.clone()) {
                out.push(symbol);
            }
        }
    }
    out
}

/// Split a free-text user message on whitespace into validated symbols.
pub fn from_message(text: &str) -> Vec<TickerSymbol> {
    normalize(text.split_whitespace())
}

/// Query every source in order and merge their candidates.
///
/// A failing source contributes nothing; its failure is logged and never
/// reaches the caller. An empty result is a normal outcome.
pub async fn discover(sources: &[&dyn CandidateSource]) -> Vec<TickerSymbol> {
    let mut raw: Vec<String> = Vec::new();
    for source in sources {
        match source.candidates().await {
            Ok(tokens) => {
                debug!("{} returned {} candidates", source.name(), tokens.len());
                raw.extend(tokens);
            }
            Err(e) => warn!("Candidate source {} failed: {}", source.name(), e),
        }
    }
    normalize(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SourceError, SourceResult};
    use async_trait::async_trait;

    struct Fixed(&'static str, Vec<&'static str>);

    #[async_trait]
    impl CandidateSource for Fixed {
        async fn candidates(&self) -> SourceResult<Vec<String>> {
            Ok(self.1.iter().map(|s| s.to_string()).collect())
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    struct Broken;

    #[async_trait]
    impl CandidateSource for Broken {
        async fn candidates(&self) -> SourceResult<Vec<String>> {
            Err(SourceError::Malformed("no table".to_string()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    #[test]
    fn test_validation_rules() {
        assert!(is_valid_ticker("TSLA"));
        assert!(is_valid_ticker("F"));
        assert!(!is_valid_ticker("GOOGLE"));
        assert!(!is_valid_ticker("tsla"));
        assert!(!is_valid_ticker("BRK.B"));
        assert!(!is_valid_ticker(""));
        for banned in BLACKLIST {
            assert!(!is_valid_ticker(banned));
        }
    }

    #[test]
    fn test_normalize_keeps_first_seen_order() {
        let out = normalize(["TSLA", "TSLA", "CEO", "AAPL", "US", "NVDA", "AAPL"]);
        let names: Vec<&str> = out.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["TSLA", "AAPL", "NVDA"]);
    }

    #[test]
    fn test_from_message_splits_on_whitespace() {
        let out = from_message("  TSLA\tAMD   ETF\nMSFT ");
        let names: Vec<&str> = out.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["TSLA", "AMD", "MSFT"]);
    }

    #[tokio::test]
    async fn test_discover_merges_and_swallows_failures() {
        let volume = Fixed("volume", vec!["TSLA", "ETF", "AMD"]);
        let broken = Broken;
        let mentions = Fixed("mentions", vec!["I", "AMD", "NVDA", "TSLA"]);

        let sources: [&dyn CandidateSource; 3] = [&volume, &broken, &mentions];
        let out = discover(&sources).await;
        let names: Vec<&str> = out.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["TSLA", "AMD", "NVDA"]);
    }

    #[tokio::test]
    async fn test_discover_with_nothing_valid_is_empty() {
        let junk = Fixed("junk", vec!["CEO", "lower", "TOOLONG"]);
        let sources: [&dyn CandidateSource; 2] = [&junk, &Broken];
        assert!(discover(&sources).await.is_empty());
    }
}
