//! Yahoo Finance price history and most-active candidates

use async_trait::async_trait;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

use super::{check_status, http_client, CandidateSource, PriceHistory, PriceSource};
use crate::error::{SourceError, SourceResult};

const BASE_URL: &str = "https://query1.finance.yahoo.com";
const SUMMARY_CHAR_CAP: usize = 400;

// Screener symbols can carry class suffixes (BRK.B) or dashes; tightening to
// the discovery pattern happens later.
static LISTING_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z.\-]{1,10}$").expect("listing pattern is valid"));

#[derive(Debug, Clone)]
pub struct YahooClient {
    client: reqwest::Client,
    base_url: String,
}

impl YahooClient {
    pub fn new() -> SourceResult<Self> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> SourceResult<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.into(),
        })
    }

    async fn get_json(&self, path: &str) -> SourceResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let resp = check_status(self.client.get(&url).send().await?).await?;
        Ok(resp.json().await?)
    }

    /// Candidate source over Yahoo's "most active" screener.
    pub fn most_active(&self, count: usize) -> MostActiveSource {
        MostActiveSource {
            yahoo: self.clone(),
            count,
        }
    }
}

#[async_trait]
impl PriceSource for YahooClient {
    async fn price_history(&self, symbol: &str) -> SourceResult<PriceHistory> {
        let path = format!("/v8/finance/chart/{}?range=1mo&interval=1d", symbol);
        let json = self.get_json(&path).await?;
        parse_chart(symbol, &json)
    }
}

#[derive(Debug, Clone)]
pub struct MostActiveSource {
    yahoo: YahooClient,
    count: usize,
}

#[async_trait]
impl CandidateSource for MostActiveSource {
    async fn candidates(&self) -> SourceResult<Vec<String>> {
        // Over-fetch: some rows are funds or foreign listings that get filtered.
        let path = format!(
            "/v1/finance/screener/predefined/saved?scrIds=most_actives&count={}",
            self.count * 4
        );
        let json = self.yahoo.get_json(&path).await?;
        let symbols = extract_screener_symbols(&json, self.count)?;
        debug!("Yahoo most active: {:?}", symbols);
        Ok(symbols)
    }

    fn name(&self) -> &str {
        "yahoo-most-active"
    }
}

/// Pull display name, description and the close series out of a chart response.
pub fn parse_chart(symbol: &str, json: &Value) -> SourceResult<PriceHistory> {
    let result = json["chart"]["result"]
        .as_array()
        .and_then(|r| r.first())
        .ok_or_else(|| SourceError::Malformed(format!("no chart result for {}", symbol)))?;

    let meta = &result["meta"];
    let display_name = meta["shortName"]
        .as_str()
        .or_else(|| meta["longName"].as_str())
        .unwrap_or(symbol)
        .to_string();

    let summary = match (meta["longName"].as_str(), meta["fullExchangeName"].as_str()) {
        (Some(long), Some(exchange)) => format!("{} ({})", long, exchange),
        (Some(long), None) => long.to_string(),
        _ => String::new(),
    };

    Ok(PriceHistory {
        display_name,
        summary: summary.chars().take(SUMMARY_CHAR_CAP).collect(),
        closes: extract_close_prices(json).unwrap_or_default(),
    })
}

/// Extract close prices from a chart response, skipping null points
fn extract_close_prices(json: &Value) -> Option<Vec<f64>> {
    let result = json["chart"]["result"].as_array()?.first()?;
    let quotes = result["indicators"]["quote"].as_array()?.first()?;
    let closes = quotes["close"].as_array()?;

    closes.iter().filter_map(|v| v.as_f64()).collect::<Vec<f64>>().into()
}

/// Symbols from a screener response, first-seen order, at most `count`.
pub fn extract_screener_symbols(json: &Value, count: usize) -> SourceResult<Vec<String>> {
    let quotes = json["finance"]["result"]
        .as_array()
        .and_then(|r| r.first())
        .and_then(|r| r["quotes"].as_array())
        .ok_or_else(|| SourceError::Malformed("screener response has no quotes".to_string()))?;

    let mut seen = HashSet::new();
    let symbols = quotes
        .iter()
        .filter_map(|q| q["symbol"].as_str())
        .map(str::trim)
        .filter(|s| LISTING_PATTERN.is_match(s))
        .filter(|s| seen.insert(s.to_string()))
        .take(count)
        .map(str::to_string)
        .collect();
    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_chart_skips_null_closes() {
        let body = json!({
            "chart": {"result": [{
                "meta": {"symbol": "TSLA", "shortName": "Tesla, Inc.", "longName": "Tesla, Inc.", "fullExchangeName": "NasdaqGS"},
                "indicators": {"quote": [{"close": [100.0, null, 110.0]}]}
            }]}
        });
        let history = parse_chart("TSLA", &body).unwrap();
        assert_eq!(history.display_name, "Tesla, Inc.");
        assert_eq!(history.summary, "Tesla, Inc. (NasdaqGS)");
        assert_eq!(history.closes, vec![100.0, 110.0]);
    }

    #[test]
    fn test_parse_chart_without_quotes_has_empty_series() {
        let body = json!({"chart": {"result": [{"meta": {"symbol": "XYZ"}}]}});
        let history = parse_chart("XYZ", &body).unwrap();
        assert_eq!(history.display_name, "XYZ");
        assert!(history.closes.is_empty());
    }

    #[test]
    fn test_parse_chart_error_payload_is_malformed() {
        let body = json!({"chart": {"result": null, "error": {"code": "Not Found"}}});
        assert!(matches!(parse_chart("NOPE", &body), Err(SourceError::Malformed(_))));
    }

    #[test]
    fn test_screener_symbols_filtered_and_capped() {
        let body = json!({"finance": {"result": [{"quotes": [
            {"symbol": "NVDA"}, {"symbol": "BRK.B"}, {"symbol": "nvda"},
            {"symbol": "NVDA"}, {"symbol": "0700.HK"}, {"symbol": "F"}, {"symbol": "AMD"}
        ]}]}});
        let symbols = extract_screener_symbols(&body, 3).unwrap();
        assert_eq!(symbols, vec!["NVDA", "BRK.B", "F"]);
    }
}
