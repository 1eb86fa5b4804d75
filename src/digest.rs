//! Prompt assembly and digest generation.

use log::{info, warn};
use std::fmt::Write as _;
use std::sync::Arc;

use crate::aggregator::{clean_headlines, StockPackage};
use crate::llm::LanguageModel;
use crate::sources::HeadlineSource;

pub const GLOBAL_HEADLINES: usize = 6;
const NO_NEWS: &str = "No major news";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestMode {
    /// One symbol, short answer.
    Ticker,
    /// Up to five ranked symbols plus a market-news wrap.
    Summary,
}

impl DigestMode {
    /// Output-length hint passed to the model.
    pub fn max_tokens(self) -> u32 {
        match self {
            DigestMode::Ticker => 300,
            DigestMode::Summary => 600,
        }
    }

    fn length_instruction(self) -> &'static str {
        match self {
            DigestMode::Ticker => "Use up to 300 tokens total for this single stock.",
            DigestMode::Summary => {
                "For summary: analyze 5 best tickers with ~100 tokens each, \
                 then finish with ~100 tokens global news wrap."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Conservative,
    Moderate,
    MediumHigh,
    Aggressive,
}

impl RiskLevel {
    fn label(self) -> &'static str {
        match self {
            RiskLevel::Conservative => "Low",
            RiskLevel::Moderate => "Medium",
            RiskLevel::MediumHigh => "Medium-high",
            RiskLevel::Aggressive => "High",
        }
    }
}

/// Who the digest is written for.
#[derive(Debug, Clone)]
pub struct InvestorProfile {
    pub risk_tolerance: RiskLevel,
    pub short_term: bool,
    pub long_term: bool,
}

impl Default for InvestorProfile {
    fn default() -> Self {
        Self {
            risk_tolerance: RiskLevel::MediumHigh,
            short_term: true,
            long_term: true,
        }
    }
}

impl InvestorProfile {
    pub fn preamble(&self) -> String {
        let horizons = match (self.short_term, self.long_term) {
            (true, true) => "both short-term trades (days/weeks) and long-term investments",
            (true, false) => "short-term trades (days/weeks)",
            (false, _) => "long-term investments",
        };
        format!(
            "Investor profile: Interested in {}. {} risk tolerance.",
            horizons,
            self.risk_tolerance.label()
        )
    }
}

/// Build the full model prompt. `global_news` is only rendered in summary mode.
pub fn compose(
    selection: &[StockPackage],
    title: &str,
    mode: DigestMode,
    profile: &InvestorProfile,
    global_news: &[String],
) -> String {
    let mut prompt = format!(
        "{title}\n\n{preamble}\n\n\
         Instructions:\n\
         - Provide concise but informative analysis.\n\
         - Avoid duplication.\n\
         - Prioritize items with higher frequency/mentions.\n\
         - {length}\n\n\
         ### Data:\n",
        title = title,
        preamble = profile.preamble(),
        length = mode.length_instruction(),
    );

    for pkg in selection {
        let news = if pkg.headlines.is_empty() {
            NO_NEWS.to_string()
        } else {
            pkg.headlines.join("; ")
        };
        // writing into a String cannot fail
        let _ = write!(
            prompt,
            "- {} ({}): Price {}, 1d {}, 5d {}, 1m {}\n  \
             Crowd sentiment: mentions={}, bull={}, bear={}\n  \
             News: {}\n",
            pkg.name,
            pkg.symbol,
            pkg.price_label(),
            pkg.pct_1d,
            pkg.pct_5d,
            pkg.pct_1m,
            pkg.sentiment.mentions,
            pkg.sentiment.bull,
            pkg.sentiment.bear,
            news,
        );
    }

    if mode == DigestMode::Summary {
        prompt.push_str("\n### Global Market News:\n");
        prompt.push_str(&global_news.join("; "));
    }

    prompt
}

/// Result of one digest request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub text: String,
    pub tokens_used: u64,
    /// The model call failed and `text` is a diagnostic.
    pub failed: bool,
}

pub struct Composer {
    model: Arc<dyn LanguageModel>,
    news: Arc<dyn HeadlineSource>,
    profile: InvestorProfile,
}

impl Composer {
    pub fn new(model: Arc<dyn LanguageModel>, news: Arc<dyn HeadlineSource>) -> Self {
        Self {
            model,
            news,
            profile: InvestorProfile::default(),
        }
    }

    /// Compose a prompt for `selection` and ask the model for a digest.
    ///
    /// A model failure is not retried; it comes back as a diagnostic text
    /// with zero usage.
    pub async fn digest(&self, selection: &[StockPackage], title: &str, mode: DigestMode) -> Digest {
        let global_news = match mode {
            DigestMode::Summary => match self.news.global_headlines(GLOBAL_HEADLINES).await {
                Ok(raw) => clean_headlines(raw, GLOBAL_HEADLINES),
                Err(e) => {
                    warn!("Global news lookup failed: {}", e);
                    Vec::new()
                }
            },
            DigestMode::Ticker => Vec::new(),
        };

        let prompt = compose(selection, title, mode, &self.profile, &global_news);
        match self.model.complete(&prompt, mode.max_tokens()).await {
            Ok(completion) => {
                info!("{}: digest used {} tokens", title, completion.total_tokens);
                Digest {
                    text: completion.text,
                    tokens_used: completion.total_tokens,
                    failed: false,
                }
            }
            Err(e) => {
                warn!("{}: model call failed: {}", title, e);
                Digest {
                    text: format!("AI summary failed: {}", e),
                    tokens_used: 0,
                    failed: true,
                }
            }
        }
    }
}
