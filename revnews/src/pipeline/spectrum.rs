//! Cross-source analysis: bias/consensus/omission breakdown for a cluster
//! of same-story articles, plus the single-article summary-and-rating
//! variant with its tolerant pipe-format parser.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::error::{Error, Result};
use crate::llm::{ChatTurn, CompletionProvider, CompletionRequest};
use crate::search::Article;

/// Returned for an empty comparison cluster, without any capability call
pub const NO_COMPARATIVE_SOURCES: &str = "No comparative sources found.";

/// Returned when the spectrum call cannot run or fails
const SPECTRUM_UNAVAILABLE: &str = "Spectrum unavailable.";
const SPECTRUM_FAILED: &str = "Spectrum analysis failed.";

/// Rating parse default when the expected delimiters are absent
const DEFAULT_EXPLANATION: &str =
    "The analysis did not include a clear bias breakdown for this article.";

/// Political lean categorization of one source's coverage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BiasRating {
    Left,
    Center,
    Right,
    Mixed,
}

impl fmt::Display for BiasRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BiasRating::Left => "Left",
            BiasRating::Center => "Center",
            BiasRating::Right => "Right",
            BiasRating::Mixed => "Mixed",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for BiasRating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(BiasRating::Left),
            "center" | "centre" => Ok(BiasRating::Center),
            "right" => Ok(BiasRating::Right),
            "mixed" => Ok(BiasRating::Mixed),
            other => Err(format!("unknown bias rating: {}", other)),
        }
    }
}

/// Parsed single-article analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleAnalysis {
    pub summary: String,
    pub bias: BiasRating,
    pub explanation: String,
}

pub struct SpectrumAnalyzer {
    provider: Option<Arc<dyn CompletionProvider>>,
}

impl SpectrumAnalyzer {
    pub fn new(provider: Option<Arc<dyn CompletionProvider>>) -> Self {
        Self { provider }
    }

    /// Produce a structured bias/consensus/omission breakdown for a cluster
    /// of same-story articles from different sources. Zero comparison
    /// articles short-circuit to a fixed marker instead of making a
    /// degenerate empty-context call.
    pub async fn analyze(&self, same_story_articles: &[Article]) -> String {
        if same_story_articles.is_empty() {
            return NO_COMPARATIVE_SOURCES.to_string();
        }
        let Some(provider) = &self.provider else {
            return SPECTRUM_UNAVAILABLE.to_string();
        };

        let article_lines: Vec<String> = same_story_articles
            .iter()
            .map(|a| format!("- {}: {}", a.source, a.title))
            .collect();

        let prompt = format!(
            "Analyze the following group of news articles covering the same story.\n\
             1. Categorize each source's bias (Left, Center, Right).\n\
             2. Identify the \"Consensus\" (what everyone agrees on).\n\
             3. Identify \"Omissions/Emphases\" (what one side is highlighting that others aren't).\n\
             Format the output as a clean breakdown.\n\
             \n\
             Articles:\n\
             {}",
            article_lines.join("\n")
        );

        let request = CompletionRequest::new(vec![ChatTurn::user(prompt)]);
        match provider.complete(request).await {
            Ok(response) if !response.content.trim().is_empty() => response.content,
            Ok(_) => SPECTRUM_FAILED.to_string(),
            Err(e) => {
                warn!("spectrum analysis failed: {}", e);
                SPECTRUM_FAILED.to_string()
            }
        }
    }

    /// Single-article variant: a two-sentence summary plus a bias rating,
    /// requested in the pipe-delimited `Summary: ... | Bias: RATING -
    /// explanation` format and parsed tolerantly. Never errors: malformed
    /// output defaults to `Mixed` with a generic explanation.
    pub async fn summarize_and_rate(&self, text: &str) -> ArticleAnalysis {
        let Some(provider) = &self.provider else {
            return ArticleAnalysis {
                summary: "Analysis unavailable (missing API key).".to_string(),
                bias: BiasRating::Mixed,
                explanation: DEFAULT_EXPLANATION.to_string(),
            };
        };

        let prompt = format!(
            "Analyze the following news article text/summary and provide a brief \
             summary (max 2 sentences) and a bias rating (Left, Center, Right, or \
             Mixed) with a short explanation. Format as: \"Summary: [summary] | \
             Bias: [Rating] - [Explanation]\". Article: {}",
            text
        );

        let request = CompletionRequest::new(vec![ChatTurn::user(prompt)]).with_max_tokens(500);
        let raw = match provider.complete(request).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!("article analysis failed: {}", e);
                format!("Analysis failed: {}", e)
            }
        };

        parse_analysis(&raw).unwrap_or_else(|e| {
            warn!("falling back to default bias breakdown: {}", e);
            default_analysis(&raw)
        })
    }
}

/// Strict parse of the pipe-delimited format. Callers default on failure.
fn parse_analysis(raw: &str) -> Result<ArticleAnalysis> {
    let lower = raw.to_ascii_lowercase();
    let bias_at = lower
        .find("bias:")
        .ok_or_else(|| Error::MalformedModelOutput("missing Bias: delimiter".into()))?;

    let summary_part = raw[..bias_at]
        .trim()
        .trim_end_matches('|')
        .trim()
        .trim_start_matches("Summary:")
        .trim_start_matches("summary:")
        .trim();
    if summary_part.is_empty() {
        return Err(Error::MalformedModelOutput("empty summary section".into()));
    }

    let after_bias = raw[bias_at + "bias:".len()..].trim();
    let (rating_part, explanation_part) = match after_bias.split_once('-') {
        Some((rating, explanation)) => (rating, explanation.trim()),
        None => (after_bias, ""),
    };

    let bias: BiasRating = rating_part
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .map_err(Error::MalformedModelOutput)?;

    let explanation = if explanation_part.is_empty() {
        DEFAULT_EXPLANATION.to_string()
    } else {
        explanation_part.to_string()
    };

    Ok(ArticleAnalysis {
        summary: summary_part.to_string(),
        bias,
        explanation,
    })
}

fn default_analysis(raw: &str) -> ArticleAnalysis {
    let summary = if raw.trim().is_empty() {
        "No analysis generated.".to_string()
    } else {
        raw.trim().to_string()
    };
    ArticleAnalysis {
        summary,
        bias: BiasRating::Mixed,
        explanation: DEFAULT_EXPLANATION.to_string(),
    }
}
